//! User attributes submitted with a plan request.
//!
//! [`PlanInput::from_json`] is the only way in from untrusted input. It
//! reports one [`Violation`] per bad field and never coerces an
//! out-of-range or unrecognised value into something acceptable. Numeric
//! fields may arrive as numbers or numeric strings, since HTML forms post
//! everything as text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use super::schema::Violation;

/// Error returned when parsing an unrecognised enumeration label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized value {value:?} (expected one of: {expected})")]
pub struct LabelParseError {
    pub value: String,
    pub expected: String,
}

/// Declares a closed enumeration whose wire form is a human-readable label.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// All labels, in declaration order.
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = LabelParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(LabelParseError {
                        value: other.to_owned(),
                        expected: Self::LABELS.join(", "),
                    }),
                }
            }
        }
    };
}

labelled_enum!(Gender {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

labelled_enum!(FitnessGoal {
    WeightLoss => "Weight Loss",
    MuscleGain => "Muscle Gain",
    Endurance => "Endurance",
    GeneralFitness => "General Fitness",
});

labelled_enum!(FitnessLevel {
    Beginner => "Beginner",
    Intermediate => "Intermediate",
    Advanced => "Advanced",
});

labelled_enum!(WorkoutLocation {
    Home => "Home",
    Gym => "Gym",
    Outdoor => "Outdoor",
});

labelled_enum!(
    /// Dietary preference; `None` means no restriction.
    DietaryPreference {
        Veg => "Veg",
        NonVeg => "Non-Veg",
        Vegan => "Vegan",
        Keto => "Keto",
        None => "None",
    }
);

/// Validated attributes for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PlanInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(range(min = 16, max = 100, message = "must be between 16 and 100"))]
    pub age: i64,
    pub gender: Gender,
    #[validate(range(min = 50.0, max = 250.0, message = "must be between 50 and 250 cm"))]
    pub height_cm: f64,
    #[validate(range(min = 20.0, max = 400.0, message = "must be between 20 and 400 kg"))]
    pub weight_kg: f64,
    pub fitness_goal: FitnessGoal,
    pub fitness_level: FitnessLevel,
    pub workout_location: WorkoutLocation,
    pub dietary_preference: DietaryPreference,
    #[serde(default)]
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub optional_notes: String,
}

/// A rejected plan request, with one violation per bad field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid plan input: {}", summarize(.violations))]
pub struct InputError {
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-field extraction that records a violation instead of failing fast.
struct Fields<'a> {
    object: &'a serde_json::Map<String, Value>,
    violations: Vec<Violation>,
}

impl<'a> Fields<'a> {
    fn violation(&mut self, field: &str, reason: impl Into<String>) {
        self.violations.push(Violation::new(format!("/{field}"), reason));
    }

    fn text(&mut self, field: &str) -> Option<String> {
        match self.object.get(field) {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Null) | None => {
                self.violation(field, "is required");
                None
            }
            Some(_) => {
                self.violation(field, "must be a string");
                None
            }
        }
    }

    fn optional_text(&mut self, field: &str) -> Option<String> {
        match self.object.get(field) {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Null) | None => Some(String::new()),
            Some(_) => {
                self.violation(field, "must be a string");
                None
            }
        }
    }

    fn number(&mut self, field: &str) -> Option<f64> {
        let parsed = match self.object.get(field) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(Value::Null) | None => {
                self.violation(field, "is required");
                return None;
            }
            Some(_) => None,
        };
        match parsed {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                self.violation(field, "must be a number");
                None
            }
        }
    }

    fn integer(&mut self, field: &str) -> Option<i64> {
        let n = self.number(field)?;
        if n.fract() != 0.0 {
            self.violation(field, "must be a whole number");
            return None;
        }
        Some(n as i64)
    }

    fn label<T>(&mut self, field: &str) -> Option<T>
    where
        T: FromStr<Err = LabelParseError>,
    {
        let raw = self.text(field)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                self.violation(field, e.to_string());
                None
            }
        }
    }
}

impl PlanInput {
    /// Parse and validate a request body.
    pub fn from_json(body: &Value) -> Result<Self, InputError> {
        let Some(object) = body.as_object() else {
            return Err(InputError {
                violations: vec![Violation::new("/", "request body must be a JSON object")],
            });
        };

        let mut fields = Fields {
            object,
            violations: Vec::new(),
        };

        let name = fields.text("name");
        let age = fields.integer("age");
        let gender = fields.label::<Gender>("gender");
        let height_cm = fields.number("height_cm");
        let weight_kg = fields.number("weight_kg");
        let fitness_goal = fields.label::<FitnessGoal>("fitness_goal");
        let fitness_level = fields.label::<FitnessLevel>("fitness_level");
        let workout_location = fields.label::<WorkoutLocation>("workout_location");
        let dietary_preference = fields.label::<DietaryPreference>("dietary_preference");
        let optional_notes = fields.optional_text("optional_notes");

        let mut violations = fields.violations;

        let (
            Some(name),
            Some(age),
            Some(gender),
            Some(height_cm),
            Some(weight_kg),
            Some(fitness_goal),
            Some(fitness_level),
            Some(workout_location),
            Some(dietary_preference),
            Some(optional_notes),
        ) = (
            name,
            age,
            gender,
            height_cm,
            weight_kg,
            fitness_goal,
            fitness_level,
            workout_location,
            dietary_preference,
            optional_notes,
        )
        else {
            violations.sort_by(|a, b| a.path.cmp(&b.path));
            return Err(InputError { violations });
        };

        let input = Self {
            name,
            age,
            gender,
            height_cm,
            weight_kg,
            fitness_goal,
            fitness_level,
            workout_location,
            dietary_preference,
            optional_notes,
        };

        input.check()?;
        Ok(input)
    }

    /// Run the range and length rules.
    pub fn check(&self) -> Result<(), InputError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };

        let mut violations: Vec<Violation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let reason = e
                        .message
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| e.code.to_string());
                    Violation::new(format!("/{field}"), reason)
                })
            })
            .collect();
        violations.sort_by(|a, b| a.path.cmp(&b.path));
        Err(InputError { violations })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn ana_json() -> Value {
        json!({
            "name": "Ana",
            "age": 30,
            "gender": "Female",
            "height_cm": 165,
            "weight_kg": 60,
            "fitness_goal": "Weight Loss",
            "fitness_level": "Beginner",
            "workout_location": "Home",
            "dietary_preference": "Vegan",
            "optional_notes": ""
        })
    }

    pub(crate) fn ana() -> PlanInput {
        PlanInput::from_json(&ana_json()).expect("Ana is valid")
    }

    fn paths(err: &InputError) -> Vec<&str> {
        err.violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn parses_valid_input() {
        let input = ana();
        assert_eq!(input.name, "Ana");
        assert_eq!(input.age, 30);
        assert_eq!(input.gender, Gender::Female);
        assert_eq!(input.height_cm, 165.0);
        assert_eq!(input.fitness_goal, FitnessGoal::WeightLoss);
        assert_eq!(input.dietary_preference, DietaryPreference::Vegan);
        assert_eq!(input.optional_notes, "");
    }

    #[test]
    fn accepts_numeric_strings() {
        let mut body = ana_json();
        body["age"] = json!("42");
        body["height_cm"] = json!(" 170.5 ");
        let input = PlanInput::from_json(&body).unwrap();
        assert_eq!(input.age, 42);
        assert_eq!(input.height_cm, 170.5);
    }

    #[test]
    fn notes_default_to_empty() {
        let mut body = ana_json();
        body.as_object_mut().unwrap().remove("optional_notes");
        assert_eq!(PlanInput::from_json(&body).unwrap().optional_notes, "");
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let mut body = ana_json();
        body["age"] = json!(12);
        body["height_cm"] = json!(300);
        body["weight_kg"] = json!(19.5);
        let err = PlanInput::from_json(&body).unwrap_err();
        assert_eq!(paths(&err), vec!["/age", "/height_cm", "/weight_kg"]);
        assert_eq!(err.violations[0].reason, "must be between 16 and 100");
    }

    #[test]
    fn rejects_fractional_age() {
        let mut body = ana_json();
        body["age"] = json!(30.5);
        let err = PlanInput::from_json(&body).unwrap_err();
        assert_eq!(paths(&err), vec!["/age"]);
        assert_eq!(err.violations[0].reason, "must be a whole number");
    }

    #[test]
    fn rejects_unknown_labels_without_coercion() {
        let mut body = ana_json();
        body["gender"] = json!("female");
        body["dietary_preference"] = json!("Pescatarian");
        let err = PlanInput::from_json(&body).unwrap_err();
        assert_eq!(paths(&err), vec!["/dietary_preference", "/gender"]);
        assert!(err.violations[0].reason.contains("Pescatarian"));
        assert!(err.violations[0].reason.contains("Vegan"));
    }

    #[test]
    fn reports_missing_and_mistyped_fields() {
        let body = json!({ "name": 7, "age": "old" });
        let err = PlanInput::from_json(&body).unwrap_err();
        assert!(paths(&err).contains(&"/name"));
        assert!(paths(&err).contains(&"/age"));
        assert!(paths(&err).contains(&"/fitness_goal"));
        let name = err.violations.iter().find(|v| v.path == "/name").unwrap();
        assert_eq!(name.reason, "must be a string");
    }

    #[test]
    fn rejects_short_name_and_long_notes() {
        let mut body = ana_json();
        body["name"] = json!("A");
        body["optional_notes"] = json!("x".repeat(501));
        let err = PlanInput::from_json(&body).unwrap_err();
        assert_eq!(paths(&err), vec!["/name", "/optional_notes"]);
    }

    #[test]
    fn rejects_non_object_body() {
        let err = PlanInput::from_json(&json!("hello")).unwrap_err();
        assert_eq!(paths(&err), vec!["/"]);
    }

    #[test]
    fn labels_round_trip_through_serde() {
        let goal: FitnessGoal = serde_json::from_value(json!("Muscle Gain")).unwrap();
        assert_eq!(goal, FitnessGoal::MuscleGain);
        assert_eq!(serde_json::to_value(DietaryPreference::NonVeg).unwrap(), json!("Non-Veg"));
        assert_eq!("General Fitness".parse::<FitnessGoal>(), Ok(FitnessGoal::GeneralFitness));
    }
}
