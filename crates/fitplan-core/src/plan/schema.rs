//! JSON schema for generated plans, and validation against it.
//!
//! The same schema is sent upstream to constrain generation and applied
//! locally to whatever comes back. Validation collects every violation
//! rather than stopping at the first one.

use std::fmt;
use std::sync::LazyLock;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::types::GeneratedPlan;

/// Number of days a workout plan must cover.
pub const WORKOUT_DAYS: u64 = 7;

/// A single validation failure: where it happened and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending value (`/` for the document root).
    pub path: String,
    pub reason: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Outcome of validating a candidate plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

fn object_of(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": true,
    })
}

/// The plan schema as a JSON value.
pub fn plan_schema() -> Value {
    let string = json!({ "type": "string" });

    let exercise = object_of(
        json!({
            "exercise": string,
            "sets": string,
            "reps": string,
            "rest": string,
        }),
        &["exercise", "sets", "reps", "rest"],
    );
    let workout_day = object_of(
        json!({
            "day": string,
            "focus": string,
            "routine": { "type": "array", "items": exercise },
        }),
        &["day", "focus", "routine"],
    );
    let meal = object_of(
        json!({
            "meal": string,
            "calories": string,
            "items": { "type": "array", "items": string },
        }),
        &["meal", "calories", "items"],
    );
    let tips = object_of(
        json!({ "posture": string, "lifestyle": string }),
        &["posture", "lifestyle"],
    );

    object_of(
        json!({
            "workout_plan": {
                "type": "array",
                "items": workout_day,
                "minItems": WORKOUT_DAYS,
                "maxItems": WORKOUT_DAYS,
            },
            "diet_plan": { "type": "array", "items": meal },
            "ai_tips": tips,
        }),
        &["workout_plan", "diet_plan", "ai_tips"],
    )
}

static PLAN_VALIDATOR: LazyLock<JSONSchema> = LazyLock::new(|| {
    JSONSchema::compile(&plan_schema()).expect("built-in plan schema must compile")
});

/// Validate a parsed document against the plan schema.
pub fn validate_plan(candidate: &Value) -> ValidationReport {
    let violations: Vec<Violation> = match PLAN_VALIDATOR.validate(candidate) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                Violation::new(path, e.to_string())
            })
            .collect(),
    };

    ValidationReport {
        valid: violations.is_empty(),
        violations,
    }
}

/// Validate a document and build the typed plan from it.
///
/// Nothing partial is ever returned: either the whole document satisfies
/// the schema and converts, or the violations are returned.
pub fn parse_plan(candidate: &Value) -> Result<GeneratedPlan, Vec<Violation>> {
    let report = validate_plan(candidate);
    if !report.valid {
        return Err(report.violations);
    }
    GeneratedPlan::deserialize(candidate).map_err(|e| vec![Violation::new("/", e.to_string())])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A schema-valid plan with one rest day.
    pub(crate) fn sample_plan_json() -> Value {
        let days: Vec<Value> = (1..=7)
            .map(|n| {
                if n == 7 {
                    json!({ "day": "Day 7", "focus": "Rest", "routine": [] })
                } else {
                    json!({
                        "day": format!("Day {n}"),
                        "focus": "Full Body",
                        "routine": [
                            { "exercise": "Squats", "sets": "3", "reps": "10", "rest": "60s" },
                            { "exercise": "Push-ups", "sets": "3", "reps": "12", "rest": "60s" }
                        ]
                    })
                }
            })
            .collect();

        json!({
            "workout_plan": days,
            "diet_plan": [
                { "meal": "Breakfast", "calories": "400 kcal", "items": ["Oatmeal with berries", "Soy latte"] },
                { "meal": "Lunch", "calories": "600 kcal", "items": ["Lentil salad"] }
            ],
            "ai_tips": {
                "posture": "Keep your back straight during lifts.",
                "lifestyle": "Drink plenty of water."
            }
        })
    }

    #[test]
    fn accepts_valid_plan() {
        let report = validate_plan(&sample_plan_json());
        assert!(report.valid, "unexpected violations: {:?}", report.violations);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn rejects_each_missing_top_level_key() {
        for key in ["workout_plan", "diet_plan", "ai_tips"] {
            let mut doc = sample_plan_json();
            doc.as_object_mut().unwrap().remove(key);
            let report = validate_plan(&doc);
            assert!(!report.valid, "missing {key} should be rejected");
            assert!(
                report.violations.iter().any(|v| v.reason.contains(key)),
                "violation should name {key}: {:?}",
                report.violations
            );
        }
    }

    #[test]
    fn tolerates_extra_fields_everywhere() {
        let mut doc = sample_plan_json();
        doc["notes"] = json!("extra top-level");
        doc["workout_plan"][0]["intensity"] = json!("moderate");
        doc["workout_plan"][0]["routine"][0]["tempo"] = json!("2-0-2");
        doc["diet_plan"][0]["protein"] = json!("25 g");
        doc["ai_tips"]["sleep"] = json!("8 hours");

        let report = validate_plan(&doc);
        assert!(report.valid, "unexpected violations: {:?}", report.violations);
    }

    #[test]
    fn reports_nested_path_for_missing_exercise_field() {
        let mut doc = sample_plan_json();
        doc["workout_plan"][2]["routine"][1]
            .as_object_mut()
            .unwrap()
            .remove("reps");

        let report = validate_plan(&doc);
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].path, "/workout_plan/2/routine/1");
        assert!(report.violations[0].reason.contains("reps"));
    }

    #[test]
    fn collects_all_violations() {
        let mut doc = sample_plan_json();
        doc["diet_plan"][0].as_object_mut().unwrap().remove("calories");
        doc["ai_tips"].as_object_mut().unwrap().remove("posture");
        doc["workout_plan"][0].as_object_mut().unwrap().remove("focus");

        let report = validate_plan(&doc);
        assert_eq!(report.violations.len(), 3, "{:?}", report.violations);
    }

    #[test]
    fn rejects_wrong_day_count() {
        let mut doc = sample_plan_json();
        doc["workout_plan"].as_array_mut().unwrap().truncate(3);
        let report = validate_plan(&doc);
        assert!(!report.valid);
        assert_eq!(report.violations[0].path, "/workout_plan");
    }

    #[test]
    fn rejects_non_string_leaf() {
        let mut doc = sample_plan_json();
        doc["workout_plan"][0]["routine"][0]["sets"] = json!(3);
        let report = validate_plan(&doc);
        assert!(!report.valid);
        assert_eq!(report.violations[0].path, "/workout_plan/0/routine/0/sets");
    }

    #[test]
    fn rejects_non_object_document() {
        let report = validate_plan(&json!(["not", "a", "plan"]));
        assert!(!report.valid);
        assert_eq!(report.violations[0].path, "/");
    }

    #[test]
    fn parse_plan_builds_typed_plan() {
        let plan = parse_plan(&sample_plan_json()).unwrap();
        assert_eq!(plan.workout_plan.len(), 7);
        assert_eq!(plan.rest_days(), 1);
        assert_eq!(plan.diet_plan[0].items[0], "Oatmeal with berries");
    }

    #[test]
    fn parse_plan_returns_violations() {
        let violations = parse_plan(&json!({})).unwrap_err();
        assert_eq!(violations.len(), 3);
    }
}
