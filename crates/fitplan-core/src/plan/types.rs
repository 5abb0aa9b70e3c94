//! The generated plan document.
//!
//! Field names match the JSON the model is asked to produce. Every struct
//! keeps unrecognised keys in `extra` so a plan survives a
//! serialize/store/deserialize cycle unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated seven-day workout plan, one day of meals, and coaching tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPlan {
    pub workout_plan: Vec<WorkoutDay>,
    pub diet_plan: Vec<Meal>,
    pub ai_tips: AiTips,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One day of the workout schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    /// Day label, e.g. "Day 1" or "Monday".
    pub day: String,
    /// Focus label, e.g. "Upper Body" or "Rest".
    pub focus: String,
    pub routine: Vec<Exercise>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkoutDay {
    /// Whether the day reads as a rest day (by label or by an empty routine).
    pub fn is_rest_day(&self) -> bool {
        let mentions_rest = |s: &str| s.to_ascii_lowercase().contains("rest");
        self.routine.is_empty() || mentions_rest(&self.focus) || mentions_rest(&self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub exercise: String,
    pub sets: String,
    pub reps: String,
    pub rest: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Meal label, e.g. "Breakfast".
    pub meal: String,
    /// Calorie estimate as free text, e.g. "400 kcal".
    pub calories: String,
    pub items: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiTips {
    pub posture: String,
    pub lifestyle: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeneratedPlan {
    /// Number of days the workout plan marks as rest.
    pub fn rest_days(&self) -> usize {
        self.workout_plan.iter().filter(|d| d.is_rest_day()).count()
    }
}
