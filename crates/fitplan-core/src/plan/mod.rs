//! Plan domain: request input, the generated document, its schema, prompt
//! construction, and presentation.

pub mod input;
pub mod prompt;
pub mod render;
pub mod schema;
pub mod types;

pub use input::{
    DietaryPreference, FitnessGoal, FitnessLevel, Gender, InputError, PlanInput, WorkoutLocation,
};
pub use prompt::build_prompt;
pub use render::{EXPORT_FILE_NAME, Narration, export_json, narration, render_markdown};
pub use schema::{ValidationReport, Violation, parse_plan, plan_schema, validate_plan};
pub use types::{AiTips, Exercise, GeneratedPlan, Meal, WorkoutDay};
