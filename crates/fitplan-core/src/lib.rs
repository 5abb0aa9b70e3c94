//! Fitness-plan domain: request validation, schema-constrained plan
//! generation, saved-plan library, image services, and presentation.

pub mod llm;
pub mod media;
pub mod orchestrator;
pub mod plan;
pub mod quotes;
pub mod retry;
pub mod store;
pub mod upstream;

pub use orchestrator::{GenerationError, PlanOrchestrator};
