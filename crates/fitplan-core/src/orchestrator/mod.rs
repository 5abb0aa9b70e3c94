//! Plan-request orchestrator: prompt, one upstream call, parse, validate.
//!
//! There are no retries at this layer. A plan is only ever returned after
//! it has passed schema validation; every other outcome is a typed
//! [`GenerationError`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::llm::{GenerationClient, GenerationRequest};
use crate::plan::{GeneratedPlan, PlanInput, Violation, build_prompt, parse_plan, plan_schema};
use crate::upstream::UpstreamError;

pub const DEFAULT_PLAN_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(90);

#[derive(Debug, Error)]
pub enum GenerationError {
    /// No generation credentials are configured.
    #[error("plan generation is not configured (missing API key)")]
    NotConfigured,

    #[error("upstream returned no text")]
    EmptyResponse,

    #[error("upstream text is not valid JSON: {message}")]
    MalformedJson { message: String, raw: String },

    #[error("generated plan failed schema validation ({} violation(s))", .0.len())]
    SchemaViolation(Vec<Violation>),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    /// Violations to report to the caller, when there are any.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::SchemaViolation(v) => Some(v),
            _ => None,
        }
    }
}

pub struct PlanOrchestrator {
    client: Arc<dyn GenerationClient>,
    model: String,
    deadline: Duration,
}

impl PlanOrchestrator {
    pub fn new(client: Arc<dyn GenerationClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a validated plan for `input`.
    pub async fn generate(&self, input: &PlanInput) -> Result<GeneratedPlan, GenerationError> {
        let request = GenerationRequest::json(&self.model, build_prompt(input), plan_schema());

        info!(
            client = self.client.name(),
            model = %self.model,
            goal = %input.fitness_goal,
            level = %input.fitness_level,
            "requesting plan"
        );

        let reply = match tokio::time::timeout(self.deadline, self.client.generate(&request)).await {
            Ok(reply) => reply?,
            Err(_) => {
                error!(deadline = ?self.deadline, "plan generation timed out");
                return Err(GenerationError::Timeout(self.deadline));
            }
        };

        let text = reply.text.trim();
        if text.is_empty() {
            warn!("upstream returned an empty reply");
            return Err(GenerationError::EmptyResponse);
        }

        let doc: Value = serde_json::from_str(text).map_err(|e| {
            error!(error = %e, raw = %text, "upstream reply is not JSON");
            GenerationError::MalformedJson {
                message: e.to_string(),
                raw: text.to_string(),
            }
        })?;

        let plan = parse_plan(&doc).map_err(|violations| {
            for v in &violations {
                warn!(path = %v.path, reason = %v.reason, "plan schema violation");
            }
            GenerationError::SchemaViolation(violations)
        })?;

        info!(
            days = plan.workout_plan.len(),
            rest_days = plan.rest_days(),
            meals = plan.diet_plan.len(),
            "plan generated"
        );
        Ok(plan)
    }
}
