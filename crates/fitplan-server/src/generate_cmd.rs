//! `fitplan generate`: produce a plan from the command line.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde_json::{Value, json};

use fitplan_core::plan::{self, PlanInput};
use fitplan_core::store::{PlanLibrary, PlanMetadata, StaticIdentity};
use fitplan_core::{GenerationError, PlanOrchestrator};

use crate::config::FitplanConfig;
use crate::services;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub age: i64,
    /// Male, Female or Other
    #[arg(long)]
    pub gender: String,
    #[arg(long)]
    pub height_cm: f64,
    #[arg(long)]
    pub weight_kg: f64,
    /// Weight Loss, Muscle Gain, Endurance or General Fitness
    #[arg(long)]
    pub goal: String,
    /// Beginner, Intermediate or Advanced
    #[arg(long)]
    pub level: String,
    /// Home, Gym or Outdoor
    #[arg(long)]
    pub location: String,
    /// Veg, Non-Veg, Vegan, Keto or None
    #[arg(long, default_value = "None")]
    pub diet: String,
    /// Injuries, limitations or other notes
    #[arg(long, default_value = "")]
    pub notes: String,
    /// Print the plan as JSON instead of markdown
    #[arg(long)]
    pub json: bool,
    /// Also save the plan for this user
    #[arg(long)]
    pub save_as: Option<String>,
}

impl GenerateArgs {
    fn to_request(&self) -> Value {
        json!({
            "name": self.name,
            "age": self.age,
            "gender": self.gender,
            "height_cm": self.height_cm,
            "weight_kg": self.weight_kg,
            "fitness_goal": self.goal,
            "fitness_level": self.level,
            "workout_location": self.location,
            "dietary_preference": self.diet,
            "optional_notes": self.notes,
        })
    }

    /// Validate the arguments exactly as the HTTP endpoint validates a body.
    pub fn to_input(&self) -> Result<PlanInput> {
        PlanInput::from_json(&self.to_request()).map_err(|e| {
            let lines: Vec<String> = e.violations.iter().map(|v| format!("  {v}")).collect();
            anyhow!("invalid plan request:\n{}", lines.join("\n"))
        })
    }
}

pub async fn run_generate(config: &FitplanConfig, args: &GenerateArgs) -> Result<()> {
    let input = args.to_input()?;

    let http = services::http_client()?;
    let orchestrator: Arc<PlanOrchestrator> =
        services::orchestrator(config, &http).ok_or(GenerationError::NotConfigured)?;

    eprintln!("Generating plan with {}...", orchestrator.model());
    let generated = orchestrator.generate(&input).await.map_err(|e| match e {
        GenerationError::SchemaViolation(ref violations) => {
            let lines: Vec<String> = violations.iter().map(|v| format!("  {v}")).collect();
            anyhow!("{e}:\n{}", lines.join("\n"))
        }
        other => anyhow!(other),
    })?;

    if args.json {
        println!("{}", plan::export_json(&generated)?);
    } else {
        print!("{}", plan::render_markdown(&generated));
    }

    if let Some(user) = &args.save_as {
        let store = services::plan_store(config)?;
        let identity = StaticIdentity::new(user.as_str())?;
        let library = PlanLibrary::new(store, Arc::new(identity), config.app_id.clone());
        let meta = PlanMetadata {
            name: format!("{}'s plan", input.name),
            goal: input.fitness_goal.to_string(),
            level: input.fitness_level.to_string(),
        };
        let id = library
            .save(&generated, &meta)
            .await
            .context("failed to save generated plan")?;
        eprintln!("Saved as {id}");
    }

    Ok(())
}
