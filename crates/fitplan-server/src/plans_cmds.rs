//! Operator CLI handlers for `fitplan plans` subcommands.
//!
//! - `fitplan plans list`          -- saved plans for a user, newest first
//! - `fitplan plans delete <id>`   -- remove one saved plan
//! - `fitplan plans export <id>`   -- write a saved plan as JSON

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use fitplan_core::plan;
use fitplan_core::store::{PlanLibrary, PlanStore, SavedPlan, StaticIdentity};

use crate::PlansCommands;

pub async fn run_plans_command(
    command: PlansCommands,
    store: Arc<dyn PlanStore>,
    app_id: &str,
) -> Result<()> {
    let library = |user: &str| -> Result<PlanLibrary> {
        let identity = StaticIdentity::new(user)?;
        Ok(PlanLibrary::new(
            Arc::clone(&store),
            Arc::new(identity),
            app_id,
        ))
    };

    match command {
        PlansCommands::List { user } => {
            let plans = library(&user)?.list().await?;
            print!("{}", format_plan_list(&plans));
        }
        PlansCommands::Delete { id, user } => {
            let id = parse_id(&id)?;
            library(&user)?.delete(id).await?;
            println!("Deleted saved plan {id}.");
        }
        PlansCommands::Export { id, user, output } => {
            let id = parse_id(&id)?;
            let saved = library(&user)?.get(id).await?;
            let text = plan::export_json(&saved.plan)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("failed to write {path}"))?;
                    println!("Wrote {path}");
                }
                None => println!("{text}"),
            }
        }
    }
    Ok(())
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("invalid plan ID: {id}"))
}

/// Render saved plans as an aligned text table.
pub fn format_plan_list(plans: &[SavedPlan]) -> String {
    if plans.is_empty() {
        return "No saved plans.\n".to_string();
    }

    let name_width = plans
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = format!(
        "{:<36}  {:<name_width$}  {:<16}  {:<12}  {}\n",
        "ID", "NAME", "GOAL", "LEVEL", "CREATED"
    );
    for p in plans {
        out.push_str(&format!(
            "{:<36}  {:<name_width$}  {:<16}  {:<12}  {}\n",
            p.id,
            p.name,
            p.goal,
            p.level,
            p.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use fitplan_core::plan::{AiTips, GeneratedPlan};

    use super::*;

    fn saved(name: &str) -> SavedPlan {
        SavedPlan {
            id: Uuid::nil(),
            name: name.into(),
            goal: "Muscle Gain".into(),
            level: "Intermediate".into(),
            plan: GeneratedPlan {
                workout_plan: Vec::new(),
                diet_plan: Vec::new(),
                ai_tips: AiTips {
                    posture: String::new(),
                    lifestyle: String::new(),
                    extra: Default::default(),
                },
                extra: Default::default(),
            },
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn empty_list_message() {
        assert_eq!(format_plan_list(&[]), "No saved plans.\n");
    }

    #[test]
    fn table_has_header_and_rows() {
        let text = format_plan_list(&[saved("Bulk block")]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("00000000-0000-0000-0000-000000000000"));
        assert!(lines[1].contains("Bulk block"));
        assert!(lines[1].ends_with("2025-06-01 09:30"));
    }
}
