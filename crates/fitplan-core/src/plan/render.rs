//! Presentation helpers: markdown rendering, text-to-speech scripts, and
//! the JSON export document.
//!
//! Formatting only; nothing here inspects or changes plan content.

use serde::Serialize;

use super::types::{Exercise, GeneratedPlan};

/// File name offered for plan downloads.
pub const EXPORT_FILE_NAME: &str = "personalized_fitness_plan.json";

/// Spoken-text scripts for a plan, ready to hand to a speech synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narration {
    /// One line per day: "Day 1, focus: Full Body. Day 2, ...".
    pub workout_overview: String,
    /// One line per meal: "Breakfast with oats, berries. ...".
    pub diet_overview: String,
    /// Per-exercise scripts, indexed like `workout_plan[day].routine[i]`.
    pub exercises: Vec<Vec<String>>,
    /// Per-item scripts, indexed like `diet_plan[meal].items[i]`.
    pub meal_items: Vec<Vec<String>>,
}

/// Spoken description of a single exercise.
pub fn exercise_script(ex: &Exercise) -> String {
    format!(
        "{}. Do {} sets of {} reps with {} rest between sets.",
        ex.exercise, ex.sets, ex.reps, ex.rest
    )
}

pub fn narration(plan: &GeneratedPlan) -> Narration {
    let workout_overview = plan
        .workout_plan
        .iter()
        .map(|d| format!("{}, focus: {}", d.day, d.focus))
        .collect::<Vec<_>>()
        .join(". ");

    let diet_overview = plan
        .diet_plan
        .iter()
        .map(|m| format!("{} with {}", m.meal, m.items.join(", ")))
        .collect::<Vec<_>>()
        .join(". ");

    Narration {
        workout_overview,
        diet_overview,
        exercises: plan
            .workout_plan
            .iter()
            .map(|d| d.routine.iter().map(exercise_script).collect())
            .collect(),
        meal_items: plan
            .diet_plan
            .iter()
            .map(|m| m.items.clone())
            .collect(),
    }
}

/// Pretty-printed JSON of the plan, as offered for download.
pub fn export_json(plan: &GeneratedPlan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(plan)
}

/// Render a plan as a markdown document.
pub fn render_markdown(plan: &GeneratedPlan) -> String {
    let mut out = String::new();

    out.push_str("# Your Personalized Plan\n\n");

    out.push_str("## Workout Plan\n\n");
    for day in &plan.workout_plan {
        out.push_str(&format!("### {}: {}\n\n", day.day, day.focus));
        if day.routine.is_empty() {
            out.push_str("_Rest and recover._\n\n");
            continue;
        }
        out.push_str("| Exercise | Sets | Reps | Rest |\n");
        out.push_str("|---|---|---|---|\n");
        for ex in &day.routine {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                ex.exercise, ex.sets, ex.reps, ex.rest
            ));
        }
        out.push('\n');
    }

    out.push_str("## Diet Plan\n\n");
    for meal in &plan.diet_plan {
        out.push_str(&format!("### {} ({})\n\n", meal.meal, meal.calories));
        for item in &meal.items {
            out.push_str(&format!("- {item}\n"));
        }
        out.push('\n');
    }

    out.push_str("## AI Tips\n\n");
    out.push_str(&format!("**Posture:** {}\n\n", plan.ai_tips.posture));
    out.push_str(&format!("**Lifestyle:** {}\n", plan.ai_tips.lifestyle));

    out
}
