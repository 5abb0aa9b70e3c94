//! Prompt construction for plan generation.
//!
//! Pure string assembly: every attribute of the [`PlanInput`] is embedded,
//! followed by the three content constraints and the output contract.

use super::input::PlanInput;

/// Build the instruction sent to the generation model.
pub fn build_prompt(input: &PlanInput) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "Generate a highly personalized 7-day fitness plan and a 1-day sample diet plan \
         based on the following user details.\n\n",
    );

    prompt.push_str("User Details:\n");
    prompt.push_str(&format!("- Name: {}\n", input.name));
    prompt.push_str(&format!("- Age: {}\n", input.age));
    prompt.push_str(&format!("- Gender: {}\n", input.gender));
    prompt.push_str(&format!("- Height: {} cm\n", input.height_cm));
    prompt.push_str(&format!("- Weight: {} kg\n", input.weight_kg));
    prompt.push_str(&format!("- Fitness Goal: {}\n", input.fitness_goal));
    prompt.push_str(&format!("- Fitness Level: {}\n", input.fitness_level));
    prompt.push_str(&format!("- Workout Location: {}\n", input.workout_location));
    prompt.push_str(&format!("- Dietary Preference: {}\n", input.dietary_preference));
    let notes = input.optional_notes.trim();
    prompt.push_str(&format!(
        "- Optional Notes/Limitations: {}\n\n",
        if notes.is_empty() { "None" } else { notes }
    ));

    prompt.push_str("Constraints:\n");
    prompt.push_str(&format!(
        "1. Workout Plan: Must be a 7-day schedule with exactly 7 entries. Use a structured \
         split appropriate for the goal and level. Include at least one rest day and label it \
         \"Rest\" in its focus. Ensure exercises suit the Workout Location ({}).\n",
        input.workout_location
    ));
    prompt.push_str(&format!(
        "2. Diet Plan: Provide one full day of eating (Breakfast, Snack, Lunch, Dinner, Snack) \
         with estimated calories, respecting Dietary Preference ({}) and supporting the \
         Fitness Goal ({}).\n",
        input.dietary_preference, input.fitness_goal
    ));
    prompt.push_str(
        "3. AI Tips: Provide specific tips on Posture and Lifestyle/Motivation.\n\n",
    );

    prompt.push_str(
        "Output MUST be a single JSON object that strictly follows the provided JSON schema. \
         Every value in a routine or meal entry is a string. \
         DO NOT include any text outside the JSON object.\n",
    );

    prompt
}
