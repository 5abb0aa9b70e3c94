//! Database query functions for the `saved_plans` table.
//!
//! Every query is scoped by `(app_id, user_id)`; a row is never visible or
//! deletable outside the scope it was written under.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::SavedPlanRow;

/// Channel the `saved_plans_changed` trigger notifies on.
pub const CHANGE_CHANNEL: &str = "saved_plans_changed";

/// Build the notification payload the trigger emits for a scope.
pub fn scope_key(app_id: &str, user_id: &str) -> String {
    format!("{app_id}/{user_id}")
}

/// Parameters for inserting a new saved plan.
#[derive(Debug, Clone)]
pub struct NewSavedPlan<'a> {
    pub app_id: &'a str,
    pub user_id: &'a str,
    pub name: &'a str,
    pub goal: &'a str,
    pub level: &'a str,
    /// JSON-encoded plan document.
    pub plan: &'a str,
}

/// Insert a saved plan. Returns the row with server-generated `id` and
/// `created_at`.
pub async fn insert_saved_plan(pool: &PgPool, new: &NewSavedPlan<'_>) -> Result<SavedPlanRow> {
    let row = sqlx::query_as::<_, SavedPlanRow>(
        "INSERT INTO saved_plans (app_id, user_id, name, goal, level, plan) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.app_id)
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.goal)
    .bind(new.level)
    .bind(new.plan)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert saved plan {:?}", new.name))?;

    Ok(row)
}

/// List the saved plans in a scope, newest first.
pub async fn list_saved_plans(
    pool: &PgPool,
    app_id: &str,
    user_id: &str,
) -> Result<Vec<SavedPlanRow>> {
    let rows = sqlx::query_as::<_, SavedPlanRow>(
        "SELECT * FROM saved_plans \
         WHERE app_id = $1 AND user_id = $2 \
         ORDER BY created_at DESC, id",
    )
    .bind(app_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list saved plans")?;

    Ok(rows)
}

/// Fetch one saved plan within a scope.
pub async fn get_saved_plan(
    pool: &PgPool,
    app_id: &str,
    user_id: &str,
    id: Uuid,
) -> Result<Option<SavedPlanRow>> {
    let row = sqlx::query_as::<_, SavedPlanRow>(
        "SELECT * FROM saved_plans WHERE id = $1 AND app_id = $2 AND user_id = $3",
    )
    .bind(id)
    .bind(app_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch saved plan")?;

    Ok(row)
}

/// Delete a saved plan within a scope. Returns `false` when no row matched.
pub async fn delete_saved_plan(
    pool: &PgPool,
    app_id: &str,
    user_id: &str,
    id: Uuid,
) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM saved_plans WHERE id = $1 AND app_id = $2 AND user_id = $3")
            .bind(id)
            .bind(app_id)
            .bind(user_id)
            .execute(pool)
            .await
            .context("failed to delete saved plan")?;

    Ok(result.rows_affected() > 0)
}
