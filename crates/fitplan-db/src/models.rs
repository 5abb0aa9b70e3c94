use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of the `saved_plans` table.
///
/// `plan` is kept as the JSON text it was written with; decoding it into a
/// typed plan is the caller's job, and may fail for rows written by older
/// or buggy clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SavedPlanRow {
    pub id: Uuid,
    pub app_id: String,
    pub user_id: String,
    pub name: String,
    pub goal: String,
    pub level: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}
