//! Saved-plan persistence.
//!
//! [`PlanStore`] is the backend seam: raw records keyed by
//! [`PlanScope`], plus a change feed. [`PlanLibrary`] sits on top and
//! deals in typed, validated plans for the current user.

pub mod identity;
pub mod library;
pub mod memory;
pub mod postgres;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use identity::{AnonymousIdentity, IdentityError, IdentityProvider, StaticIdentity};
pub use library::{PlanLibrary, PlanMetadata, SavedPlan, Subscription};
pub use memory::MemoryPlanStore;
pub use postgres::PgPlanStore;

use crate::plan::Violation;

/// Owner of a set of saved plans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanScope {
    pub app_id: String,
    pub user_id: String,
}

impl PlanScope {
    pub fn new(app_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// A record to insert; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlanRecord {
    pub name: String,
    pub goal: String,
    pub level: String,
    /// JSON-encoded plan document.
    pub plan_json: String,
}

/// A record as stored. `plan_json` is not guaranteed to be a valid plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRecord {
    pub id: Uuid,
    pub name: String,
    pub goal: String,
    pub level: String,
    pub plan_json: String,
    pub created_at: DateTime<Utc>,
}

/// Yields `()` whenever the plans in a scope may have changed.
pub type ChangeFeed = Pin<Box<dyn Stream<Item = ()> + Send>>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or not initialized.
    #[error("plan store unavailable: {0}")]
    Unavailable(String),

    #[error("saved plan {0} not found")]
    NotFound(Uuid),

    #[error("saved plan {id} is corrupt: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("plan failed schema validation ({} violation(s))", .0.len())]
    Invalid(Vec<Violation>),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("failed to encode plan: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn unavailable(e: anyhow::Error) -> Self {
        Self::Unavailable(format!("{e:#}"))
    }
}

/// Storage backend for saved plans.
///
/// Every operation is confined to one scope. `list` returns newest first.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn insert(&self, scope: &PlanScope, record: NewPlanRecord)
    -> Result<PlanRecord, StoreError>;

    async fn list(&self, scope: &PlanScope) -> Result<Vec<PlanRecord>, StoreError>;

    async fn get(&self, scope: &PlanScope, id: Uuid) -> Result<Option<PlanRecord>, StoreError>;

    /// Returns `false` when nothing matched.
    async fn delete(&self, scope: &PlanScope, id: Uuid) -> Result<bool, StoreError>;

    /// Open a change feed. Changes made after this returns are observed.
    async fn changes(&self, scope: &PlanScope) -> Result<ChangeFeed, StoreError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};
