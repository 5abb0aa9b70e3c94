//! PostgreSQL plan store backed by the `saved_plans` table.
//!
//! Changes are observed through `LISTEN saved_plans_changed`; the table
//! trigger sends the scope key as the payload. One listener connection,
//! outside the query pool, serves every subscriber of a store.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgListener, PgPoolOptions};
use tokio::sync::{Mutex, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fitplan_db::models::SavedPlanRow;
use fitplan_db::queries::saved_plans::{self, CHANGE_CHANNEL, NewSavedPlan, scope_key};

use super::{ChangeFeed, NewPlanRecord, PlanRecord, PlanScope, PlanStore, StoreError};

const CHANGE_BUFFER: usize = 256;

/// Relayed notification: the changed scope key, or `None` after the
/// listener reconnected and notifications may have been missed.
type ChangeNotice = Option<String>;

type RelaySlot = Arc<Mutex<Option<broadcast::Sender<ChangeNotice>>>>;

#[derive(Clone)]
pub struct PgPlanStore {
    pool: PgPool,
    /// Fan-out of the shared listener; `None` until the first `changes`
    /// call and again after the listener fails.
    relay: RelaySlot,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            relay: Arc::new(Mutex::new(None)),
        }
    }

    async fn change_receiver(&self) -> Result<broadcast::Receiver<ChangeNotice>, StoreError> {
        let mut slot = self.relay.lock().await;
        if let Some(tx) = slot.as_ref() {
            return Ok(tx.subscribe());
        }

        let listener = open_listener(&self.pool).await?;
        let (tx, rx) = broadcast::channel(CHANGE_BUFFER);
        *slot = Some(tx.clone());
        tokio::spawn(relay_changes(listener, tx, Arc::clone(&self.relay)));
        Ok(rx)
    }
}

/// LISTEN on a dedicated single-connection pool built from the query
/// pool's options, so subscribers never hold query connections.
async fn open_listener(pool: &PgPool) -> Result<PgListener, StoreError> {
    let options = (*pool.connect_options()).clone();
    let listen_pool = PgPoolOptions::new()
        .max_connections(1)
        .max_lifetime(None)
        .idle_timeout(None)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Unavailable(format!("failed to open listener: {e}")))?;

    let mut listener = PgListener::connect_with(&listen_pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("failed to open listener: {e}")))?;
    listener
        .listen(CHANGE_CHANNEL)
        .await
        .map_err(|e| StoreError::Unavailable(format!("failed to LISTEN: {e}")))?;
    info!(channel = CHANGE_CHANNEL, "plan change listener started");
    Ok(listener)
}

async fn relay_changes(
    mut listener: PgListener,
    tx: broadcast::Sender<ChangeNotice>,
    slot: RelaySlot,
) {
    loop {
        match listener.try_recv().await {
            // No receivers is fine.
            Ok(Some(note)) => {
                let _ = tx.send(Some(note.payload().to_string()));
            }
            Ok(None) => {
                warn!("plan change listener reconnected");
                let _ = tx.send(None);
            }
            Err(e) => {
                warn!(error = %e, "plan change listener failed");
                break;
            }
        }
    }
    // Receivers see the feed close once both senders are gone.
    slot.lock().await.take();
}

impl From<SavedPlanRow> for PlanRecord {
    fn from(row: SavedPlanRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            goal: row.goal,
            level: row.level,
            plan_json: row.plan,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn insert(
        &self,
        scope: &PlanScope,
        record: NewPlanRecord,
    ) -> Result<PlanRecord, StoreError> {
        let new = NewSavedPlan {
            app_id: &scope.app_id,
            user_id: &scope.user_id,
            name: &record.name,
            goal: &record.goal,
            level: &record.level,
            plan: &record.plan_json,
        };
        let row = saved_plans::insert_saved_plan(&self.pool, &new)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(row.into())
    }

    async fn list(&self, scope: &PlanScope) -> Result<Vec<PlanRecord>, StoreError> {
        let rows = saved_plans::list_saved_plans(&self.pool, &scope.app_id, &scope.user_id)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(rows.into_iter().map(PlanRecord::from).collect())
    }

    async fn get(&self, scope: &PlanScope, id: Uuid) -> Result<Option<PlanRecord>, StoreError> {
        let row = saved_plans::get_saved_plan(&self.pool, &scope.app_id, &scope.user_id, id)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(row.map(PlanRecord::from))
    }

    async fn delete(&self, scope: &PlanScope, id: Uuid) -> Result<bool, StoreError> {
        saved_plans::delete_saved_plan(&self.pool, &scope.app_id, &scope.user_id, id)
            .await
            .map_err(StoreError::unavailable)
    }

    async fn changes(&self, scope: &PlanScope) -> Result<ChangeFeed, StoreError> {
        let key = scope_key(&scope.app_id, &scope.user_id);
        debug!(channel = CHANGE_CHANNEL, scope = %key, "subscribing to plan changes");

        let feed = BroadcastStream::new(self.change_receiver().await?).filter_map(
            move |notice| match notice {
                Ok(Some(changed)) if changed == key => Some(()),
                Ok(Some(_)) => None,
                // Reconnected or lagged: notifications were lost, so re-read.
                Ok(None) | Err(_) => Some(()),
            },
        );
        Ok(Box::pin(feed))
    }
}
