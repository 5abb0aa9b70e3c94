//! The current user's saved plans, as typed and validated documents.
//!
//! Records whose stored plan no longer parses or validates are skipped
//! (and logged) when listing; they never break the rest of the list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::identity::IdentityProvider;
use super::{NewPlanRecord, PlanRecord, PlanScope, PlanStore, StoreError};
use crate::plan::{GeneratedPlan, parse_plan};

/// Descriptive fields stored alongside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub name: String,
    pub goal: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedPlan {
    pub id: Uuid,
    pub name: String,
    pub goal: String,
    pub level: String,
    pub plan: GeneratedPlan,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PlanRecord> for SavedPlan {
    type Error = StoreError;

    fn try_from(record: PlanRecord) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: record.id,
            reason,
        };
        let doc: Value =
            serde_json::from_str(&record.plan_json).map_err(|e| corrupt(e.to_string()))?;
        let plan = parse_plan(&doc).map_err(|violations| {
            let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
            corrupt(reasons.join("; "))
        })?;

        Ok(Self {
            id: record.id,
            name: record.name,
            goal: record.goal,
            level: record.level,
            plan,
            created_at: record.created_at,
        })
    }
}

/// Decode records, dropping the ones that fail.
fn decode_all(records: Vec<PlanRecord>) -> Vec<SavedPlan> {
    records
        .into_iter()
        .filter_map(|record| match SavedPlan::try_from(record) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!(error = %e, "skipping unreadable saved plan");
                None
            }
        })
        .collect()
}

/// Saved plans for one application, on behalf of whoever `identity` says
/// the current user is.
#[derive(Clone)]
pub struct PlanLibrary {
    store: Arc<dyn PlanStore>,
    identity: Arc<dyn IdentityProvider>,
    app_id: String,
}

impl PlanLibrary {
    pub fn new(
        store: Arc<dyn PlanStore>,
        identity: Arc<dyn IdentityProvider>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            app_id: app_id.into(),
        }
    }

    async fn scope(&self) -> Result<PlanScope, StoreError> {
        let user_id = self.identity.user_id().await?;
        Ok(PlanScope::new(self.app_id.clone(), user_id))
    }

    /// Store a plan; returns the store-assigned id.
    pub async fn save(&self, plan: &GeneratedPlan, meta: &PlanMetadata) -> Result<Uuid, StoreError> {
        let doc = serde_json::to_value(plan)?;
        parse_plan(&doc).map_err(StoreError::Invalid)?;

        let scope = self.scope().await?;
        let record = self
            .store
            .insert(
                &scope,
                NewPlanRecord {
                    name: meta.name.clone(),
                    goal: meta.goal.clone(),
                    level: meta.level.clone(),
                    plan_json: serde_json::to_string(&doc)?,
                },
            )
            .await?;

        info!(id = %record.id, user = %scope.user_id, name = %record.name, "plan saved");
        Ok(record.id)
    }

    /// One-shot snapshot, newest first.
    pub async fn list(&self) -> Result<Vec<SavedPlan>, StoreError> {
        let scope = self.scope().await?;
        Ok(decode_all(self.store.list(&scope).await?))
    }

    pub async fn get(&self, id: Uuid) -> Result<SavedPlan, StoreError> {
        let scope = self.scope().await?;
        let record = self
            .store
            .get(&scope, id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        SavedPlan::try_from(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let scope = self.scope().await?;
        if self.store.delete(&scope, id).await? {
            info!(%id, user = %scope.user_id, "plan deleted");
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    /// Deliver the full list to `callback` now and again after every change.
    ///
    /// The first delivery happens before this returns. Delivery stops when
    /// the returned [`Subscription`] is unsubscribed or dropped.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(Vec<SavedPlan>) + Send + Sync + 'static,
    {
        let scope = self.scope().await?;

        // Open the feed before the first snapshot so nothing slips between them.
        let mut feed = self.store.changes(&scope).await?;
        callback(decode_all(self.store.list(&scope).await?));

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let store = Arc::clone(&self.store);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    next = feed.next() => {
                        if next.is_none() {
                            warn!(user = %scope.user_id, "plan change feed closed");
                            break;
                        }
                        match store.list(&scope).await {
                            Ok(records) => callback(decode_all(records)),
                            Err(e) => warn!(error = %e, "failed to refresh saved plans"),
                        }
                    }
                }
            }
            debug!(user = %scope.user_id, "plan subscription ended");
        });

        Ok(Subscription { cancel, handle })
    }
}

/// Handle to a live [`PlanLibrary::subscribe`] listener.
pub struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering updates.
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::plan::schema::tests::sample_plan_json;
    use crate::store::identity::{AnonymousIdentity, StaticIdentity};
    use crate::store::memory::MemoryPlanStore;

    fn sample() -> GeneratedPlan {
        parse_plan(&sample_plan_json()).unwrap()
    }

    fn meta(name: &str) -> PlanMetadata {
        PlanMetadata {
            name: name.into(),
            goal: "Weight Loss".into(),
            level: "Beginner".into(),
        }
    }

    fn library(store: Arc<MemoryPlanStore>) -> PlanLibrary {
        PlanLibrary::new(store, Arc::new(AnonymousIdentity), "test-app")
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<Vec<SavedPlan>>) -> Vec<SavedPlan> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let lib = library(Arc::new(MemoryPlanStore::new()));
        let mut plan = sample();
        plan.extra.insert("coach_note".into(), serde_json::json!("keep going"));

        let id = lib.save(&plan, &meta("Ana's plan")).await.unwrap();
        let saved = lib.get(id).await.unwrap();

        assert_eq!(saved.plan, plan);
        assert_eq!(saved.name, "Ana's plan");
        assert_eq!(saved.goal, "Weight Loss");
    }

    #[tokio::test]
    async fn save_rejects_plan_failing_schema() {
        let lib = library(Arc::new(MemoryPlanStore::new()));
        let mut plan = sample();
        plan.workout_plan.truncate(2);

        let err = lib.save(&plan, &meta("short")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(lib.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_records_are_skipped() {
        let store = Arc::new(MemoryPlanStore::new());
        let lib = library(store.clone());
        for n in 0..3 {
            lib.save(&sample(), &meta(&format!("plan {n}"))).await.unwrap();
        }
        let scope = PlanScope::new("test-app", "anonymous");
        for bad in ["{not json", "{\"workout_plan\": []}"] {
            store
                .insert(
                    &scope,
                    NewPlanRecord {
                        name: "bad".into(),
                        goal: "x".into(),
                        level: "y".into(),
                        plan_json: bad.into(),
                    },
                )
                .await
                .unwrap();
        }

        let plans = lib.list().await.unwrap();
        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.name != "bad"));
    }

    #[tokio::test]
    async fn get_reports_corrupt_and_missing() {
        let store = Arc::new(MemoryPlanStore::new());
        let lib = library(store.clone());
        let rec = store
            .insert(
                &PlanScope::new("test-app", "anonymous"),
                NewPlanRecord {
                    name: "bad".into(),
                    goal: "x".into(),
                    level: "y".into(),
                    plan_json: "[]".into(),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            lib.get(rec.id).await.unwrap_err(),
            StoreError::Corrupt { id, .. } if id == rec.id
        ));
        let missing = Uuid::new_v4();
        assert!(matches!(
            lib.get(missing).await.unwrap_err(),
            StoreError::NotFound(id) if id == missing
        ));
    }

    #[tokio::test]
    async fn users_do_not_see_each_other() {
        let store = Arc::new(MemoryPlanStore::new());
        let ana = PlanLibrary::new(
            store.clone(),
            Arc::new(StaticIdentity::new("ana").unwrap()),
            "app",
        );
        let bo = PlanLibrary::new(store, Arc::new(StaticIdentity::new("bo").unwrap()), "app");

        let id = ana.save(&sample(), &meta("mine")).await.unwrap();
        assert!(bo.list().await.unwrap().is_empty());
        assert!(matches!(bo.delete(id).await, Err(StoreError::NotFound(_))));
        assert_eq!(ana.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscription_delivers_initial_and_updates() {
        let lib = library(Arc::new(MemoryPlanStore::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = lib
            .subscribe(move |plans| {
                let _ = tx.send(plans);
            })
            .await
            .unwrap();
        assert!(recv(&mut rx).await.is_empty());

        let first = lib.save(&sample(), &meta("one")).await.unwrap();
        assert_eq!(recv(&mut rx).await.len(), 1);

        lib.save(&sample(), &meta("two")).await.unwrap();
        let names: Vec<_> = recv(&mut rx).await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["two", "one"]);

        lib.delete(first).await.unwrap();
        assert_eq!(recv(&mut rx).await.len(), 1);
        assert!(sub.is_active());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let lib = library(Arc::new(MemoryPlanStore::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = lib
            .subscribe(move |plans| {
                let _ = tx.send(plans);
            })
            .await
            .unwrap();
        recv(&mut rx).await;

        sub.unsubscribe();
        // The task drops the callback (and its sender) once it observes cancellation.
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "subscription kept running");

        lib.save(&sample(), &meta("after")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
