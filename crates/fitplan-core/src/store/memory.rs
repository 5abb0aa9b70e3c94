//! In-process plan store. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::{ChangeFeed, NewPlanRecord, PlanRecord, PlanScope, PlanStore, StoreError};

const CHANGE_BUFFER: usize = 64;

type Records = HashMap<PlanScope, Vec<PlanRecord>>;

pub struct MemoryPlanStore {
    records: Mutex<Records>,
    changed: broadcast::Sender<PlanScope>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            records: Mutex::new(HashMap::new()),
            changed,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn notify(&self, scope: &PlanScope) {
        // No receivers is fine.
        let _ = self.changed.send(scope.clone());
    }
}

impl Default for MemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn insert(
        &self,
        scope: &PlanScope,
        record: NewPlanRecord,
    ) -> Result<PlanRecord, StoreError> {
        let stored = PlanRecord {
            id: Uuid::new_v4(),
            name: record.name,
            goal: record.goal,
            level: record.level,
            plan_json: record.plan_json,
            created_at: Utc::now(),
        };
        self.lock()?
            .entry(scope.clone())
            .or_default()
            .push(stored.clone());
        self.notify(scope);
        Ok(stored)
    }

    async fn list(&self, scope: &PlanScope) -> Result<Vec<PlanRecord>, StoreError> {
        let records = self.lock()?;
        let mut out: Vec<PlanRecord> = records
            .get(scope)
            .map(|v| v.iter().rev().cloned().collect())
            .unwrap_or_default();
        // Stable: equal timestamps keep newest-inserted first.
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get(&self, scope: &PlanScope, id: Uuid) -> Result<Option<PlanRecord>, StoreError> {
        Ok(self
            .lock()?
            .get(scope)
            .and_then(|v| v.iter().find(|r| r.id == id).cloned()))
    }

    async fn delete(&self, scope: &PlanScope, id: Uuid) -> Result<bool, StoreError> {
        let removed = {
            let mut records = self.lock()?;
            match records.get_mut(scope) {
                Some(v) => {
                    let before = v.len();
                    v.retain(|r| r.id != id);
                    v.len() != before
                }
                None => false,
            }
        };
        if removed {
            self.notify(scope);
        }
        Ok(removed)
    }

    async fn changes(&self, scope: &PlanScope) -> Result<ChangeFeed, StoreError> {
        let scope = scope.clone();
        let feed =
            BroadcastStream::new(self.changed.subscribe()).filter_map(move |msg| match msg {
                Ok(changed) if changed == scope => Some(()),
                Ok(_) => None,
                // Lagged: notifications were dropped, so re-read anyway.
                Err(_) => Some(()),
            });
        Ok(Box::pin(feed))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn record(name: &str) -> NewPlanRecord {
        NewPlanRecord {
            name: name.into(),
            goal: "Endurance".into(),
            level: "Advanced".into(),
            plan_json: "{}".into(),
        }
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped() {
        let store = MemoryPlanStore::new();
        let ana = PlanScope::new("app", "ana");
        let bo = PlanScope::new("app", "bo");

        store.insert(&ana, record("first")).await.unwrap();
        store.insert(&ana, record("second")).await.unwrap();
        store.insert(&bo, record("other")).await.unwrap();

        let names: Vec<_> = store
            .list(&ana)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["second", "first"]);
        assert!(store.list(&PlanScope::new("other-app", "ana")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_only_within_scope() {
        let store = MemoryPlanStore::new();
        let ana = PlanScope::new("app", "ana");
        let rec = store.insert(&ana, record("p")).await.unwrap();

        assert!(!store.delete(&PlanScope::new("app", "bo"), rec.id).await.unwrap());
        assert!(store.get(&ana, rec.id).await.unwrap().is_some());
        assert!(store.delete(&ana, rec.id).await.unwrap());
        assert!(store.get(&ana, rec.id).await.unwrap().is_none());
        assert!(!store.delete(&ana, rec.id).await.unwrap());
    }

    #[tokio::test]
    async fn change_feed_sees_only_its_scope() {
        let store = MemoryPlanStore::new();
        let ana = PlanScope::new("app", "ana");
        let mut feed = store.changes(&ana).await.unwrap();

        store.insert(&PlanScope::new("app", "bo"), record("x")).await.unwrap();
        store.insert(&ana, record("y")).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), feed.next()).await;
        assert_eq!(got.unwrap(), Some(()));
        let nothing = tokio::time::timeout(Duration::from_millis(50), feed.next()).await;
        assert!(nothing.is_err(), "unexpected extra notification");
    }
}
