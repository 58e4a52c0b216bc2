//! Offline-aware entity repositories.
//!
//! Writes land in the local cache and the pending queue in one transaction
//! and return as soon as that commits; replay is left to the coordinator.

use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use super::coordinator::SyncCoordinator;
use super::queue::PendingQueue;
use crate::db::{LocalStore, Record, StoreError};
use crate::models::{CachedEntity, ExerciseEntry, MealEntry, NewOperation, WeightEntry};

pub type WeightRepository = OfflineRepository<WeightEntry>;
pub type MealRepository = OfflineRepository<MealEntry>;
pub type ExerciseRepository = OfflineRepository<ExerciseEntry>;

pub struct OfflineRepository<E> {
    store: LocalStore,
    queue: PendingQueue,
    coordinator: Arc<SyncCoordinator>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for OfflineRepository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            queue: self.queue.clone(),
            coordinator: self.coordinator.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: CachedEntity> OfflineRepository<E> {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        let queue = coordinator.queue().clone();
        Self {
            store: queue.store().clone(),
            queue,
            coordinator,
            _entity: PhantomData,
        }
    }

    /// Creates an entity with a client-issued id, caches it as pending and
    /// queues its create. Returns once both are durable.
    pub async fn create_offline(&self, draft: E::Draft) -> Result<E, StoreError> {
        let mut entity = E::from_draft(Uuid::now_v7(), draft);
        entity.set_pending(true);

        let op = NewOperation::create(E::ENTITY_TYPE, &entity).map_err(|source| {
            StoreError::Serialization {
                region: E::REGION.table(),
                source,
            }
        })?;

        let mut tx = self.store.begin().await?;
        tx.put(&entity).await?;
        let op_id = self.queue.enqueue_in(&mut tx, op).await?;
        tx.commit().await?;

        tracing::debug!(
            "Created {} {} offline (operation {})",
            E::ENTITY_TYPE,
            entity.id(),
            op_id
        );
        self.kick().await;

        Ok(entity)
    }

    /// Applies a shallow patch to the cached entity and queues the update.
    /// Returns `None` if the entity is not cached.
    ///
    /// `id` and `is_pending` are owned locally; patch keys for them are
    /// dropped before the patch is applied or queued.
    pub async fn update_offline(
        &self,
        id: Uuid,
        mut patch: Map<String, Value>,
    ) -> Result<Option<E>, StoreError> {
        for key in RESERVED_FIELDS {
            if patch.remove(key).is_some() {
                tracing::debug!("Ignoring '{}' in {} patch for {}", key, E::ENTITY_TYPE, id);
            }
        }

        let mut tx = self.store.begin().await?;

        let Some(current) = tx.get::<E>(&id.to_string()).await? else {
            return Ok(None);
        };

        let mut updated = apply_patch(&current, &patch)?;
        updated.set_pending(true);

        tx.put(&updated).await?;
        self.queue
            .enqueue_in(
                &mut tx,
                NewOperation::update(E::ENTITY_TYPE, id, Value::Object(patch)),
            )
            .await?;
        tx.commit().await?;

        self.kick().await;
        Ok(Some(updated))
    }

    /// Removes the cached entity and queues the delete. Returns whether a
    /// cached row existed; the delete is queued either way.
    pub async fn delete_offline(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.store.begin().await?;
        let existed = tx.delete(E::REGION, &id.to_string()).await?;
        self.queue
            .enqueue_in(&mut tx, NewOperation::delete(E::ENTITY_TYPE, id))
            .await?;
        tx.commit().await?;

        self.kick().await;
        Ok(existed)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<E>, StoreError> {
        self.store.get(&id.to_string()).await
    }

    /// Cached entities in recorded-time order.
    pub async fn list(&self) -> Result<Vec<E>, StoreError> {
        self.store.scan(None).await
    }

    /// Overwrites the cache with authoritative rows from the server.
    pub async fn refresh_from_server(&self, mut rows: Vec<E>) -> Result<usize, StoreError> {
        for row in &mut rows {
            row.set_pending(false);
        }
        self.store.put_many(&rows).await?;
        Ok(rows.len())
    }

    /// Online: starts a pass without waiting for it. Offline: refreshes the
    /// pending badge.
    async fn kick(&self) {
        if self.coordinator.is_online() {
            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = coordinator.sync().await {
                    tracing::warn!("Background sync failed: {}", e);
                }
            });
        } else if let Err(e) = self.coordinator.refresh_pending_count().await {
            tracing::warn!("Failed to refresh pending count: {}", e);
        }
    }
}

/// Fields a patch may not touch.
const RESERVED_FIELDS: [&str; 2] = ["id", "is_pending"];

fn apply_patch<E: Record>(current: &E, patch: &Map<String, Value>) -> Result<E, StoreError> {
    let serialization = |source| StoreError::Serialization {
        region: E::REGION.table(),
        source,
    };

    let mut value = serde_json::to_value(current).map_err(serialization)?;
    if let Value::Object(fields) = &mut value {
        for (key, field) in patch {
            fields.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).map_err(serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, MealType, NewMeal, NewWeight};
    use crate::sync::coordinator::tests::harness;
    use crate::sync::coordinator::{SyncOutcome, SyncStatus};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    async fn wait_for_empty_queue(repo: &WeightRepository) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while repo.queue.count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_offline_caches_and_queues() {
        let h = harness(false).await;
        let repo = WeightRepository::new(h.coordinator.clone());

        let entry = repo
            .create_offline(NewWeight::new(70.0).with_notes("morning"))
            .await
            .unwrap();
        assert!(entry.is_pending);

        let cached = repo.get(entry.id).await.unwrap().unwrap();
        assert_eq!(cached, entry);

        let ops = repo.queue.list_ordered().await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].entity_type, EntityType::Weight);
        assert_eq!(ops[0].target_id(), Some(entry.id.to_string().as_str()));
        assert_eq!(ops[0].payload["weight_kg"], 70.0);
    }

    #[tokio::test]
    async fn test_offline_writes_drain_in_order_when_back_online() {
        let h = harness(false).await;
        h.coordinator.watch_network();
        let repo = WeightRepository::new(h.coordinator.clone());

        for kg in [70.0, 70.2, 69.8] {
            repo.create_offline(NewWeight::new(kg)).await.unwrap();
        }
        assert_eq!(repo.queue.count().await.unwrap(), 3);
        let cached = repo.list().await.unwrap();
        assert_eq!(cached.len(), 3);
        assert!(cached.iter().all(|w| w.is_pending));

        h.network.set_online(true);
        wait_for_empty_queue(&repo).await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.coordinator.status() != SyncStatus::Idle {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let posted: Vec<f64> = h
            .remote
            .calls()
            .iter()
            .map(|(method, path, body)| {
                assert_eq!(method, "POST");
                assert_eq!(path, "/weights");
                body.as_ref().unwrap()["weight_kg"].as_f64().unwrap()
            })
            .collect();
        assert_eq!(posted, vec![70.0, 70.2, 69.8]);
        assert!(repo.list().await.unwrap().iter().all(|w| !w.is_pending));
    }

    #[tokio::test]
    async fn test_second_replay_failing_is_dead_lettered_after_budget() {
        let h = harness(false).await;
        let repo = WeightRepository::new(h.coordinator.clone());
        for kg in [70.0, 70.2, 69.8] {
            repo.create_offline(NewWeight::new(kg)).await.unwrap();
        }
        h.remote.fail_weight(70.2);
        h.network.set_online(true);

        let mut last = SyncOutcome::default();
        for _ in 0..4 {
            last = h.coordinator.sync().await.unwrap();
        }

        assert_eq!(last.failed, 1);
        assert_eq!(h.coordinator.status(), SyncStatus::Error);
        assert_eq!(repo.queue.count().await.unwrap(), 0);
        assert_eq!(repo.queue.dead_letters().await.unwrap().len(), 1);

        let attempts = h
            .remote
            .calls()
            .iter()
            .filter(|(_, _, body)| body.as_ref().unwrap()["weight_kg"] == 70.2)
            .count();
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn test_create_online_triggers_background_sync() {
        let h = harness(true).await;
        let repo = WeightRepository::new(h.coordinator.clone());

        let entry = repo.create_offline(NewWeight::new(71.3)).await.unwrap();
        assert!(entry.is_pending);

        wait_for_empty_queue(&repo).await;
        assert_eq!(h.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_badge_refreshes_while_offline() {
        let h = harness(false).await;
        let repo = WeightRepository::new(h.coordinator.clone());

        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        let _sub = h.coordinator.subscribe(move |_, count| sink.lock().unwrap().push(count));

        repo.create_offline(NewWeight::new(70.0)).await.unwrap();

        assert_eq!(counts.lock().unwrap().clone(), vec![0, 1]);
        assert_eq!(h.coordinator.pending_count(), 1);
        assert_eq!(h.coordinator.status(), SyncStatus::Offline);
    }

    #[tokio::test]
    async fn test_update_and_delete_offline() {
        let h = harness(false).await;
        let meals = MealRepository::new(h.coordinator.clone());

        let meal = meals
            .create_offline(NewMeal::new("Soup", MealType::Lunch).with_calories(300))
            .await
            .unwrap();

        let mut patch = Map::new();
        patch.insert("calories".to_string(), json!(280));
        let updated = meals.update_offline(meal.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.calories, Some(280));
        assert_eq!(updated.name, "Soup");

        assert!(meals.update_offline(Uuid::new_v4(), Map::new()).await.unwrap().is_none());

        assert!(meals.delete_offline(meal.id).await.unwrap());
        assert!(meals.get(meal.id).await.unwrap().is_none());

        let actions: Vec<String> = meals
            .queue
            .list_ordered()
            .await
            .unwrap()
            .iter()
            .map(|op| op.action.to_string())
            .collect();
        assert_eq!(actions, vec!["create", "update", "delete"]);
    }

    #[tokio::test]
    async fn test_update_after_confirmed_create_clears_pending_once_replayed() {
        let h = harness(true).await;
        let weights = WeightRepository::new(h.coordinator.clone());
        let entry = weights.create_offline(NewWeight::new(70.0)).await.unwrap();
        wait_for_empty_queue(&weights).await;
        h.coordinator.sync().await.unwrap();
        assert!(!weights.get(entry.id).await.unwrap().unwrap().is_pending);

        h.network.set_online(false);
        let mut patch = Map::new();
        patch.insert("notes".to_string(), json!("after run"));
        let updated = weights.update_offline(entry.id, patch).await.unwrap().unwrap();
        assert!(updated.is_pending);

        h.network.set_online(true);
        let outcome = h.coordinator.sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome { success: 1, failed: 0 });

        let cached = weights.get(entry.id).await.unwrap().unwrap();
        assert_eq!(cached.notes.as_deref(), Some("after run"));
        assert!(!cached.is_pending);
    }

    #[tokio::test]
    async fn test_pending_flag_stays_while_a_later_write_is_queued() {
        let h = harness(false).await;
        let weights = WeightRepository::new(h.coordinator.clone());
        let entry = weights.create_offline(NewWeight::new(70.0)).await.unwrap();

        let mut patch = Map::new();
        patch.insert("notes".to_string(), json!("evening"));
        weights.update_offline(entry.id, patch).await.unwrap();

        h.remote.fail_path(&format!("/weights/{}", entry.id));
        h.network.set_online(true);
        let outcome = h.coordinator.sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome { success: 1, failed: 1 });

        // The create went through but the update is still queued.
        assert!(weights.get(entry.id).await.unwrap().unwrap().is_pending);
    }

    #[tokio::test]
    async fn test_update_cannot_rewrite_id_or_pending_flag() {
        let h = harness(false).await;
        let weights = WeightRepository::new(h.coordinator.clone());
        let entry = weights.create_offline(NewWeight::new(70.0)).await.unwrap();

        let other = Uuid::new_v4();
        let mut patch = Map::new();
        patch.insert("id".to_string(), json!(other));
        patch.insert("is_pending".to_string(), json!(false));
        patch.insert("weight_kg".to_string(), json!(71.0));

        let updated = weights.update_offline(entry.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.id, entry.id);
        assert!(updated.is_pending);
        assert_eq!(updated.weight_kg, 71.0);

        let rows = weights.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, entry.id);
        assert!(weights.get(other).await.unwrap().is_none());

        let ops = weights.queue.list_ordered().await.unwrap();
        assert_eq!(ops[1].target_id(), Some(entry.id.to_string().as_str()));
        assert_eq!(ops[1].payload["patch"], json!({ "weight_kg": 71.0 }));
    }

    #[tokio::test]
    async fn test_invalid_patch_is_rejected_without_queueing() {
        let h = harness(false).await;
        let weights = WeightRepository::new(h.coordinator.clone());
        let entry = weights.create_offline(NewWeight::new(70.0)).await.unwrap();

        let mut patch = Map::new();
        patch.insert("weight_kg".to_string(), json!("heavy"));
        let result = weights.update_offline(entry.id, patch).await;

        assert!(matches!(result, Err(StoreError::Serialization { .. })));
        assert_eq!(weights.queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_from_server_overwrites_cache() {
        let h = harness(false).await;
        let weights = WeightRepository::new(h.coordinator.clone());
        let entry = weights.create_offline(NewWeight::new(70.0)).await.unwrap();

        let mut confirmed = entry.clone();
        confirmed.weight_kg = 70.1;
        let refreshed = weights.refresh_from_server(vec![confirmed]).await.unwrap();
        assert_eq!(refreshed, 1);

        let cached = weights.get(entry.id).await.unwrap().unwrap();
        assert_eq!(cached.weight_kg, 70.1);
        assert!(!cached.is_pending);
    }
}
