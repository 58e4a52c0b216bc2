//! Pending-operation queue over the local store.

use chrono::Utc;
use uuid::Uuid;

use crate::db::{LocalStore, Region, StoreError, StoreTransaction};
use crate::models::{DeadLetter, EntityType, NewOperation, PendingOperation};

/// Typed access to the `pending_operations` and `dead_letters` regions.
#[derive(Clone)]
pub struct PendingQueue {
    store: LocalStore,
}

impl PendingQueue {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Assigns id, `created_at` and a zero retry count, persists, and
    /// returns the new id.
    pub async fn enqueue(&self, op: NewOperation) -> Result<Uuid, StoreError> {
        let op = op.into_pending();
        self.store.put(&op).await?;
        tracing::debug!(id = %op.id, entity = %op.entity_type, action = %op.action, "Enqueued operation");
        Ok(op.id)
    }

    /// Like [`enqueue`](Self::enqueue), inside a caller's transaction.
    pub async fn enqueue_in(
        &self,
        tx: &mut StoreTransaction,
        op: NewOperation,
    ) -> Result<Uuid, StoreError> {
        let op = op.into_pending();
        tx.put(&op).await?;
        Ok(op.id)
    }

    /// FIFO snapshot ordered by `created_at`.
    pub async fn list_ordered(&self) -> Result<Vec<PendingOperation>, StoreError> {
        self.store.scan(None).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<PendingOperation>, StoreError> {
        self.store.get(&id.to_string()).await
    }

    /// Removes an operation. Removing an absent id is a no-op.
    pub async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        self.store
            .delete(Region::PendingOperations, &id.to_string())
            .await?;
        Ok(())
    }

    /// Bumps the retry count and returns the new value, or `None` if the
    /// operation is already gone. A single statement, so it never has to
    /// upgrade a read snapshot to a write.
    pub async fn increment_retry(&self, id: Uuid) -> Result<Option<u32>, StoreError> {
        let retries: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE pending_operations
            SET data = json_set(data, '$.retry_count', json_extract(data, '$.retry_count') + 1),
                updated_at = ?
            WHERE id = ?
            RETURNING json_extract(data, '$.retry_count')
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .fetch_optional(self.store.pool())
        .await?;

        Ok(retries.map(|n| n.max(0) as u32))
    }

    /// Whether any queued operation still targets `target_id`.
    pub async fn has_pending_for(
        &self,
        entity_type: EntityType,
        target_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .list_ordered()
            .await?
            .iter()
            .any(|op| op.entity_type == entity_type && op.target_id() == Some(target_id)))
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.store.count(Region::PendingOperations).await
    }

    /// Moves an operation out of the queue into the dead-letter region.
    pub async fn dead_letter(
        &self,
        op: &PendingOperation,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.store.begin().await?;
        tx.delete(Region::PendingOperations, &op.id.to_string())
            .await?;
        tx.put(&DeadLetter::new(op.clone(), error)).await?;
        tx.commit().await
    }

    /// Dead letters, oldest failure first.
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError> {
        self.store.scan(None).await
    }

    /// Puts a dead-lettered operation back at the end of the queue with a
    /// fresh retry budget. Returns the new operation id.
    pub async fn requeue_dead_letter(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let mut tx = self.store.begin().await?;

        let Some(letter) = tx.get::<DeadLetter>(&id.to_string()).await? else {
            return Ok(None);
        };
        tx.delete(Region::DeadLetters, &id.to_string()).await?;

        let op = letter.operation;
        let new_id = self
            .enqueue_in(
                &mut tx,
                NewOperation {
                    entity_type: op.entity_type,
                    action: op.action,
                    payload: op.payload,
                },
            )
            .await?;
        tx.commit().await?;

        Ok(Some(new_id))
    }

    pub async fn discard_dead_letter(&self, id: Uuid) -> Result<bool, StoreError> {
        self.store
            .delete(Region::DeadLetters, &id.to_string())
            .await
    }
}
