//! Sync coordinator: drains the pending queue against the remote API.
//!
//! # States
//!
//! - `offline`: the oracle reports no connectivity. Initial state when
//!   offline at construction.
//! - `idle`: online, last pass (if any) had no failures.
//! - `syncing`: a pass is replaying a non-empty snapshot.
//! - `error`: the last pass had at least one failed operation.
//!
//! One coordinator is constructed per session and shared as an
//! `Arc<SyncCoordinator>`. Passes are serialized by an async mutex, so the
//! queue is never drained twice concurrently; within a pass operations are
//! replayed strictly one at a time in enqueue order.

use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::network::NetworkStatus;
use super::queue::PendingQueue;
use super::remote::{RemoteApi, RemoteError};
use super::routes::{DispatchError, RouteTable};
use crate::db::StoreError;
use crate::models::{Action, PendingOperation, LAST_SYNC_AT};

/// Failed replays allowed before an operation is dead-lettered. An
/// operation is attempted at most `MAX_RETRIES + 1` times.
pub const MAX_RETRIES: u32 = 3;

/// Default spacing of timer-triggered passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Error => write!(f, "error"),
            SyncStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Tally of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Why a single replay failed. Every variant counts against the retry
/// budget.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub max_retries: u32,
    pub routes: RouteTable,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            routes: RouteTable::default(),
        }
    }
}

type Listener = Arc<dyn Fn(SyncStatus, usize) + Send + Sync>;
type Listeners = Mutex<Vec<(u64, Listener)>>;

/// Handle returned by [`SyncCoordinator::subscribe`]. Dropping it
/// unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    status: SyncStatus,
    pending_count: usize,
}

pub struct SyncCoordinator {
    queue: PendingQueue,
    remote: Arc<dyn RemoteApi>,
    network: Arc<dyn NetworkStatus>,
    options: SyncOptions,
    state: Mutex<State>,
    listeners: Arc<Listeners>,
    next_listener_id: AtomicU64,
    pass_lock: tokio::sync::Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
    network_task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_running(slot: &Option<JoinHandle<()>>) -> bool {
    slot.as_ref().is_some_and(|handle| !handle.is_finished())
}

impl SyncCoordinator {
    pub fn new(
        queue: PendingQueue,
        remote: Arc<dyn RemoteApi>,
        network: Arc<dyn NetworkStatus>,
    ) -> Arc<Self> {
        Self::with_options(queue, remote, network, SyncOptions::default())
    }

    pub fn with_options(
        queue: PendingQueue,
        remote: Arc<dyn RemoteApi>,
        network: Arc<dyn NetworkStatus>,
        options: SyncOptions,
    ) -> Arc<Self> {
        let status = if network.is_online() {
            SyncStatus::Idle
        } else {
            SyncStatus::Offline
        };

        Arc::new(Self {
            queue,
            remote,
            network,
            options,
            state: Mutex::new(State {
                status,
                pending_count: 0,
            }),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
            pass_lock: tokio::sync::Mutex::new(()),
            timer: Mutex::new(None),
            network_task: Mutex::new(None),
        })
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn status(&self) -> SyncStatus {
        lock(&self.state).status
    }

    /// Pending count as of the last status change or refresh.
    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending_count
    }

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    pub fn max_retries(&self) -> u32 {
        self.options.max_retries
    }

    /// Registers a listener. It is called immediately with the current
    /// status and pending count, then on every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(SyncStatus, usize) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        lock(&self.listeners).push((id, listener.clone()));

        let state = *lock(&self.state);
        listener(state.status, state.pending_count);

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Re-reads the pending count from the store and notifies listeners if
    /// it changed.
    pub async fn refresh_pending_count(&self) -> Result<usize, SyncError> {
        let count = self.queue.count().await?;
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.pending_count != count;
            state.pending_count = count;
            changed
        };
        if changed {
            self.notify();
        }
        Ok(count)
    }

    /// Runs one sync pass.
    ///
    /// Offline: no-op that leaves the queue untouched and reports `offline`.
    /// Empty queue: no-op that reports `idle`. Otherwise replays the FIFO
    /// snapshot and ends in `idle` (no failures) or `error`.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        if !self.network.is_online() {
            tracing::debug!("Skipping sync pass: offline");
            self.publish(SyncStatus::Offline, false).await;
            return Ok(SyncOutcome::default());
        }

        let _pass = self.pass_lock.lock().await;

        if !self.network.is_online() {
            self.publish(SyncStatus::Offline, false).await;
            return Ok(SyncOutcome::default());
        }

        let operations = self.queue.list_ordered().await?;
        if operations.is_empty() {
            self.publish(SyncStatus::Idle, false).await;
            return Ok(SyncOutcome::default());
        }

        tracing::info!("Starting sync pass with {} pending operation(s)", operations.len());
        self.publish(SyncStatus::Syncing, false).await;

        let mut outcome = SyncOutcome::default();
        let drained = self.drain(&operations, &mut outcome).await;

        let went_offline = !self.network.is_online();
        let final_status = if went_offline {
            SyncStatus::Offline
        } else if drained.is_err() || outcome.failed > 0 {
            SyncStatus::Error
        } else {
            SyncStatus::Idle
        };

        if let Err(e) = drained {
            tracing::warn!("Sync pass aborted: {}", e);
            self.publish(final_status, true).await;
            return Err(e);
        }

        if final_status == SyncStatus::Idle {
            let now = json!(chrono::Utc::now().to_rfc3339());
            if let Err(e) = self.queue.store().set_metadata(LAST_SYNC_AT, now).await {
                tracing::warn!("Failed to record last sync time: {}", e);
            }
        }

        tracing::info!(
            "Sync pass finished: {} succeeded, {} failed",
            outcome.success,
            outcome.failed
        );
        self.publish(final_status, true).await;

        Ok(outcome)
    }

    async fn drain(
        &self,
        operations: &[PendingOperation],
        outcome: &mut SyncOutcome,
    ) -> Result<(), SyncError> {
        for op in operations {
            if !self.network.is_online() {
                tracing::info!("Went offline mid-pass; not starting further operations");
                break;
            }

            match self.replay(op).await {
                Ok(()) => {
                    self.queue.remove(op.id).await?;
                    self.confirm_cached(op).await?;
                    outcome.success += 1;
                }
                Err(err) => {
                    outcome.failed += 1;
                    if op.retry_count >= self.options.max_retries {
                        tracing::warn!(
                            "Dropping {} {} operation {} after {} attempts: {}",
                            op.entity_type,
                            op.action,
                            op.id,
                            op.retry_count + 1,
                            err
                        );
                        self.queue.dead_letter(op, &err.to_string()).await?;
                    } else {
                        let retries = self.queue.increment_retry(op.id).await?;
                        tracing::warn!(
                            "Replay of {} {} operation {} failed (retry {}/{}): {}",
                            op.entity_type,
                            op.action,
                            op.id,
                            retries.unwrap_or(op.retry_count + 1),
                            self.options.max_retries,
                            err
                        );
                    }
                }
            }
        }

        Ok(())
    }

    async fn replay(&self, op: &PendingOperation) -> Result<(), ReplayError> {
        let request = self.options.routes.request(op)?;
        tracing::debug!(
            "Replaying {} {} via {:?} {}",
            op.entity_type,
            op.action,
            request.verb,
            request.path
        );
        request.send(self.remote.as_ref()).await?;
        Ok(())
    }

    /// Clears the pending flag on the cached row a create or update
    /// targeted, unless another queued write for the same row remains. The
    /// client-issued id is kept.
    async fn confirm_cached(&self, op: &PendingOperation) -> Result<(), StoreError> {
        if op.action == Action::Delete {
            return Ok(());
        }
        let Some(id) = op.target_id() else {
            return Ok(());
        };
        if self.queue.has_pending_for(op.entity_type, id).await? {
            return Ok(());
        }

        self.queue
            .store()
            .merge_json(op.entity_type.cache_region(), id, &json!({ "is_pending": false }))
            .await?;
        Ok(())
    }

    /// Applies a connectivity transition: online moves `offline` to `idle`
    /// and starts a pass; offline moves any state to `offline`.
    pub async fn handle_connectivity(&self, online: bool) {
        if online {
            if self.status() == SyncStatus::Offline {
                self.publish(SyncStatus::Idle, false).await;
            }
            if let Err(e) = self.sync().await {
                tracing::warn!("Sync after reconnect failed: {}", e);
            }
        } else {
            self.publish(SyncStatus::Offline, false).await;
        }
    }

    /// Spawns a task reacting to oracle transitions. Idempotent.
    pub fn watch_network(self: &Arc<Self>) {
        let mut slot = lock(&self.network_task);
        if is_running(&slot) {
            return;
        }

        let mut rx = self.network.subscribe();
        rx.borrow_and_update();
        let coordinator = Arc::downgrade(self);

        *slot = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.handle_connectivity(online).await;
            }
        }));
    }

    /// Starts the periodic pass timer. A second call while one is running
    /// is a no-op, and a zero interval is refused.
    pub fn start_timer(self: &Arc<Self>, interval: Duration) {
        if interval.is_zero() {
            tracing::warn!("Refusing to start sync timer with a zero interval");
            return;
        }

        let mut slot = lock(&self.timer);
        if is_running(&slot) {
            return;
        }

        let coordinator = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                if !coordinator.is_online() || coordinator.status() == SyncStatus::Syncing {
                    continue;
                }
                if let Err(e) = coordinator.sync().await {
                    tracing::warn!("Scheduled sync failed: {}", e);
                }
            }
        }));
    }

    pub fn timer_running(&self) -> bool {
        is_running(&lock(&self.timer))
    }

    pub fn stop_timer(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }

    /// Stops the timer and the network watcher.
    pub fn shutdown(&self) {
        self.stop_timer();
        if let Some(handle) = lock(&self.network_task).take() {
            handle.abort();
        }
    }

    /// Sets the status, refreshes the pending count, and notifies listeners
    /// when anything changed (or always, with `force`).
    async fn publish(&self, status: SyncStatus, force: bool) {
        let count = match self.queue.count().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Failed to count pending operations: {}", e);
                None
            }
        };

        let changed = {
            let mut state = lock(&self.state);
            let before = (state.status, state.pending_count);
            state.status = status;
            if let Some(count) = count {
                state.pending_count = count;
            }
            before != (state.status, state.pending_count)
        };

        if changed || force {
            tracing::debug!("Sync status: {}", status);
            self.notify();
        }
    }

    fn notify(&self) {
        let state = *lock(&self.state);
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(state.status, state.pending_count);
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
