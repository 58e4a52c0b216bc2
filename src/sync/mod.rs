//! Offline-first sync engine.
//!
//! Writes are applied to the local store and recorded as pending operations
//! ([`queue`]); the [`coordinator`] replays them against the server in
//! enqueue order whenever the [`network`] oracle reports connectivity.

pub mod coordinator;
pub mod hooks;
pub mod network;
pub mod queue;
pub mod remote;
pub mod routes;
pub mod status_view;

pub use coordinator::{
    Subscription, SyncCoordinator, SyncError, SyncOptions, SyncOutcome, SyncStatus,
    DEFAULT_SYNC_INTERVAL, MAX_RETRIES,
};
pub use hooks::{ExerciseRepository, MealRepository, OfflineRepository, WeightRepository};
pub use network::{HealthProbe, NetworkMonitor, NetworkStatus};
pub use queue::PendingQueue;
pub use remote::{HttpRemoteClient, RemoteApi, RemoteError, Unconfigured};
pub use routes::{Route, RouteTable, Verb};
pub use status_view::{SyncSnapshot, SyncStatusView};
