//! Connectivity oracle.
//!
//! Transitions are trusted at face value; there is no debouncing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::remote::RemoteError;

/// Current connectivity plus change notifications.
///
/// Dropping the receiver returned by [`subscribe`](Self::subscribe)
/// unsubscribes.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;

    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// A settable oracle. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Records the current connectivity; subscribers are only woken on an
    /// actual change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            tracing::info!("Network is now {}", if online { "online" } else { "offline" });
        }
    }
}

impl NetworkStatus for NetworkMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Polls the server's `/health` endpoint and feeds a [`NetworkMonitor`].
#[derive(Debug, Clone)]
pub struct HealthProbe {
    health_url: String,
    interval: Duration,
    client: reqwest::Client,
}

impl HealthProbe {
    pub fn new(server_url: &str, interval: Duration, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::Client)?;

        Ok(Self {
            health_url: format!("{}/health", server_url.trim_end_matches('/')),
            interval,
            client,
        })
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// One reachability check. Any error or non-2xx counts as offline.
    pub async fn check(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Runs the probe loop until the returned handle is aborted.
    pub fn spawn(self, monitor: NetworkMonitor) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                monitor.set_online(self.check().await);
                tokio::time::sleep(self.interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    #[tokio::test]
    async fn test_monitor_notifies_only_on_change() {
        let monitor = NetworkMonitor::new(false);
        let mut rx = monitor.subscribe();
        assert!(!monitor.is_online());

        monitor.set_online(false);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let monitor = NetworkMonitor::new(true);
        let clone = monitor.clone();

        clone.set_online(false);
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_probe_against_local_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/health", get(|| async { "ok" }));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let probe = HealthProbe::new(
            &format!("http://{}/", addr),
            Duration::from_millis(20),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(probe.health_url(), format!("http://{}/health", addr));
        assert!(probe.check().await);

        let monitor = NetworkMonitor::new(false);
        let mut rx = monitor.subscribe();
        let handle = probe.spawn(monitor.clone());

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(monitor.is_online());
        handle.abort();
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_offline() {
        let probe = HealthProbe::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(!probe.check().await);
    }
}
