mod config_cmd;
mod exercise;
mod meal;
mod queue;
mod sync_cmd;
mod weight;

pub use config_cmd::ConfigCommand;
pub use exercise::ExerciseCommand;
pub use meal::MealCommand;
pub use queue::QueueCommand;
pub use sync_cmd::SyncCommand;
pub use weight::WeightCommand;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

use fit_sync::config::Config;
use fit_sync::db::LocalStore;
use fit_sync::sync::{
    HealthProbe, HttpRemoteClient, NetworkMonitor, PendingQueue, RemoteApi, SyncCoordinator,
    SyncOptions, SyncStatusView, Unconfigured,
};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything a command needs for one invocation.
///
/// The network oracle starts offline; it is only flipped on after a
/// successful health check, so reads never wait on the server.
pub struct App {
    pub coordinator: Arc<SyncCoordinator>,
    pub network: NetworkMonitor,
    pub probe: Option<HealthProbe>,
    auto_sync: bool,
}

impl App {
    pub async fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store = LocalStore::open(config.database_path.value.clone()).await?;

        let (remote, probe): (Arc<dyn RemoteApi>, Option<HealthProbe>) =
            match &config.sync.server_url {
                Some(url) => (
                    Arc::new(HttpRemoteClient::from_config(&config.sync)?),
                    Some(HealthProbe::new(
                        url,
                        config.sync.probe_interval(),
                        config.sync.request_timeout(),
                    )?),
                ),
                None => (Arc::new(Unconfigured), None),
            };

        let network = NetworkMonitor::new(false);
        let options = SyncOptions {
            max_retries: config.sync.max_retries,
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::with_options(
            PendingQueue::new(store),
            remote,
            Arc::new(network.clone()),
            options,
        );
        coordinator.refresh_pending_count().await?;

        Ok(Self {
            coordinator,
            network,
            probe,
            auto_sync: config.sync.auto_sync,
        })
    }

    pub fn status_view(&self) -> SyncStatusView {
        SyncStatusView::new(self.coordinator.clone())
    }

    pub fn queue(&self) -> &PendingQueue {
        self.coordinator.queue()
    }

    /// Runs one health check and records the result. Always offline when no
    /// server is configured.
    pub async fn check_connectivity(&self) -> bool {
        let online = match &self.probe {
            Some(probe) => probe.check().await,
            None => false,
        };
        self.network.set_online(online);
        online
    }

    /// Pushes queued writes right after a local change when auto-sync is on
    /// and the server answers. Failures are reported, never fatal: the write
    /// already succeeded locally.
    pub async fn after_write(&self) {
        if !self.auto_sync || self.probe.is_none() {
            return;
        }
        if !self.check_connectivity().await {
            println!("Offline: change queued for the next sync.");
            return;
        }

        match self.coordinator.sync().await {
            Ok(outcome) if outcome.failed > 0 => {
                println!(
                    "Synced {} change(s); {} failed and will be retried.",
                    outcome.success, outcome.failed
                );
            }
            Ok(outcome) if outcome.success > 0 => {
                println!("Synced {} change(s).", outcome.success);
            }
            Ok(_) => {}
            Err(e) => eprintln!("Warning: auto-sync failed: {}", e),
        }
    }

    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
        .map_err(|_| {
            format!(
                "Invalid timestamp '{}'. Use YYYY-MM-DD or RFC 3339.",
                input
            )
        })
}

pub fn print_entries<T: Serialize + Display>(
    entries: &[T],
    format: &OutputFormat,
    empty: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("{}", empty);
            }
            for entry in entries {
                println!("{}", entry);
            }
        }
    }
    Ok(())
}
