//! Sync CLI commands.

use clap::{Args, Subcommand};

use super::{App, OutputFormat};
use fit_sync::config::Config;
use fit_sync::models::LAST_SYNC_AT;
use fit_sync::sync::RemoteError;

/// Sync with remote server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration, connectivity and queue state
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Keep syncing in the foreground until interrupted
    Watch,
}

impl SyncCommand {
    pub async fn run(&self, app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(app).await,
            Some(SyncSubcommand::Status { format }) => self.status(app, config, format).await,
            Some(SyncSubcommand::Watch) => self.watch(app, config).await,
        }
    }

    async fn sync(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        if app.probe.is_none() {
            return Err(RemoteError::NotConfigured.into());
        }

        let pending = app.coordinator.pending_count();
        if !app.check_connectivity().await {
            println!("Server unreachable; {} operation(s) remain queued.", pending);
            return Ok(());
        }

        if pending == 0 {
            println!("Nothing to sync.");
            return Ok(());
        }

        println!("Syncing {} pending operation(s)...", pending);
        let outcome = app.status_view().sync().await?;

        println!();
        println!("  ✓ {} succeeded", outcome.success);
        if outcome.failed > 0 {
            println!("  ✗ {} failed", outcome.failed);
        }
        println!();

        let remaining = app.coordinator.pending_count();
        if remaining == 0 {
            println!("Sync complete.");
        } else {
            println!("{} operation(s) still queued for retry.", remaining);
        }

        Ok(())
    }

    async fn status(
        &self,
        app: &App,
        config: &Config,
        format: &OutputFormat,
    ) -> Result<(), Box<dyn std::error::Error>> {
        app.check_connectivity().await;
        let snapshot = app.status_view().refresh().await?;
        let dead_letters = app.queue().dead_letters().await?.len();
        let last_sync = app
            .queue()
            .store()
            .get_metadata(LAST_SYNC_AT)
            .await?
            .and_then(|meta| meta.value.as_str().map(str::to_string));

        match format {
            OutputFormat::Json => {
                let report = serde_json::json!({
                    "server_url": config.sync.server_url,
                    "status": snapshot.status,
                    "pending_count": snapshot.pending_count,
                    "is_online": snapshot.is_online,
                    "dead_letters": dead_letters,
                    "last_sync_at": last_sync,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => {
                println!("Sync Status");
                println!("===========");
                println!();

                match &config.sync.server_url {
                    Some(url) => println!("Server:       {}", url),
                    None => println!("Server:       (not configured)"),
                }
                println!(
                    "Connection:   {}",
                    if snapshot.is_online { "online" } else { "offline" }
                );
                println!("Status:       {}", snapshot.status);
                println!("Pending:      {}", snapshot.pending_count);
                println!("Dead letters: {}", dead_letters);
                println!("Last sync:    {}", last_sync.as_deref().unwrap_or("never"));
            }
        }

        Ok(())
    }

    async fn watch(&self, app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let Some(probe) = app.probe.clone() else {
            return Err(RemoteError::NotConfigured.into());
        };

        let _subscription = app.status_view().subscribe(|status, pending| {
            println!("[{}] {} pending", status, pending);
        });

        app.coordinator.watch_network();
        app.coordinator.start_timer(config.sync.interval());
        let probe_task = probe.spawn(app.network.clone());

        println!(
            "Watching {} (every {}s). Press Ctrl-C to stop.",
            config.sync.server_url.as_deref().unwrap_or_default(),
            config.sync.interval_secs
        );
        tokio::signal::ctrl_c().await?;

        probe_task.abort();
        app.coordinator.shutdown();
        println!("Stopped.");
        Ok(())
    }
}
