use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{App, OutputFormat};
use fit_sync::models::PendingOperation;

#[derive(Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    pub command: QueueSubcommand,
}

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// List pending operations in replay order
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List operations that exhausted their retries
    DeadLetters {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Put a dead-lettered operation back on the queue
    Requeue {
        /// Operation ID (UUID)
        id: Uuid,
    },

    /// Drop a dead-lettered operation for good
    Discard {
        /// Operation ID (UUID)
        id: Uuid,
    },
}

impl QueueCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let queue = app.queue();

        match &self.command {
            QueueSubcommand::List { format } => {
                let operations = queue.list_ordered().await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&operations)?);
                    }
                    OutputFormat::Text => {
                        if operations.is_empty() {
                            println!("No pending operations.");
                            return Ok(());
                        }
                        for op in &operations {
                            print_operation(op);
                        }
                        println!();
                        println!("{} pending", operations.len());
                    }
                }
            }
            QueueSubcommand::DeadLetters { format } => {
                let letters = queue.dead_letters().await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&letters)?);
                    }
                    OutputFormat::Text => {
                        if letters.is_empty() {
                            println!("No dead letters.");
                            return Ok(());
                        }
                        for letter in &letters {
                            print_operation(&letter.operation);
                            println!(
                                "    failed {}: {}",
                                letter.failed_at.format("%Y-%m-%d %H:%M:%S"),
                                letter.error
                            );
                        }
                    }
                }
            }
            QueueSubcommand::Requeue { id } => match queue.requeue_dead_letter(*id).await? {
                Some(new_id) => {
                    println!("Requeued {} as {}", id, new_id);
                    app.after_write().await;
                }
                None => return Err(format!("Dead letter not found: {}", id).into()),
            },
            QueueSubcommand::Discard { id } => {
                if !queue.discard_dead_letter(*id).await? {
                    return Err(format!("Dead letter not found: {}", id).into());
                }
                println!("Discarded {}", id);
            }
        }

        Ok(())
    }
}

fn print_operation(op: &PendingOperation) {
    println!(
        "{}  {}  {:<6} {:<8} {}  (retries: {})",
        op.id,
        op.created_at.format("%Y-%m-%d %H:%M:%S"),
        op.action,
        op.entity_type,
        op.target_id().unwrap_or("-"),
        op.retry_count
    );
}
