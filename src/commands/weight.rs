use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{parse_timestamp, print_entries, App, OutputFormat};
use fit_sync::models::NewWeight;
use fit_sync::sync::WeightRepository;

#[derive(Args)]
pub struct WeightCommand {
    #[command(subcommand)]
    pub command: WeightSubcommand,
}

#[derive(Subcommand)]
pub enum WeightSubcommand {
    /// Record a weight measurement
    Add {
        /// Weight in kilograms
        kg: f64,

        /// When it was measured (YYYY-MM-DD or RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List cached weight entries, oldest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a weight entry
    Delete {
        /// Entry ID (UUID)
        id: Uuid,
    },
}

impl WeightCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let repo = WeightRepository::new(app.coordinator.clone());

        match &self.command {
            WeightSubcommand::Add { kg, at, notes } => {
                if !kg.is_finite() || *kg <= 0.0 {
                    return Err(format!("Invalid weight: {}", kg).into());
                }

                let mut draft = NewWeight::new(*kg);
                if let Some(at) = at {
                    draft = draft.recorded_at(parse_timestamp(at)?);
                }
                if let Some(notes) = notes {
                    draft = draft.with_notes(notes);
                }

                let entry = repo.create_offline(draft).await?;
                println!("Recorded {} ({})", entry, entry.id);
                app.after_write().await;
            }
            WeightSubcommand::List { format } => {
                let entries = repo.list().await?;
                print_entries(&entries, format, "No weight entries.")?;
            }
            WeightSubcommand::Delete { id } => {
                if repo.delete_offline(*id).await? {
                    println!("Deleted weight entry {}", id);
                } else {
                    println!("Entry {} was not cached locally; delete queued anyway.", id);
                }
                app.after_write().await;
            }
        }

        Ok(())
    }
}
