use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{parse_timestamp, print_entries, App, OutputFormat};
use fit_sync::models::NewExercise;
use fit_sync::sync::ExerciseRepository;

#[derive(Args)]
pub struct ExerciseCommand {
    #[command(subcommand)]
    pub command: ExerciseSubcommand,
}

#[derive(Subcommand)]
pub enum ExerciseSubcommand {
    /// Record an exercise session
    Add {
        /// Activity name (e.g. "running")
        activity: String,

        /// Duration in minutes
        #[arg(long, short)]
        minutes: u32,

        #[arg(long)]
        calories: Option<u32>,

        /// When it happened (YYYY-MM-DD or RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List cached exercise sessions, oldest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete an exercise session
    Delete {
        /// Session ID (UUID)
        id: Uuid,
    },
}

impl ExerciseCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let repo = ExerciseRepository::new(app.coordinator.clone());

        match &self.command {
            ExerciseSubcommand::Add {
                activity,
                minutes,
                calories,
                at,
                notes,
            } => {
                let mut draft = NewExercise::new(activity, *minutes);
                if let Some(calories) = calories {
                    draft = draft.with_calories_burned(*calories);
                }
                if let Some(at) = at {
                    draft = draft.recorded_at(parse_timestamp(at)?);
                }
                if let Some(notes) = notes {
                    draft = draft.with_notes(notes);
                }

                let session = repo.create_offline(draft).await?;
                println!("Recorded {} ({})", session, session.id);
                app.after_write().await;
            }
            ExerciseSubcommand::List { format } => {
                let sessions = repo.list().await?;
                print_entries(&sessions, format, "No exercise sessions.")?;
            }
            ExerciseSubcommand::Delete { id } => {
                if repo.delete_offline(*id).await? {
                    println!("Deleted exercise session {}", id);
                } else {
                    println!("Session {} was not cached locally; delete queued anyway.", id);
                }
                app.after_write().await;
            }
        }

        Ok(())
    }
}
