use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{parse_timestamp, print_entries, App, OutputFormat};
use fit_sync::models::{MealType, NewMeal};
use fit_sync::sync::MealRepository;

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Log a meal
    Add {
        /// What was eaten
        name: String,

        /// Meal type (breakfast, lunch, dinner, snack)
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: MealType,

        #[arg(long)]
        calories: Option<u32>,

        /// When it was eaten (YYYY-MM-DD or RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List cached meals, oldest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a meal
    Delete {
        /// Meal ID (UUID)
        id: Uuid,
    },
}

impl MealCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let repo = MealRepository::new(app.coordinator.clone());

        match &self.command {
            MealSubcommand::Add {
                name,
                meal_type,
                calories,
                at,
                notes,
            } => {
                let mut draft = NewMeal::new(name, *meal_type);
                if let Some(calories) = calories {
                    draft = draft.with_calories(*calories);
                }
                if let Some(at) = at {
                    draft = draft.recorded_at(parse_timestamp(at)?);
                }
                if let Some(notes) = notes {
                    draft = draft.with_notes(notes);
                }

                let meal = repo.create_offline(draft).await?;
                println!("Logged {} ({})", meal, meal.id);
                app.after_write().await;
            }
            MealSubcommand::List { format } => {
                let meals = repo.list().await?;
                print_entries(&meals, format, "No meals logged.")?;
            }
            MealSubcommand::Delete { id } => {
                if repo.delete_offline(*id).await? {
                    println!("Deleted meal {}", id);
                } else {
                    println!("Meal {} was not cached locally; delete queued anyway.", id);
                }
                app.after_write().await;
            }
        }

        Ok(())
    }
}
