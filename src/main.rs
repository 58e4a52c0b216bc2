use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    App, ConfigCommand, ExerciseCommand, MealCommand, QueueCommand, SyncCommand, WeightCommand,
};
use fit_sync::config::Config;

#[derive(Parser)]
#[command(name = "fit")]
#[command(version)]
#[command(about = "Offline-first weight, meal and exercise log", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and list weight entries
    Weight(WeightCommand),

    /// Record and list meals
    Meal(MealCommand),

    /// Record and list exercise sessions
    Exercise(ExerciseCommand),

    /// Inspect pending operations and dead letters
    Queue(QueueCommand),

    /// Sync with remote server
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fit_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Config(cmd)) => cmd.run(&config)?,
        Some(Commands::Weight(cmd)) => {
            let app = App::open(&config).await?;
            cmd.run(&app).await?;
            app.shutdown();
        }
        Some(Commands::Meal(cmd)) => {
            let app = App::open(&config).await?;
            cmd.run(&app).await?;
            app.shutdown();
        }
        Some(Commands::Exercise(cmd)) => {
            let app = App::open(&config).await?;
            cmd.run(&app).await?;
            app.shutdown();
        }
        Some(Commands::Queue(cmd)) => {
            let app = App::open(&config).await?;
            cmd.run(&app).await?;
            app.shutdown();
        }
        Some(Commands::Sync(cmd)) => {
            let app = App::open(&config).await?;
            cmd.run(&app, &config).await?;
            app.shutdown();
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
