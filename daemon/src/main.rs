use anyhow::{Result, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api_manager;
mod commands;
mod config;
mod database;
mod errors;
mod formatter;
mod http_utils;
mod itinerary;
mod notification;
mod places;
mod plan_parser;
mod time_parse;

use config::Config;
use database::DatabaseInner;
use itinerary::ItineraryService;
use commands::{
    Command, CommandContext,
    auth::{SetApiKeyCommand, SetMapsKeyCommand},
    daemon_ops::{StartCommand, ClearCacheCommand, CleanDatabaseCommand, TestNotificationCommand},
    plan::{PlanCommand, ShowCommand, StatusCommand, DoneCommand},
};

#[derive(Parser)]
#[command(name = "lark-daemon")]
#[command(about = "Lark - Daily Itinerary Assistant Daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build today's itinerary from free-text plans
    Plan {
        /// The plan text, e.g. "lunch at House of Prime Rib at noon, SFMOMA at 2pm"
        text: String,
    },
    /// Print today's itinerary
    Show,
    /// Print schedule status
    Status,
    /// Check off an event by its number in the itinerary
    Done {
        /// Event number as printed by 'show'
        position: i64,
    },
    /// Start the schedule-watch daemon
    Start,
    /// Set the LLM API key in configuration
    SetApiKey {
        /// The API key from console.anthropic.com
        key: String,
    },
    /// Set the Google Maps Platform API key in configuration
    SetMapsKey {
        /// The API key from the Google Cloud console
        key: String,
    },
    /// Drop the cached plan parse
    ClearCache,
    /// Remove all stored plans and events
    CleanDatabase,
    /// Test the notification system
    TestNotification,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lark_daemon={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Lark daemon starting up");

    // Load configuration
    let config = Config::load().await
        .context("Failed to load application configuration")?;
    info!("Configuration loaded successfully");

    // Initialize database
    let db_path = config.read().get_database_path();
    let database = DatabaseInner::new(&db_path).await
        .with_context(|| format!("Failed to initialize database at {:?}", db_path))?;
    info!("Database initialized");

    // Initialize itinerary pipeline
    let itinerary = ItineraryService::new(config.clone(), database.clone());

    // Create shared command context
    let context = CommandContext::new(
        config,
        database,
        itinerary,
        cli.debug,
    );

    // Execute the appropriate command
    let mut command: Box<dyn Command> = match cli.command.unwrap_or(Commands::Show) {
        Commands::Plan { text } => Box::new(PlanCommand { text }),
        Commands::Show => Box::new(ShowCommand),
        Commands::Status => Box::new(StatusCommand),
        Commands::Done { position } => Box::new(DoneCommand { position }),
        Commands::Start => Box::new(StartCommand),
        Commands::SetApiKey { key } => Box::new(SetApiKeyCommand { api_key: key }),
        Commands::SetMapsKey { key } => Box::new(SetMapsKeyCommand { api_key: key }),
        Commands::ClearCache => Box::new(ClearCacheCommand),
        Commands::CleanDatabase => Box::new(CleanDatabaseCommand),
        Commands::TestNotification => Box::new(TestNotificationCommand),
    };

    command.execute(&context).await
        .context("Failed to execute command")?;

    Ok(())
}
