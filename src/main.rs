mod app;
mod config;
mod journal;

use std::path::Path;

use anyhow::Result;
use app::App;
use clap::{Parser, Subcommand};
use config::AppConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Prediction-market research with a tiered cache.
#[derive(Parser, Debug)]
#[command(name = "bet-research")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List open events
    Events {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Highest-volume open events, one per category
    Hot {
        #[arg(long, default_value_t = 3)]
        limit: usize,
    },
    /// Research an event, served from cache when fresh
    Research { ticker: String },
    /// Research steps for an event
    Steps { ticker: String },
    /// More findings groups for an already researched event
    More { ticker: String },
    /// Ask a question about an event
    Chat { ticker: String, question: String },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_present = Path::new(&cli.config).exists();
    let config = if config_present {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };
    init_logging(config.logging.json);
    if config_present {
        info!("Loaded configuration from {}", cli.config);
    } else {
        warn!("{} not found, using defaults", cli.config);
    }

    let mut app = App::new(config)?;
    match cli.command {
        Command::Events { limit, cursor } => app.events(limit, cursor.as_deref()).await,
        Command::Hot { limit } => app.hot(limit).await,
        Command::Research { ticker } => app.research(&ticker).await,
        Command::Steps { ticker } => app.steps(&ticker).await,
        Command::More { ticker } => app.more(&ticker).await,
        Command::Chat { ticker, question } => app.chat(&ticker, &question).await,
    }
}
