use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use clap::{Parser, Subcommand};

pub mod api;
pub mod config;
pub mod message;
pub mod presence;
pub mod store;
pub mod validation;

use config::Config;
use message::MessageRouter;
use presence::{PresenceManager, PresenceSettings};
use store::DocumentStore;

#[derive(Parser)]
#[command(name = "batepapo")]
#[command(about = "Minimal chat backend with presence tracking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat server (default)
    Start {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Path to a TOML or JSON config file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "batepapo.toml")]
        output: String,
    },
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Start { port, config }) => {
            let mut cfg = match config {
                Some(path) => Config::load(&path).await?,
                None => Config::default(),
            };
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Err(errors) = cfg.validate() {
                return Err(format!("invalid config: {}", errors.join("; ")).into());
            }
            init_tracing(&cfg.logging.level);
            start_server(cfg).await?;
        }
        Some(Commands::Init { output }) => {
            init_tracing("info");
            let toml = Config::default().export_toml()?;
            tokio::fs::write(&output, toml).await?;
            info!("wrote default config to {}", output);
        }
        None => {
            let cfg = Config::default();
            init_tracing(&cfg.logging.level);
            start_server(cfg).await?;
        }
    }

    Ok(())
}

/// Initialize Logging/Tracing. `validate()` has already vetted the level
/// for loaded configs; anything unparseable here falls back to INFO.
fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");
}

async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting batepapo chat backend...");

    // Document store: opened here, shared by both managers, dropped on exit.
    let store = Arc::new(DocumentStore::new());

    let settings = PresenceSettings {
        timeout: Duration::from_secs(config.presence.timeout_seconds),
        sweep_interval: Duration::from_secs(config.presence.sweep_interval_seconds),
    };
    let presence = Arc::new(PresenceManager::new(Arc::clone(&store), settings));
    let messages = Arc::new(MessageRouter::new(Arc::clone(&store)));

    // Eviction sweep runs concurrently with request handling, no shared lock.
    let sweeper = presence.start_sweeper();

    let app = api::router(Arc::clone(&presence), Arc::clone(&messages));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("batepapo listening on {}", addr);
    info!("API Endpoints:");
    info!("  - POST /participants");
    info!("  - GET  /participants");
    info!("  - POST /messages");
    info!("  - GET  /messages?limit=N");
    info!("  - POST /status");
    info!("  - PUT  /messages/:id");
    info!("  - DELETE /messages/:id");
    info!("  - Health: /health");
    info!("  - Metrics: /metrics");

    axum::serve(listener, app).await?;

    sweeper.abort();
    Ok(())
}
