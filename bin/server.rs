// Marvel Champions Stats - Web Server
// JSON API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use mcstats::web::{router, AppState};
use mcstats::Config;

#[derive(Parser)]
#[command(name = "mcstats-server")]
#[command(version)]
#[command(about = "Marvel Champions Stats - API server")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "MCSTATS_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the configuration file)
    #[arg(long, env = "MCSTATS_DATABASE")]
    database: Option<PathBuf>,

    /// Listen address (overrides the configuration file)
    #[arg(long, env = "MCSTATS_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let conn = mcstats::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    info!("Database opened: {:?}", config.database_path);

    let app = router(AppState::new(conn, config.session_ttl()));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    info!("Server running on http://{}", config.bind_address);
    info!("API: http://{}/api/heroes", config.bind_address);

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
