use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use geoharvest::{
    clock::Clock,
    config::ServerConfig,
    engine::{EngineBuilder, EngineSettings},
    seed::SeedLoader,
    store::Database,
    web::{self, AppState, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Location-anchored resource collection server")]
struct Cli {
    /// Path to the server configuration YAML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// World seed YAML applied when the database is empty
    #[arg(long)]
    seed: Option<PathBuf>,

    /// JSON snapshot loaded at start-up and written on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_yaml(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(seed) = cli.seed {
        config.seed_path = Some(seed);
    }
    if let Some(snapshot) = cli.snapshot {
        config.storage.snapshot_path = Some(snapshot);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db = match &config.storage.snapshot_path {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "loading snapshot");
            Database::load_json(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?
        }
        _ => Database::new(),
    };
    let engine = EngineBuilder::new(EngineSettings::from_config(&config))
        .with_database(Arc::new(db))
        .build();

    if let Some(seed_path) = &config.seed_path {
        let seed = SeedLoader::new(".").load(seed_path)?;
        seed.apply(&engine.db, engine.clock.now())?;
    }

    let db = engine.db.clone();
    let state = AppState::new(engine, config.gameplay.max_request_amount);

    web::run(
        state,
        WebServerConfig {
            host: config.server.host.clone(),
            port: config.server.port,
        },
    )
    .await?;

    if let Some(path) = &config.storage.snapshot_path {
        db.save_json(path)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}
