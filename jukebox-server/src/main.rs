use std::sync::Arc;

use jukebox_collab::{CatalogError, Collab, DatabaseError, SqliteDatabase, YandexCatalog};
use jukebox_core::Hub;
use jukebox_server::{init_logger, run_server, ConfigError, ServerConfig, ServerContext};
use log::{error, info, LevelFilter};
use thiserror::Error;

#[derive(Debug, Error)]
enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not open database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not set up the catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Server stopped unexpectedly: {0}")]
    Server(#[from] std::io::Error),
}

impl StartupError {
    fn hint(&self) -> &'static str {
        match self {
            Self::Config(_) => "Check the JUKEBOX_* environment variables",
            Self::Database(_) => "Make sure JUKEBOX_DATABASE_URL points to a writable SQLite file",
            Self::Catalog(_) => "Make sure JUKEBOX_CATALOG_URL is a valid URL",
            Self::Server(_) => "Make sure JUKEBOX_SERVER_PORT is free",
        }
    }
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env();
    let level = config
        .as_ref()
        .map(|c| c.log_level)
        .unwrap_or(LevelFilter::Info);

    if let Err(e) = init_logger(level) {
        eprintln!("Could not initialize logging: {}", e);
    }

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        error!("{}", e);
        error!("{}", e.hint());
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    info!("Opening database...");
    let database = SqliteDatabase::new(&config.database_url).await?;
    let catalog = YandexCatalog::new(&config.catalog_url, config.collab.resolve_timeout)?;
    let hub = Hub::new(config.hub.clone());

    let collab = Collab::new(
        Arc::new(database),
        Arc::new(catalog),
        hub,
        config.collab.clone(),
    );

    collab.init().await?;

    if let Some(credentials) = &config.catalog_credentials {
        info!("Using catalog credentials from the environment");
        collab.configure_catalog(credentials);
    }

    run_server(ServerContext::new(collab), &config).await?;
    Ok(())
}
