use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use jukebox_collab::{CatalogSettings, CollabConfig, TransportScope, API_BASE};
use jukebox_core::HubConfig;
use log::LevelFilter;
use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://jukebox.db?mode=rwc";

#[derive(Debug, Error)]
#[error("{name} has an invalid value \"{value}\": {reason}")]
pub struct ConfigError {
    name: &'static str,
    value: String,
    reason: String,
}

/// Everything the server binary needs, read from `JUKEBOX_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    pub catalog_url: String,
    /// Overrides whatever credentials are saved in the database
    pub catalog_credentials: Option<CatalogSettings>,
    /// Served under `/static` when set
    pub static_dir: Option<PathBuf>,
    /// Level for the jukebox crates, `Debug` when `JUKEBOX_LOG_DEBUG` is set
    pub log_level: LevelFilter,
    pub hub: HubConfig,
    pub collab: CollabConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut hub = HubConfig::default();
        let mut collab = CollabConfig::default();

        if let Some(ms) = parse::<u64, _>(&lookup, "JUKEBOX_SEND_TIMEOUT_MS")? {
            hub.send_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = parse::<u64, _>(&lookup, "JUKEBOX_RESOLVE_TIMEOUT_MS")? {
            collab.resolve_timeout = Duration::from_millis(ms);
        }

        if let Some(limit) = parse::<usize, _>(&lookup, "JUKEBOX_RESOLVE_CONCURRENCY")? {
            collab.resolve_concurrency = limit.max(1);
        }

        if let Some(scope) = parse::<TransportScope, _>(&lookup, "JUKEBOX_TRANSPORT_SCOPE")? {
            collab.transport_scope = scope;
        }

        let catalog_credentials = match lookup("JUKEBOX_CATALOG_TOKEN") {
            Some(access_token) if !access_token.is_empty() => Some(CatalogSettings {
                user_id: parse(&lookup, "JUKEBOX_CATALOG_USER")?.unwrap_or_default(),
                access_token,
            }),
            _ => None,
        };

        let log_level = match parse(&lookup, "JUKEBOX_LOG_DEBUG")? {
            Some(true) => LevelFilter::Debug,
            _ => LevelFilter::Info,
        };

        Ok(Self {
            port: parse(&lookup, "JUKEBOX_SERVER_PORT")?.unwrap_or(DEFAULT_PORT),
            database_url: lookup("JUKEBOX_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            catalog_url: lookup("JUKEBOX_CATALOG_URL").unwrap_or_else(|| API_BASE.to_string()),
            catalog_credentials,
            static_dir: lookup("JUKEBOX_STATIC_DIR").map(PathBuf::from),
            log_level,
            hub,
            collab,
        })
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    value.trim().parse().map(Some).map_err(|e: T::Err| ConfigError {
        name,
        value,
        reason: e.to_string(),
    })
}
