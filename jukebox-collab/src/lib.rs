mod catalog;
mod commands;
mod config;
mod db;
mod events;
mod playlist;
mod rooms;
mod util;

use std::sync::Arc;

use dashmap::DashMap;
use jukebox_core::{Hub, Scope};
use log::{error, info};
use serde_json::Value;
use tokio::sync::Mutex;

pub use catalog::*;
pub use commands::*;
pub use config::*;
pub use db::*;
pub use events::*;
pub use playlist::*;
pub use rooms::*;

/// The jukebox collab system, facilitating rooms, their playlists, and the events they emit.
pub struct Collab {
    context: CollabContext,

    pub rooms: RoomManager,
    pub playlists: PlaylistManager,
}

/// A type passed to various components of the collab system, to access state and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<CollabConfig>,
    pub database: Arc<dyn Database>,
    pub catalog: Arc<dyn Catalog>,
    pub hub: Arc<Hub>,

    /// Rooms by code
    pub rooms: Arc<DashMap<String, RoomData>>,
    /// Serializes playlist writes within a room
    pub room_locks: Arc<DashMap<PrimaryKey, Arc<Mutex<()>>>>,
}

impl Collab {
    pub fn new(
        database: Arc<dyn Database>,
        catalog: Arc<dyn Catalog>,
        hub: Arc<Hub>,
        config: CollabConfig,
    ) -> Self {
        let context = CollabContext {
            config: Arc::new(config),
            database,
            catalog,
            hub,

            rooms: Default::default(),
            room_locks: Default::default(),
        };

        Self {
            rooms: RoomManager::new(&context),
            playlists: PlaylistManager::new(&context),
            context,
        }
    }

    /// Loads rooms and catalog credentials from the database
    pub async fn init(&self) -> Result<()> {
        self.rooms.restore().await?;

        match self.context.database.catalog_settings().await {
            Ok(settings) => {
                info!("Catalog configured for user {}", settings.user_id);
                self.context.catalog.configure(&settings);
            }
            Err(e) if e.is_not_found() => info!("No catalog settings saved yet"),
            Err(e) => return Err(e),
        }

        Ok(())
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.context.hub
    }

    /// Stores new catalog credentials and starts using them immediately
    pub async fn save_catalog_settings(&self, settings: CatalogSettings) -> Result<()> {
        self.context
            .database
            .save_catalog_settings(settings.clone())
            .await?;

        self.configure_catalog(&settings);
        Ok(())
    }

    /// Uses the credentials without persisting them
    pub fn configure_catalog(&self, settings: &CatalogSettings) {
        self.context.catalog.configure(settings);
    }

    /// Looks up a single track, failing if the catalog can't answer
    pub async fn resolve_track(
        &self,
        track_id: TrackId,
    ) -> std::result::Result<TrackMetadata, CatalogError> {
        self.context.resolve(track_id).await
    }

    /// Sends an arbitrary message to every connection
    pub fn broadcast(&self, payload: Value) {
        self.context.hub.publish(Scope::All, payload);
    }
}

impl CollabContext {
    /// Publishes an event through the hub
    pub fn emit(&self, scope: Scope, event: &RoomEvent) {
        match serde_json::to_value(event) {
            Ok(value) => self.hub.publish(scope, value),
            Err(e) => error!("Failed to serialize event {:?}: {}", event, e),
        }
    }

    /// Resolves a track, giving up after the configured timeout
    pub async fn resolve(
        &self,
        track_id: TrackId,
    ) -> std::result::Result<TrackMetadata, CatalogError> {
        let timeout = self.config.resolve_timeout;

        tokio::time::timeout(timeout, self.catalog.resolve(track_id))
            .await
            .map_err(|_| CatalogError::TimedOut)?
    }

    pub fn room_lock(&self, room_id: PrimaryKey) -> Arc<Mutex<()>> {
        self.room_locks.entry(room_id).or_default().clone()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::Arc;

    use jukebox_core::{Hub, HubConfig};

    use crate::{Collab, CollabConfig, SqliteDatabase, StaticCatalog, TrackId, TrackMetadata};

    pub async fn collab_with(config: CollabConfig) -> (Collab, Arc<StaticCatalog>) {
        let database = SqliteDatabase::in_memory().await.unwrap();
        let catalog = Arc::new(StaticCatalog::new());
        let hub = Hub::new(HubConfig::default());

        let collab = Collab::new(Arc::new(database), catalog.clone(), hub, config);
        (collab, catalog)
    }

    pub async fn collab() -> (Collab, Arc<StaticCatalog>) {
        collab_with(CollabConfig::default()).await
    }

    pub fn metadata(title: &str, artist: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            artist: artist.to_string(),
            cover_url: "https://covers.test/400x400".to_string(),
            duration_ms: 180_000,
            stream_url: format!("https://stream.test/{}", title),
        }
    }

    pub fn track(id: i64) -> TrackId {
        TrackId::new(id).unwrap()
    }
}
