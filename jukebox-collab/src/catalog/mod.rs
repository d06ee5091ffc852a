use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CatalogSettings, TrackId};

mod yandex;
pub use yandex::*;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Track {0} was not found in the catalog")]
    NotFound(TrackId),

    #[error("Catalog credentials are not configured")]
    NotConfigured,

    #[error("Failed to fetch from catalog: {0}")]
    FetchError(String),

    #[error("Failed to parse catalog response: {0}")]
    ParseError(String),

    #[error("Catalog did not answer in time")]
    TimedOut,
}

/// What the catalog knows about a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub cover_url: String,
    pub duration_ms: u64,
    /// A direct link to the audio, usually short-lived
    pub stream_url: String,
}

/// Translates track ids into display and stream metadata.
/// A failure only ever means the metadata is unavailable right now.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn resolve(&self, track_id: TrackId) -> Result<TrackMetadata, CatalogError>;

    /// Called when new credentials are saved
    fn configure(&self, _settings: &CatalogSettings) {}
}

/// A catalog backed by a fixed set of tracks, for tests and offline use.
#[derive(Default)]
pub struct StaticCatalog {
    tracks: DashMap<TrackId, TrackMetadata>,
    delay: Option<Duration>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every lookup take at least this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, track_id: TrackId, metadata: TrackMetadata) {
        self.tracks.insert(track_id, metadata);
    }

    pub fn remove(&self, track_id: TrackId) {
        self.tracks.remove(&track_id);
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn resolve(&self, track_id: TrackId) -> Result<TrackMetadata, CatalogError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.tracks
            .get(&track_id)
            .map(|t| t.clone())
            .ok_or(CatalogError::NotFound(track_id))
    }
}
