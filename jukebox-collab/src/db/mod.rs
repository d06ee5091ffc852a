use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

use crate::TrackId;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(BoxedError),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can store jukebox rooms and playlists
#[async_trait]
pub trait Database: Send + Sync {
    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;
    async fn room_by_code(&self, code: &str) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    /// Fails with a conflict if the code is taken
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    /// Deletes the room along with its playlist
    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()>;

    async fn entry(&self, room_id: PrimaryKey, track_id: TrackId) -> Result<PlaylistEntryData>;
    /// Fails with a conflict if the track is already in the room
    async fn create_entry(&self, new_entry: NewPlaylistEntry) -> Result<PlaylistEntryData>;
    async fn update_entry_position(
        &self,
        room_id: PrimaryKey,
        track_id: TrackId,
        position: i64,
    ) -> Result<PlaylistEntryData>;
    async fn delete_entry(&self, room_id: PrimaryKey, track_id: TrackId) -> Result<()>;
    /// Returns the entries ordered by position, then insertion order
    async fn list_entries(&self, room_id: PrimaryKey) -> Result<Vec<PlaylistEntryData>>;

    /// Returns the most recently saved catalog settings
    async fn catalog_settings(&self) -> Result<CatalogSettings>;
    async fn save_catalog_settings(&self, settings: CatalogSettings) -> Result<()>;
}

#[derive(Debug)]
pub struct NewRoom {
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewPlaylistEntry {
    pub room_id: PrimaryKey,
    pub track_id: TrackId,
    pub position: i64,
    pub date_added: DateTime<Utc>,
}
