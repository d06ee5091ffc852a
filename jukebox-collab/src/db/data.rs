use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::TrackId;

/// The type used for primary keys in the database.
pub type PrimaryKey = i64;

/// A jukebox room
#[derive(Debug, Clone, FromRow)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// The short code people use to join the room
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// A track's membership in a room's playlist
#[derive(Debug, Clone, FromRow)]
pub struct PlaylistEntryData {
    /// Row id, doubles as insertion order
    pub id: PrimaryKey,
    pub track_id: TrackId,
    pub room_id: PrimaryKey,
    /// Ordering hint, entries with equal positions keep insertion order
    pub position: i64,
    pub date_added: DateTime<Utc>,
}

/// Credentials used by the catalog to talk to the music service
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CatalogSettings {
    pub user_id: i64,
    pub access_token: String,
}
