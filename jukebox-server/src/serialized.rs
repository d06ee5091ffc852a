//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, Utc};
use jukebox_collab::{
    AddedTrack as CollabAddedTrack, PlaylistTrack, RoomData, TrackMetadata,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: i64,
    code: String,
    created_at: DateTime<Utc>,
}

/// A playlist entry. Catalog fields are missing when the track couldn't be resolved.
#[derive(Debug, Serialize, ToSchema)]
pub struct Track {
    track_id: i64,
    position: i64,
    date_added: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddedTrack {
    track: Track,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackInfo {
    title: String,
    artist: String,
    cover_url: String,
    duration_ms: u64,
    stream_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommandReply {
    pub reply: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            code: self.code.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Track> for PlaylistTrack {
    fn to_serialized(&self) -> Track {
        let metadata = self.metadata.as_ref();

        Track {
            track_id: self.track_id.value(),
            position: self.position,
            date_added: self.date_added,
            title: metadata.map(|m| m.title.clone()),
            artist: metadata.map(|m| m.artist.clone()),
            cover_url: metadata.map(|m| m.cover_url.clone()),
            duration_ms: metadata.map(|m| m.duration_ms),
            stream_url: metadata.map(|m| m.stream_url.clone()),
        }
    }
}

impl ToSerialized<AddedTrack> for CollabAddedTrack {
    fn to_serialized(&self) -> AddedTrack {
        AddedTrack {
            track: self.track.to_serialized(),
            warning: self.warning.clone(),
        }
    }
}

impl ToSerialized<TrackInfo> for TrackMetadata {
    fn to_serialized(&self) -> TrackInfo {
        TrackInfo {
            title: self.title.clone(),
            artist: self.artist.clone(),
            cover_url: self.cover_url.clone(),
            duration_ms: self.duration_ms,
            stream_url: self.stream_url.clone(),
        }
    }
}
