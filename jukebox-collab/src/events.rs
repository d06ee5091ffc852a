use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{PlaylistTrack, TrackId};

/// Messages pushed to everyone watching a room
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoomEvent {
    Next,
    Prev,
    Pause,
    Now,
    Notification {
        message: String,
    },
    TrackAdded {
        track: PlaylistTrack,
    },
    TrackRemoved {
        track_id: TrackId,
    },
    /// A track's position changed, clients should re-sort
    Reordered {
        track_id: TrackId,
        position: i64,
    },
}

/// Playback controls relayed to the room's player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Next,
    Prev,
    Pause,
    Now,
}

impl From<TransportKind> for RoomEvent {
    fn from(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Next => Self::Next,
            TransportKind::Prev => Self::Prev,
            TransportKind::Pause => Self::Pause,
            TransportKind::Now => Self::Now,
        }
    }
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Next => "next",
            Self::Prev => "prev",
            Self::Pause => "pause",
            Self::Now => "now",
        };

        write!(f, "{}", name)
    }
}
