mod reference;

use chrono::{DateTime, Utc};
use futures_util::{future, stream, StreamExt};
use jukebox_core::Scope;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

pub use reference::*;

use crate::{
    CollabContext, DatabaseError, DatabaseResult, NewPlaylistEntry, PlaylistEntryData, RoomData,
    RoomEvent, TrackMetadata, TransportKind, TransportScope,
};

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error(transparent)]
    InvalidTrackReference(#[from] ReferenceError),
    #[error("Track {track_id} is already in the playlist")]
    DuplicateTrack { track_id: TrackId },
    #[error("{resource} {identifier} was not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// A playlist entry, with catalog metadata when it could be resolved
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistTrack {
    pub track_id: TrackId,
    pub position: i64,
    pub date_added: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: Option<TrackMetadata>,
}

/// The result of adding a track
#[derive(Debug, Clone, Serialize)]
pub struct AddedTrack {
    pub track: PlaylistTrack,
    /// Set when the track was added but its metadata is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Keeps playlists deduplicated and ordered, and tells the hub about changes.
pub struct PlaylistManager {
    context: CollabContext,
}

impl PlaylistManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Adds a track from a user supplied reference.
    ///
    /// Membership is decided before the catalog is asked anything,
    /// so a failing catalog only results in a warning.
    pub async fn add_track(
        &self,
        room: &RoomData,
        reference: &str,
    ) -> Result<AddedTrack, PlaylistError> {
        let track_id = TrackId::parse(reference)?;

        let entry = {
            let lock = self.context.room_lock(room.id);
            let _guard = lock.lock().await;
            self.ensure_room(room).await?;

            self.context
                .database
                .entry(room.id, track_id)
                .await
                .conflict_or_ok("playlist entry", "track_id", &track_id.to_string())
                .map_err(|e| duplicate_or_storage(e, track_id))?;

            let new_entry = NewPlaylistEntry {
                room_id: room.id,
                track_id,
                position: 0,
                date_added: Utc::now(),
            };

            self.context
                .database
                .create_entry(new_entry)
                .await
                .map_err(|e| duplicate_or_storage(e, track_id))?
        };

        info!("Added track {} to room {}", track_id, room.code);

        let (metadata, warning) = match self.context.resolve(track_id).await {
            Ok(metadata) => (Some(metadata), None),
            Err(e) => {
                warn!("Track {} was added without metadata: {}", track_id, e);
                (
                    None,
                    Some(format!("Track was added, but its details are unavailable: {}", e)),
                )
            }
        };

        let track = PlaylistTrack::new(entry, metadata);

        self.context.emit(
            Scope::Room(room.id),
            &RoomEvent::TrackAdded {
                track: track.clone(),
            },
        );

        Ok(AddedTrack { track, warning })
    }

    pub async fn remove_track(
        &self,
        room: &RoomData,
        track_id: TrackId,
    ) -> Result<(), PlaylistError> {
        let lock = self.context.room_lock(room.id);
        let _guard = lock.lock().await;
        self.ensure_room(room).await?;

        match self.context.database.delete_entry(room.id, track_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("Room {} exists but has no track {}", room.code, track_id);
                return Err(track_not_found(track_id));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Removed track {} from room {}", track_id, room.code);
        self.context
            .emit(Scope::Room(room.id), &RoomEvent::TrackRemoved { track_id });

        Ok(())
    }

    /// Changes the ordering hint of a single track, leaving the others as they are
    pub async fn reposition(
        &self,
        room: &RoomData,
        track_id: TrackId,
        position: i64,
    ) -> Result<PlaylistTrack, PlaylistError> {
        let lock = self.context.room_lock(room.id);
        let _guard = lock.lock().await;
        self.ensure_room(room).await?;

        let entry = self
            .context
            .database
            .update_entry_position(room.id, track_id, position)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    track_not_found(track_id)
                } else {
                    e.into()
                }
            })?;

        self.context.emit(
            Scope::Room(room.id),
            &RoomEvent::Reordered { track_id, position },
        );

        Ok(PlaylistTrack::new(entry, None))
    }

    /// Lists the playlist with metadata, skipping anything the catalog can't resolve
    pub async fn list_playlist(
        &self,
        room: &RoomData,
    ) -> Result<Vec<PlaylistTrack>, PlaylistError> {
        let entries = self.context.database.list_entries(room.id).await?;
        let context = &self.context;
        let concurrency = context.config.resolve_concurrency.max(1);

        let resolved = stream::iter(entries).map(|entry| async move {
            let track_id = entry.track_id;

            match context.resolve(track_id).await {
                Ok(metadata) => Some(PlaylistTrack::new(entry, Some(metadata))),
                Err(e) => {
                    warn!("Skipping track {} in room {}: {}", track_id, room.code, e);
                    None
                }
            }
        });

        Ok(resolved
            .buffered(concurrency)
            .filter_map(future::ready)
            .collect::<Vec<_>>()
            .await)
    }

    /// Lists the playlist in order, without asking the catalog
    pub async fn list_entries(&self, room: &RoomData) -> Result<Vec<PlaylistTrack>, PlaylistError> {
        let entries = self.context.database.list_entries(room.id).await?;

        Ok(entries
            .into_iter()
            .map(|entry| PlaylistTrack::new(entry, None))
            .collect())
    }

    /// Relays a playback control, nothing is stored
    pub fn transport(&self, room: &RoomData, kind: TransportKind) {
        let scope = match self.context.config.transport_scope {
            TransportScope::Room => Scope::Room(room.id),
            TransportScope::Global => Scope::All,
        };

        debug!("Relaying {} for room {}", kind, room.code);
        self.context.emit(scope, &RoomEvent::from(kind));
    }

    pub fn notify(&self, room: &RoomData, message: String) {
        self.context
            .emit(Scope::Room(room.id), &RoomEvent::Notification { message });
    }

    /// Must be called with the room lock held, the room may have been deleted while waiting
    async fn ensure_room(&self, room: &RoomData) -> Result<(), PlaylistError> {
        match self.context.database.room_by_id(room.id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Room {} was deleted before the write", room.code);

                Err(PlaylistError::NotFound {
                    resource: "room",
                    identifier: room.code.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl PlaylistTrack {
    pub fn new(entry: PlaylistEntryData, metadata: Option<TrackMetadata>) -> Self {
        Self {
            track_id: entry.track_id,
            position: entry.position,
            date_added: entry.date_added,
            metadata,
        }
    }
}

fn duplicate_or_storage(error: DatabaseError, track_id: TrackId) -> PlaylistError {
    match error {
        DatabaseError::Conflict { .. } => PlaylistError::DuplicateTrack { track_id },
        e => PlaylistError::Storage(e),
    }
}

fn track_not_found(track_id: TrackId) -> PlaylistError {
    PlaylistError::NotFound {
        resource: "track",
        identifier: track_id.to_string(),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use futures_util::future::join_all;
    use jukebox_core::{Connection, HubConfig, Subscription};
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::{test_util, CollabConfig, PlaylistError, TransportKind, TransportScope};

    async fn next_message(receiver: &mut mpsc::Receiver<Arc<str>>) -> Value {
        let payload = receiver.recv().await.unwrap();
        serde_json::from_str(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let (collab, catalog) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();
        catalog.insert(test_util::track(10), test_util::metadata("Song", "Band"));

        let added = collab.playlists.add_track(&room, "10").await.unwrap();
        assert!(added.warning.is_none());
        assert_eq!(added.track.metadata.unwrap().title, "Song");

        let again = collab
            .playlists
            .add_track(&room, "https://music.yandex.ru/track/10")
            .await;

        assert!(matches!(again, Err(PlaylistError::DuplicateTrack { .. })));
        assert_eq!(collab.playlists.list_entries(&room).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_reference_is_rejected() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        let result = collab.playlists.add_track(&room, "https://host/artist/5").await;

        assert!(matches!(result, Err(PlaylistError::InvalidTrackReference(_))));
        assert!(collab.playlists.list_entries(&room).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_track_in_different_rooms() {
        let (collab, _) = test_util::collab().await;
        let first = collab.rooms.create_room().await.unwrap();
        let second = collab.rooms.create_room().await.unwrap();

        collab.playlists.add_track(&first, "5").await.unwrap();
        collab.playlists.add_track(&second, "5").await.unwrap();
    }

    #[tokio::test]
    async fn test_reposition_orders_after_ties() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        for id in ["1", "2", "3"] {
            collab.playlists.add_track(&room, id).await.unwrap();
        }

        collab
            .playlists
            .reposition(&room, test_util::track(2), 5)
            .await
            .unwrap();

        let order: Vec<i64> = collab
            .playlists
            .list_entries(&room)
            .await
            .unwrap()
            .iter()
            .map(|t| t.track_id.value())
            .collect();

        assert_eq!(order, vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_remove_absent_track() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();
        let other = collab.rooms.create_room().await.unwrap();

        collab.playlists.add_track(&room, "1").await.unwrap();

        let result = collab.playlists.remove_track(&other, test_util::track(1)).await;
        assert!(matches!(result, Err(PlaylistError::NotFound { .. })));

        let result = collab.playlists.remove_track(&room, test_util::track(2)).await;
        assert!(matches!(result, Err(PlaylistError::NotFound { .. })));

        assert_eq!(collab.playlists.list_entries(&room).await.unwrap().len(), 1);

        collab
            .playlists
            .remove_track(&room, test_util::track(1))
            .await
            .unwrap();
        assert!(collab.playlists.list_entries(&room).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reposition_absent_track() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();
        let other = collab.rooms.create_room().await.unwrap();

        collab.playlists.add_track(&room, "1").await.unwrap();

        let (watcher, mut watcher_rx) = Connection::channel(Subscription::Room(room.id), 8);
        collab.hub().attach(watcher).unwrap();

        let result = collab
            .playlists
            .reposition(&room, test_util::track(2), 3)
            .await;
        assert!(matches!(
            result,
            Err(PlaylistError::NotFound { resource: "track", .. })
        ));

        let result = collab
            .playlists
            .reposition(&other, test_util::track(1), 3)
            .await;
        assert!(matches!(
            result,
            Err(PlaylistError::NotFound { resource: "track", .. })
        ));

        collab.hub().flush().await;
        assert!(watcher_rx.try_recv().is_err());

        let entries = collab.playlists.list_entries(&room).await.unwrap();
        assert_eq!(entries[0].position, 0);
    }

    #[tokio::test]
    async fn test_writes_to_deleted_room_fail() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();
        let stale = room.clone();

        collab.playlists.add_track(&room, "1").await.unwrap();
        collab.rooms.delete_room(&room.code).await.unwrap();

        let added = collab.playlists.add_track(&stale, "42").await;
        assert!(matches!(
            added,
            Err(PlaylistError::NotFound { resource: "room", .. })
        ));

        let moved = collab
            .playlists
            .reposition(&stale, test_util::track(1), 2)
            .await;
        assert!(matches!(
            moved,
            Err(PlaylistError::NotFound { resource: "room", .. })
        ));

        let removed = collab
            .playlists
            .remove_track(&stale, test_util::track(1))
            .await;
        assert!(matches!(
            removed,
            Err(PlaylistError::NotFound { resource: "room", .. })
        ));

        assert!(collab.playlists.list_entries(&stale).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_racing_delete_leaves_no_rows() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        let (added, deleted) = tokio::join!(
            collab.playlists.add_track(&room, "42"),
            collab.rooms.delete_room(&room.code),
        );

        deleted.unwrap();
        assert!(matches!(
            added,
            Ok(_) | Err(PlaylistError::NotFound { resource: "room", .. })
        ));

        assert!(collab.playlists.list_entries(&room).await.unwrap().is_empty());
        assert!(!collab.rooms.room_exists(&room.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_with_zero_concurrency_still_resolves() {
        let (collab, catalog) = test_util::collab_with(CollabConfig {
            resolve_concurrency: 0,
            ..Default::default()
        })
        .await;

        let room = collab.rooms.create_room().await.unwrap();
        catalog.insert(test_util::track(1), test_util::metadata("One", "A"));
        catalog.insert(test_util::track(2), test_util::metadata("Two", "B"));

        collab.playlists.add_track(&room, "2").await.unwrap();
        collab.playlists.add_track(&room, "1").await.unwrap();

        let titles: Vec<String> = collab
            .playlists
            .list_playlist(&room)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|t| t.metadata.map(|m| m.title))
            .collect();

        assert_eq!(titles, vec!["Two", "One"]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_of_one_track() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        let attempts = (0..50).map(|_| collab.playlists.add_track(&room, "777"));
        let results = join_all(attempts).await;

        let added = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(PlaylistError::DuplicateTrack { .. })))
            .count();

        assert_eq!(added, 1);
        assert_eq!(duplicates, 49);
        assert_eq!(collab.playlists.list_entries(&room).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_track_is_kept_with_warning() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        let added = collab.playlists.add_track(&room, "404").await.unwrap();

        assert!(added.track.metadata.is_none());
        assert!(added.warning.is_some());
        assert_eq!(collab.playlists.list_entries(&room).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_skips_unresolvable_tracks() {
        let (collab, catalog) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        catalog.insert(test_util::track(1), test_util::metadata("One", "A"));
        catalog.insert(test_util::track(3), test_util::metadata("Three", "C"));

        for id in ["1", "2", "3"] {
            collab.playlists.add_track(&room, id).await.unwrap();
        }

        let titles: Vec<String> = collab
            .playlists
            .list_playlist(&room)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|t| t.metadata.map(|m| m.title))
            .collect();

        assert_eq!(titles, vec!["One", "Three"]);

        catalog.remove(test_util::track(1));
        assert_eq!(collab.playlists.list_playlist(&room).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changes_reach_room_subscribers() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();
        let other = collab.rooms.create_room().await.unwrap();

        let capacity = HubConfig::default().outbox_capacity;
        let (watcher, mut watcher_rx) = Connection::channel(Subscription::Room(room.id), capacity);
        let (bystander, mut bystander_rx) =
            Connection::channel(Subscription::Room(other.id), capacity);

        collab.hub().attach(watcher).unwrap();
        collab.hub().attach(bystander).unwrap();

        collab.playlists.add_track(&room, "9").await.unwrap();
        collab.playlists.transport(&room, TransportKind::Pause);
        collab
            .playlists
            .remove_track(&room, test_util::track(9))
            .await
            .unwrap();
        collab.playlists.notify(&room, "hi".to_string());
        collab.hub().flush().await;

        let added = next_message(&mut watcher_rx).await;
        assert_eq!(added["type"], "track-added");
        assert_eq!(added["track"]["track_id"], 9);

        assert_eq!(next_message(&mut watcher_rx).await["type"], "pause");
        assert_eq!(next_message(&mut watcher_rx).await["type"], "track-removed");
        assert_eq!(next_message(&mut watcher_rx).await["message"], "hi");

        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_global_transport_reaches_every_room() {
        let (collab, _) = test_util::collab_with(CollabConfig {
            transport_scope: TransportScope::Global,
            ..Default::default()
        })
        .await;

        let room = collab.rooms.create_room().await.unwrap();
        let other = collab.rooms.create_room().await.unwrap();

        let (bystander, mut bystander_rx) = Connection::channel(Subscription::Room(other.id), 8);
        collab.hub().attach(bystander).unwrap();

        collab.playlists.transport(&room, TransportKind::Next);
        collab.playlists.notify(&room, "only for the room".to_string());
        collab.hub().flush().await;

        assert_eq!(next_message(&mut bystander_rx).await["type"], "next");
        assert!(bystander_rx.try_recv().is_err());
    }
}
