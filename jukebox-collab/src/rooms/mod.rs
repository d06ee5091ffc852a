use chrono::Utc;
use log::{debug, error, info};
use thiserror::Error;

use crate::{
    util::random_code, CollabContext, DatabaseError, DatabaseResult, NewRoom, RoomData,
};

pub struct RoomManager {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room {0} does not exist")]
    NotFound(String),
    #[error("Could not find a free room code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Restores the rooms from the database on init
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        let rooms = self.context.database.list_rooms().await?;
        let count = rooms.len();

        for room in rooms {
            self.context.rooms.insert(room.code.clone(), room);
        }

        info!("Restored {} rooms", count);
        Ok(())
    }

    /// Creates a room with a fresh code, resampling on collisions
    pub async fn create_room(&self) -> Result<RoomData, RoomError> {
        let config = &self.context.config;
        let alphabet: Vec<char> = config.code_alphabet.chars().collect();

        if alphabet.is_empty() || config.code_length == 0 {
            error!("Room codes cannot be generated from an empty alphabet or length");
            return Err(RoomError::CodeSpaceExhausted { attempts: 0 });
        }

        for attempt in 1..=config.max_code_attempts {
            let code = random_code(&alphabet, config.code_length);

            if self.context.rooms.contains_key(&code) {
                debug!("Room code {} is cached as taken (attempt {})", code, attempt);
                continue;
            }

            let free = self
                .context
                .database
                .room_by_code(&code)
                .await
                .conflict_or_ok("room", "code", &code);

            match free {
                Ok(()) => {}
                Err(DatabaseError::Conflict { .. }) => {
                    debug!("Room code {} is taken (attempt {})", code, attempt);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let new_room = NewRoom {
                code,
                created_at: Utc::now(),
            };

            match self.context.database.create_room(new_room).await {
                Ok(room) => {
                    info!("Created room {} ({})", room.code, room.id);
                    self.context.rooms.insert(room.code.clone(), room.clone());

                    return Ok(room);
                }
                Err(DatabaseError::Conflict { value, .. }) => {
                    debug!("Room code {} was taken concurrently (attempt {})", value, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let attempts = config.max_code_attempts;
        error!(
            "Gave up creating a room after {} attempts, the code space is too small",
            attempts
        );

        Err(RoomError::CodeSpaceExhausted { attempts })
    }

    /// Finds a room by its code, ignoring case
    pub async fn resolve_code(&self, code: &str) -> Result<RoomData, RoomError> {
        let code = normalize_code(code);

        if let Some(room) = self.context.rooms.get(&code) {
            return Ok(room.clone());
        }

        match self.context.database.room_by_code(&code).await {
            Ok(room) => {
                self.context.rooms.insert(code, room.clone());
                Ok(room)
            }
            Err(e) if e.is_not_found() => Err(RoomError::NotFound(code)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn room_exists(&self, code: &str) -> Result<bool, RoomError> {
        match self.resolve_code(code).await {
            Ok(_) => Ok(true),
            Err(RoomError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes a room along with its playlist
    pub async fn delete_room(&self, code: &str) -> Result<(), RoomError> {
        let room = self.resolve_code(code).await?;

        // Playlist writers hold this lock and check the room still exists under it
        let lock = self.context.room_lock(room.id);
        let _guard = lock.lock().await;

        let deleted = self.context.database.delete_room(room.id).await;
        self.context.rooms.remove(&room.code);

        match deleted {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Err(RoomError::NotFound(room.code)),
            Err(e) => return Err(e.into()),
        }

        // Anyone already waiting on the old lock will find the room gone
        self.context.room_locks.remove(&room.id);

        info!("Deleted room {} ({})", room.code, room.id);
        Ok(())
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomData>, RoomError> {
        Ok(self.context.database.list_rooms().await?)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::{test_util, CollabConfig, RoomError};

    #[tokio::test]
    async fn test_generated_codes_are_unique() {
        let (collab, _) = test_util::collab().await;
        let config = CollabConfig::default();

        let mut codes = HashSet::new();

        for _ in 0..10_000 {
            let room = collab.rooms.create_room().await.unwrap();

            assert_eq!(room.code.chars().count(), config.code_length);
            assert!(room.code.chars().all(|c| config.code_alphabet.contains(c)));

            codes.insert(room.code);
        }

        assert_eq!(codes.len(), 10_000);
        assert_eq!(collab.rooms.list_rooms().await.unwrap().len(), 10_000);
    }

    #[tokio::test]
    async fn test_exhausted_code_space() {
        let (collab, _) = test_util::collab_with(CollabConfig {
            code_alphabet: "A".to_string(),
            code_length: 3,
            max_code_attempts: 4,
            ..Default::default()
        })
        .await;

        let room = collab.rooms.create_room().await.unwrap();
        assert_eq!(room.code, "AAA");

        let result = collab.rooms.create_room().await;
        assert!(matches!(
            result,
            Err(RoomError::CodeSpaceExhausted { attempts: 4 })
        ));
    }

    #[tokio::test]
    async fn test_codes_resolve_ignoring_case() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        let found = collab
            .rooms
            .resolve_code(&format!(" {} ", room.code.to_lowercase()))
            .await
            .unwrap();

        assert_eq!(found.id, room.id);
        assert!(collab.rooms.room_exists(&room.code).await.unwrap());
        assert!(!collab.rooms.room_exists("ZZZZZZ").await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_room_is_gone() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        collab.rooms.delete_room(&room.code).await.unwrap();

        assert!(!collab.rooms.room_exists(&room.code).await.unwrap());
        assert!(matches!(
            collab.rooms.delete_room(&room.code).await,
            Err(RoomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_fills_cache() {
        let (collab, _) = test_util::collab().await;
        let room = collab.rooms.create_room().await.unwrap();

        collab.context.rooms.clear();
        collab.rooms.restore().await.unwrap();

        assert!(collab.context.rooms.contains_key(&room.code));
    }
}
