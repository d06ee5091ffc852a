use std::str::FromStr;

use async_trait::async_trait;
use log::info;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError, SqlitePool,
};

use super::Result;
use crate::{
    CatalogSettings, Database, DatabaseError, IntoDatabaseError, NewPlaylistEntry, NewRoom,
    PlaylistEntryData, PrimaryKey, RoomData, TrackId,
};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS rooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS playlist (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_id INTEGER NOT NULL,
        room_id INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0,
        date_added TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS playlist_room_track ON playlist (room_id, track_id)",
    "CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        access_token TEXT NOT NULL
    )",
];

const ENTRY_COLUMNS: &str = "id, track_id, room_id, position, date_added";

/// A SQLite database implementation for jukebox
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connects to the database at the url, creating the file and tables if needed.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| e.any())?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        let database = Self { pool };
        database.migrate().await?;

        info!("Connected to database at {}", url);
        Ok(database)
    }

    /// A private, throwaway database. Everything is lost when it is dropped.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| e.any())?;

        // Every connection to :memory: is a separate database, so only ever keep one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        let database = Self { pool };
        database.migrate().await?;

        Ok(database)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(())
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        query_as::<_, RoomData>("SELECT id, code, created_at FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn room_by_code(&self, code: &str) -> Result<RoomData> {
        query_as::<_, RoomData>("SELECT id, code, created_at FROM rooms WHERE code = ?")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "code"))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        query_as::<_, RoomData>("SELECT id, code, created_at FROM rooms ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        query_as::<_, RoomData>(
            "INSERT INTO rooms (code, created_at) VALUES (?, ?) RETURNING id, code, created_at",
        )
        .bind(&new_room.code)
        .bind(new_room.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("room", "code", &new_room.code))
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        let mut transaction = self.pool.begin().await.map_err(|e| e.any())?;

        let deleted = query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&mut *transaction)
            .await
            .map_err(|e| e.any())?;

        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        query("DELETE FROM playlist WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *transaction)
            .await
            .map_err(|e| e.any())?;

        transaction.commit().await.map_err(|e| e.any())
    }

    async fn entry(&self, room_id: PrimaryKey, track_id: TrackId) -> Result<PlaylistEntryData> {
        query_as::<_, PlaylistEntryData>(&format!(
            "SELECT {} FROM playlist WHERE room_id = ? AND track_id = ?",
            ENTRY_COLUMNS
        ))
        .bind(room_id)
        .bind(track_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("playlist entry", "room_id:track_id"))
    }

    async fn create_entry(&self, new_entry: NewPlaylistEntry) -> Result<PlaylistEntryData> {
        query_as::<_, PlaylistEntryData>(&format!(
            "INSERT INTO playlist (track_id, room_id, position, date_added)
            VALUES (?, ?, ?, ?)
            RETURNING {}",
            ENTRY_COLUMNS
        ))
        .bind(new_entry.track_id)
        .bind(new_entry.room_id)
        .bind(new_entry.position)
        .bind(new_entry.date_added)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            e.conflict_or(
                "playlist entry",
                "room_id:track_id",
                &format!("{}:{}", new_entry.room_id, new_entry.track_id),
            )
        })
    }

    async fn update_entry_position(
        &self,
        room_id: PrimaryKey,
        track_id: TrackId,
        position: i64,
    ) -> Result<PlaylistEntryData> {
        query_as::<_, PlaylistEntryData>(&format!(
            "UPDATE playlist SET position = ?
            WHERE room_id = ? AND track_id = ?
            RETURNING {}",
            ENTRY_COLUMNS
        ))
        .bind(position)
        .bind(room_id)
        .bind(track_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("playlist entry", "room_id:track_id"))
    }

    async fn delete_entry(&self, room_id: PrimaryKey, track_id: TrackId) -> Result<()> {
        let result = query("DELETE FROM playlist WHERE room_id = ? AND track_id = ?")
            .bind(room_id)
            .bind(track_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "playlist entry",
                identifier: "room_id:track_id",
            });
        }

        Ok(())
    }

    async fn list_entries(&self, room_id: PrimaryKey) -> Result<Vec<PlaylistEntryData>> {
        query_as::<_, PlaylistEntryData>(&format!(
            "SELECT {} FROM playlist WHERE room_id = ? ORDER BY position ASC, id ASC",
            ENTRY_COLUMNS
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn catalog_settings(&self) -> Result<CatalogSettings> {
        query_as::<_, CatalogSettings>(
            "SELECT user_id, access_token FROM settings ORDER BY id DESC LIMIT 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("settings", "id"))
    }

    async fn save_catalog_settings(&self, settings: CatalogSettings) -> Result<()> {
        query("INSERT INTO settings (user_id, access_token) VALUES (?, ?)")
            .bind(settings.user_id)
            .bind(&settings.access_token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        let is_unique_violation = self
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false);

        if is_unique_violation {
            return DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            };
        }

        self.any()
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::SqliteDatabase;
    use crate::{Database, DatabaseError, NewPlaylistEntry, NewRoom, TrackId};

    async fn database_with_room() -> (SqliteDatabase, i64) {
        let database = SqliteDatabase::in_memory().await.unwrap();
        let room = database
            .create_room(NewRoom {
                code: "ABCDE".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        (database, room.id)
    }

    fn entry(room_id: i64, track_id: i64) -> NewPlaylistEntry {
        NewPlaylistEntry {
            room_id,
            track_id: TrackId::new(track_id).unwrap(),
            position: 0,
            date_added: Utc::now(),
        }
    }

    #[tokio::test]
    async fn room_codes_are_unique() {
        let (database, _) = database_with_room().await;

        let result = database
            .create_room(NewRoom {
                code: "ABCDE".to_string(),
                created_at: Utc::now(),
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn entries_are_unique_per_room() {
        let (database, room_id) = database_with_room().await;

        database.create_entry(entry(room_id, 10)).await.unwrap();
        let duplicate = database.create_entry(entry(room_id, 10)).await;

        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        // Same track in another room is fine
        database.create_entry(entry(room_id + 1, 10)).await.unwrap();
    }

    #[tokio::test]
    async fn entries_list_by_position_then_insertion() {
        let (database, room_id) = database_with_room().await;

        for track in [1, 2, 3] {
            database.create_entry(entry(room_id, track)).await.unwrap();
        }

        database
            .update_entry_position(room_id, TrackId::new(1).unwrap(), 2)
            .await
            .unwrap();

        let order: Vec<_> = database
            .list_entries(room_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.track_id.value())
            .collect();

        assert_eq!(order, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn deleting_a_room_deletes_its_playlist() {
        let (database, room_id) = database_with_room().await;
        database.create_entry(entry(room_id, 5)).await.unwrap();

        database.delete_room(room_id).await.unwrap();

        assert!(database.room_by_id(room_id).await.unwrap_err().is_not_found());
        assert!(database.list_entries(room_id).await.unwrap().is_empty());
        assert!(database.delete_room(room_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn newest_settings_win() {
        let database = SqliteDatabase::in_memory().await.unwrap();
        assert!(database.catalog_settings().await.unwrap_err().is_not_found());

        for token in ["first", "second"] {
            database
                .save_catalog_settings(crate::CatalogSettings {
                    user_id: 1,
                    access_token: token.to_string(),
                })
                .await
                .unwrap();
        }

        let settings = database.catalog_settings().await.unwrap();
        assert_eq!(settings.access_token, "second");
    }
}
