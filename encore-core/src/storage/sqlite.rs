use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Error as SqlxError, Row, SqlitePool,
};

use super::{
    IntoStorageError, NewRequest, NewSong, PrimaryKey, RequestData, Result, SessionData, SongData,
    Storage, StorageError, UpdatedSong,
};

/// `app_state` keys holding the session as JSON blobs
const QUEUE_KEY: &str = "queue";
const CURRENT_SONG_KEY: &str = "currentSong";
const QR_VISIBLE_KEY: &str = "qrVisible";

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS songs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        youtube TEXT,
        category TEXT,
        favorite INTEGER NOT NULL DEFAULT 0,
        key_offset INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        song TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS app_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

/// A SQLite storage implementation for encore
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(Self { pool })
    }

    async fn read_state(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM app_state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn write_state(&self, key: &str, value: String) -> Result<()> {
        sqlx::query(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_songs(&self) -> Result<Vec<SongData>> {
        let rows = sqlx::query("SELECT * FROM songs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.iter().map(song_from_row).collect())
    }

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData> {
        sqlx::query("SELECT * FROM songs WHERE id = ?1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map(|row| song_from_row(&row))
            .map_err(|e| e.not_found_or("song", "id"))
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        sqlx::query(
            "INSERT INTO songs (title, artist, youtube, category, favorite, key_offset)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING *",
        )
        .bind(new_song.title)
        .bind(new_song.artist)
        .bind(new_song.youtube)
        .bind(new_song.category)
        .bind(new_song.favorite)
        .bind(new_song.key)
        .fetch_one(&self.pool)
        .await
        .map(|row| song_from_row(&row))
        .map_err(|e| e.any())
    }

    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData> {
        let song = self.song_by_id(updated_song.id).await?;

        sqlx::query(
            "UPDATE songs SET
                title = ?1,
                artist = ?2,
                youtube = ?3,
                category = ?4,
                favorite = ?5,
                key_offset = ?6
            WHERE id = ?7",
        )
        .bind(updated_song.title.unwrap_or(song.title))
        .bind(updated_song.artist.unwrap_or(song.artist))
        .bind(updated_song.youtube.or(song.youtube))
        .bind(updated_song.category.or(song.category))
        .bind(updated_song.favorite.unwrap_or(song.favorite))
        .bind(updated_song.key.unwrap_or(song.key))
        .bind(updated_song.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.song_by_id(updated_song.id).await
    }

    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()> {
        // Ensure song exists
        let _ = self.song_by_id(song_id).await?;

        sqlx::query("DELETE FROM songs WHERE id = ?1")
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_requests(&self) -> Result<Vec<RequestData>> {
        let rows = sqlx::query("SELECT * FROM requests ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(request_from_row).collect()
    }

    async fn create_request(&self, new_request: NewRequest) -> Result<RequestData> {
        let row = sqlx::query(
            "INSERT INTO requests (song, timestamp) VALUES (?1, ?2) RETURNING *",
        )
        .bind(new_request.song)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        request_from_row(&row)
    }

    async fn load_session(&self) -> Result<SessionData> {
        let queue = match self.read_state(QUEUE_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| e.any())?,
            None => vec![],
        };

        let current_song = match self.read_state(CURRENT_SONG_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| e.any())?,
            None => None,
        };

        Ok(SessionData {
            queue,
            current_song,
        })
    }

    async fn save_session(&self, session: &SessionData) -> Result<()> {
        let queue = serde_json::to_string(&session.queue).map_err(|e| e.any())?;
        let current_song =
            serde_json::to_string(&session.current_song).map_err(|e| e.any())?;

        self.write_state(QUEUE_KEY, queue).await?;
        self.write_state(CURRENT_SONG_KEY, current_song).await
    }

    async fn load_qr_visibility(&self) -> Result<bool> {
        let visible = match self.read_state(QR_VISIBLE_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| e.any())?,
            None => false,
        };

        Ok(visible)
    }

    async fn save_qr_visibility(&self, visible: bool) -> Result<()> {
        self.write_state(QR_VISIBLE_KEY, visible.to_string()).await
    }
}

fn song_from_row(row: &SqliteRow) -> SongData {
    SongData {
        id: row.get("id"),
        title: row.get("title"),
        artist: row.get("artist"),
        youtube: row.get("youtube"),
        category: row.get("category"),
        favorite: row.get("favorite"),
        key: row.get("key_offset"),
    }
}

fn request_from_row(row: &SqliteRow) -> Result<RequestData> {
    let raw_timestamp: String = row.get("timestamp");

    let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| e.any())?;

    Ok(RequestData {
        id: row.get("id"),
        song: row.get("song"),
        timestamp,
    })
}

impl IntoStorageError for SqlxError {
    fn any(self) -> StorageError {
        StorageError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StorageError {
        match self {
            SqlxError::RowNotFound => StorageError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

impl IntoStorageError for serde_json::Error {
    fn any(self) -> StorageError {
        StorageError::Internal(Box::new(self))
    }

    fn not_found_or(self, _resource: &'static str, _identifier: &'static str) -> StorageError {
        self.any()
    }
}

impl IntoStorageError for chrono::ParseError {
    fn any(self) -> StorageError {
        StorageError::Internal(Box::new(self))
    }

    fn not_found_or(self, _resource: &'static str, _identifier: &'static str) -> StorageError {
        self.any()
    }
}
