use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use super::{
    IntoStorageError, NewRequest, NewSong, PrimaryKey, RequestData, Result, SessionData, SongData,
    Storage, StorageError, UpdatedSong,
};

const SONGS_FILE: &str = "songs.json";
const REQUESTS_FILE: &str = "requests.json";
const STATE_FILE: &str = "state.json";

/// A flat-file storage implementation for encore.
///
/// Keeps three JSON files in a data directory: `songs.json`, `requests.json`
/// and `state.json`. A missing file reads as empty. Unlike the SQLite
/// backend, the QR visibility flag has no slot in this layout, so it is not
/// persisted here and resets to false across restarts.
pub struct FileStorage {
    dir: PathBuf,
    /// Serializes read-modify-write cycles on the files
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        fs::create_dir_all(&dir).await.map_err(|e| e.any())?;

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    async fn read<T>(&self, file: &str, empty: T) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match fs::read(self.dir.join(file)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| e.any()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(empty),
            Err(e) => Err(e.any()),
        }
    }

    async fn write<T>(&self, file: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| e.any())?;

        fs::write(self.dir.join(file), bytes)
            .await
            .map_err(|e| e.any())
    }

    async fn songs(&self) -> Result<Vec<SongData>> {
        self.read(SONGS_FILE, vec![]).await
    }

    async fn requests(&self) -> Result<Vec<RequestData>> {
        self.read(REQUESTS_FILE, vec![]).await
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn list_songs(&self) -> Result<Vec<SongData>> {
        let mut songs = self.songs().await?;
        songs.sort_by_key(|s| s.id);

        Ok(songs)
    }

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData> {
        self.songs()
            .await?
            .into_iter()
            .find(|s| s.id == song_id)
            .ok_or(StorageError::NotFound {
                resource: "song",
                identifier: "id",
            })
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let _guard = self.write_lock.lock().await;

        let mut songs = self.songs().await?;
        let id = next_id(songs.iter().map(|s| s.id));

        let song = SongData {
            id,
            title: new_song.title,
            artist: new_song.artist,
            youtube: new_song.youtube,
            category: new_song.category,
            favorite: new_song.favorite,
            key: new_song.key,
        };

        songs.push(song.clone());
        self.write(SONGS_FILE, &songs).await?;

        Ok(song)
    }

    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData> {
        let _guard = self.write_lock.lock().await;

        let mut songs = self.songs().await?;

        let song = songs
            .iter_mut()
            .find(|s| s.id == updated_song.id)
            .ok_or(StorageError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        if let Some(title) = updated_song.title {
            song.title = title;
        }
        if let Some(artist) = updated_song.artist {
            song.artist = artist;
        }
        if let Some(youtube) = updated_song.youtube {
            song.youtube = Some(youtube);
        }
        if let Some(category) = updated_song.category {
            song.category = Some(category);
        }
        if let Some(favorite) = updated_song.favorite {
            song.favorite = favorite;
        }
        if let Some(key) = updated_song.key {
            song.key = key;
        }

        let song = song.clone();
        self.write(SONGS_FILE, &songs).await?;

        Ok(song)
    }

    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut songs = self.songs().await?;
        let before = songs.len();

        songs.retain(|s| s.id != song_id);

        if songs.len() == before {
            return Err(StorageError::NotFound {
                resource: "song",
                identifier: "id",
            });
        }

        self.write(SONGS_FILE, &songs).await
    }

    async fn list_requests(&self) -> Result<Vec<RequestData>> {
        self.requests().await
    }

    async fn create_request(&self, new_request: NewRequest) -> Result<RequestData> {
        let _guard = self.write_lock.lock().await;

        let mut requests = self.requests().await?;

        let request = RequestData {
            id: next_id(requests.iter().map(|r| r.id)),
            song: new_request.song,
            timestamp: Utc::now(),
        };

        requests.push(request.clone());
        self.write(REQUESTS_FILE, &requests).await?;

        Ok(request)
    }

    async fn load_session(&self) -> Result<SessionData> {
        self.read(STATE_FILE, SessionData::default()).await
    }

    async fn save_session(&self, session: &SessionData) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.write(STATE_FILE, session).await
    }

    async fn load_qr_visibility(&self) -> Result<bool> {
        Ok(false)
    }

    async fn save_qr_visibility(&self, _visible: bool) -> Result<()> {
        Ok(())
    }
}

fn next_id(ids: impl Iterator<Item = PrimaryKey>) -> PrimaryKey {
    ids.max().unwrap_or(0) + 1
}

impl IntoStorageError for std::io::Error {
    fn any(self) -> StorageError {
        StorageError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StorageError {
        match self.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                resource,
                identifier,
            },
            _ => self.any(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::temp_dir;

    fn new_song(title: &str, artist: &str) -> NewSong {
        NewSong {
            title: title.to_string(),
            artist: artist.to_string(),
            youtube: None,
            category: None,
            favorite: false,
            key: 0,
        }
    }

    #[tokio::test]
    async fn fresh_directory_reads_as_empty() {
        let storage = FileStorage::new(temp_dir()).await.unwrap();

        assert!(storage.list_songs().await.unwrap().is_empty());
        assert!(storage.list_requests().await.unwrap().is_empty());
        assert_eq!(storage.load_session().await.unwrap(), SessionData::default());
        assert!(!storage.load_qr_visibility().await.unwrap());
    }

    #[tokio::test]
    async fn ids_keep_incrementing_after_deletes() {
        let storage = FileStorage::new(temp_dir()).await.unwrap();

        let first = storage.create_song(new_song("Jolene", "Dolly Parton")).await.unwrap();
        let second = storage.create_song(new_song("Zombie", "The Cranberries")).await.unwrap();

        assert_eq!(second.id, first.id + 1);

        storage.delete_song(first.id).await.unwrap();

        let third = storage.create_song(new_song("Valerie", "Amy Winehouse")).await.unwrap();
        assert_eq!(third.id, second.id + 1);
    }

    #[tokio::test]
    async fn partial_update_touches_only_supplied_fields() {
        let storage = FileStorage::new(temp_dir()).await.unwrap();

        let song = storage
            .create_song(NewSong {
                youtube: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
                category: Some("80s".to_string()),
                key: -2,
                ..new_song("Never Gonna Give You Up", "Rick Astley")
            })
            .await
            .unwrap();

        let updated = storage
            .update_song(UpdatedSong {
                id: song.id,
                favorite: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(updated.favorite);
        assert_eq!(updated.title, song.title);
        assert_eq!(updated.artist, song.artist);
        assert_eq!(updated.youtube, song.youtube);
        assert_eq!(updated.category, song.category);
        assert_eq!(updated.key, song.key);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let storage = FileStorage::new(temp_dir()).await.unwrap();

        assert!(matches!(
            storage.song_by_id(42).await,
            Err(StorageError::NotFound { .. })
        ));

        assert!(matches!(
            storage.delete_song(42).await,
            Err(StorageError::NotFound { .. })
        ));

        assert!(matches!(
            storage
                .update_song(UpdatedSong {
                    id: 42,
                    title: Some("Ghost".to_string()),
                    ..Default::default()
                })
                .await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn session_survives_reopening_the_store() {
        let dir = temp_dir();

        let session = {
            let storage = FileStorage::new(&dir).await.unwrap();

            let song = storage.create_song(new_song("Islands in the Stream", "Dolly Parton")).await.unwrap();

            let entry = crate::QueueEntryData {
                id: 1700000000000,
                song,
                requested_by: "Kenny".to_string(),
            };

            let session = SessionData {
                queue: vec![],
                current_song: Some(entry),
            };

            storage.save_session(&session).await.unwrap();
            session
        };

        let reopened = FileStorage::new(&dir).await.unwrap();
        assert_eq!(reopened.load_session().await.unwrap(), session);
    }
}
