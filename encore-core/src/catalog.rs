use crate::{
    EncoreError, NewSong, PrimaryKey, Result, SharedStorage, SongData, UpdatedSong,
};

/// The songs catalog, independent of the live queue
pub struct Catalog {
    storage: SharedStorage,
}

impl Catalog {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// All songs, ordered by id ascending
    pub async fn list(&self) -> Result<Vec<SongData>> {
        Ok(self.storage.list_songs().await?)
    }

    pub async fn create(&self, new_song: NewSong) -> Result<SongData> {
        if new_song.title.trim().is_empty() {
            return Err(EncoreError::MissingField("title"));
        }

        if new_song.artist.trim().is_empty() {
            return Err(EncoreError::MissingField("artist"));
        }

        Ok(self.storage.create_song(new_song).await?)
    }

    /// Partially update a song. Only the supplied fields change.
    pub async fn update(&self, updated_song: UpdatedSong) -> Result<SongData> {
        Ok(self.storage.update_song(updated_song).await?)
    }

    pub async fn delete(&self, song_id: PrimaryKey) -> Result<()> {
        Ok(self.storage.delete_song(song_id).await?)
    }
}
