use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

mod file;
pub use file::*;

pub type Result<T> = std::result::Result<T, StorageError>;
pub type SharedStorage = Arc<dyn Storage>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// An unknown or internal error happened with the backing store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoStorageError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StorageError;
    fn any(self) -> StorageError;
}

/// Represents a type that can load and save encore data.
///
/// Both backing stores are equally valid, the rest of the system only ever
/// talks to this trait. Selected at startup via configuration.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn list_songs(&self) -> Result<Vec<SongData>>;
    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData>;
    async fn create_song(&self, new_song: NewSong) -> Result<SongData>;
    async fn update_song(&self, updated_song: UpdatedSong) -> Result<SongData>;
    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()>;

    async fn list_requests(&self) -> Result<Vec<RequestData>>;
    async fn create_request(&self, new_request: NewRequest) -> Result<RequestData>;

    async fn load_session(&self) -> Result<SessionData>;
    async fn save_session(&self, session: &SessionData) -> Result<()>;

    async fn load_qr_visibility(&self) -> Result<bool>;
    async fn save_qr_visibility(&self, visible: bool) -> Result<()>;
}
