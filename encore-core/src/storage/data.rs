use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for primary keys in storage.
pub type PrimaryKey = i64;

/// A song in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongData {
    pub id: PrimaryKey,
    pub title: String,
    pub artist: String,
    /// Reference url to a video, only stored for display purposes
    pub youtube: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    /// Key offset in seconds
    #[serde(default)]
    pub key: i64,
}

/// A free-text song request, appended by guests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub id: PrimaryKey,
    /// Free text, not necessarily a catalog reference
    pub song: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry in the session queue.
/// Note: `song` is a snapshot, later catalog edits do not affect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryData {
    /// Time-derived unique id
    pub id: i64,
    pub song: SongData,
    pub requested_by: String,
}

/// The full shared session, mirrored to every connected client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub queue: Vec<QueueEntryData>,
    pub current_song: Option<QueueEntryData>,
}

#[derive(Debug, Clone)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub youtube: Option<String>,
    pub category: Option<String>,
    pub favorite: bool,
    pub key: i64,
}

/// A partial update. Only the supplied fields change.
#[derive(Debug, Clone, Default)]
pub struct UpdatedSong {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub youtube: Option<String>,
    pub category: Option<String>,
    pub favorite: Option<bool>,
    pub key: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub song: String,
}
