use crate::{EncoreError, NewRequest, RequestData, Result, SharedStorage};

/// The append-only log of free-text song requests.
/// Nothing in the system ever mutates or deletes an entry.
pub struct RequestLog {
    storage: SharedStorage,
}

impl RequestLog {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// All requests, in insertion order
    pub async fn list(&self) -> Result<Vec<RequestData>> {
        Ok(self.storage.list_requests().await?)
    }

    pub async fn append(&self, new_request: NewRequest) -> Result<RequestData> {
        if new_request.song.trim().is_empty() {
            return Err(EncoreError::MissingField("song"));
        }

        Ok(self.storage.create_request(new_request).await?)
    }
}
