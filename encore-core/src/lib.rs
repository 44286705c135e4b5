mod catalog;
mod events;
mod requests;
mod session;
mod storage;

use thiserror::Error;

pub use catalog::*;
pub use events::*;
pub use requests::*;
pub use session::*;
pub use storage::*;

pub type Result<T> = std::result::Result<T, EncoreError>;

#[derive(Debug, Error)]
pub enum EncoreError {
    /// A required field was missing or empty
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The encore system: songs catalog, request log, and the live session.
///
/// Everything reads and writes through one [Storage], selected at startup.
pub struct Encore {
    pub catalog: Catalog,
    pub requests: RequestLog,
    pub session: SessionManager,

    events: EventReceiver,
}

impl Encore {
    /// Wires up the system over the given storage, restoring the session
    /// state it left behind. A storage failure here should be treated as
    /// fatal by the caller.
    pub async fn new(storage: SharedStorage) -> std::result::Result<Self, StorageError> {
        let (sender, receiver) = crossbeam::channel::unbounded();

        let session = SessionManager::restore(storage.clone(), sender).await?;

        Ok(Self {
            catalog: Catalog::new(storage.clone()),
            requests: RequestLog::new(storage),
            session,
            events: receiver,
        })
    }

    /// The stream of events to fan out to connected clients.
    /// Intended for a single consumer.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }
}
