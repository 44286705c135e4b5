use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{
    EncoreEvent, EventSender, PrimaryKey, QueueEntryData, SessionData, SharedStorage, StorageError,
};

/// Owns the one global session: the FIFO queue and the current song.
///
/// All mutations go through the async mutex, so concurrent gateway messages
/// apply one at a time. Each mutation persists the new state synchronously
/// and then emits exactly one full-snapshot event. A failed persistence
/// write is logged and never rolls back the in-memory state, so storage can
/// diverge until the next successful write. Known limitation, acceptable at
/// this scale.
pub struct SessionManager {
    storage: SharedStorage,
    state: Mutex<SessionData>,
    qr_visible: AtomicBool,
    events: EventSender,
}

impl SessionManager {
    /// Restores the session from storage. Failing to load here is fatal to
    /// the caller, unlike the best-effort writes later on.
    pub async fn restore(storage: SharedStorage, events: EventSender) -> Result<Self, StorageError> {
        let state = storage.load_session().await?;
        let qr_visible = storage.load_qr_visibility().await?;

        Ok(Self {
            storage,
            state: Mutex::new(state),
            qr_visible: AtomicBool::new(qr_visible),
            events,
        })
    }

    /// The latest full snapshot, as sent to newly connecting clients
    pub async fn current_state(&self) -> SessionData {
        self.state.lock().await.clone()
    }

    pub fn qr_visible(&self) -> bool {
        self.qr_visible.load(Ordering::Relaxed)
    }

    /// Snapshots the song behind `song_id` into a new entry at the tail of
    /// the queue. An unknown id is dropped silently, nothing is broadcast.
    ///
    /// When nothing is currently playing, the head of the queue is promoted
    /// within this same operation, so enqueueing into an empty session makes
    /// the new entry the current song immediately.
    pub async fn enqueue(&self, song_id: PrimaryKey, requested_by: &str) {
        let song = match self.storage.song_by_id(song_id).await {
            Ok(song) => song,
            Err(StorageError::NotFound { .. }) => {
                debug!("Ignoring enqueue of unknown song {}", song_id);
                return;
            }
            Err(e) => {
                warn!("Failed to look up song {}: {}", song_id, e);
                return;
            }
        };

        let mut state = self.state.lock().await;

        let entry = QueueEntryData {
            id: next_entry_id(&state),
            song,
            requested_by: requested_by.to_string(),
        };

        state.queue.push(entry);
        promote_head(&mut state);

        self.commit(&state).await;
    }

    /// Pops the head of the queue into the current song. With an empty
    /// queue, the current song becomes empty.
    pub async fn advance(&self) {
        let mut state = self.state.lock().await;

        state.current_song = if state.queue.is_empty() {
            None
        } else {
            Some(state.queue.remove(0))
        };

        self.commit(&state).await;
    }

    /// Removes an entry from the pending queue by id. Unknown ids are a
    /// no-op, but the snapshot is still broadcast.
    ///
    /// This never touches the current song, even when its id matches:
    /// removal only targets what is still waiting. Skipping what is playing
    /// is what `advance` is for.
    pub async fn remove_entry(&self, entry_id: i64) {
        let mut state = self.state.lock().await;

        state.queue.retain(|entry| entry.id != entry_id);
        promote_head(&mut state);

        self.commit(&state).await;
    }

    /// Empties the queue and clears the current song unconditionally
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;

        *state = SessionData::default();

        self.commit(&state).await;
    }

    /// Toggles whether the display screen shows the join QR code.
    /// Only the SQLite backend actually persists the flag.
    pub async fn set_qr_visible(&self, visible: bool) {
        self.qr_visible.store(visible, Ordering::Relaxed);

        if let Err(e) = self.storage.save_qr_visibility(visible).await {
            warn!("Failed to persist QR visibility: {}", e);
        }

        let _ = self.events.send(EncoreEvent::QrVisibility { visible });
    }

    /// Persist, then broadcast. The write is best-effort: on failure the
    /// in-memory state stays authoritative and the snapshot still goes out.
    async fn commit(&self, state: &SessionData) {
        if let Err(e) = self.storage.save_session(state).await {
            warn!("Failed to persist session state: {}", e);
        }

        let _ = self.events.send(EncoreEvent::StateUpdate {
            new_state: state.clone(),
        });
    }
}

/// If nothing is playing but the queue has entries, move the head up.
/// Runs opportunistically on queue mutations, which also repairs a stored
/// session that was persisted in that in-between shape.
fn promote_head(state: &mut SessionData) {
    if state.current_song.is_none() && !state.queue.is_empty() {
        state.current_song = Some(state.queue.remove(0));
    }
}

/// Entry ids are derived from the wall clock, bumped past anything already
/// in the session so two enqueues within the same millisecond stay unique.
fn next_entry_id(state: &SessionData) -> i64 {
    let mut candidate = Utc::now().timestamp_millis();

    let taken = |id: i64, state: &SessionData| {
        state.queue.iter().any(|e| e.id == id)
            || state.current_song.as_ref().is_some_and(|e| e.id == id)
    };

    while taken(candidate, state) {
        candidate += 1;
    }

    candidate
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crossbeam::channel::unbounded;

    use super::*;
    use crate::test_util::temp_dir;
    use crate::{EventReceiver, FileStorage, NewSong, Storage};

    async fn setup(titles: &[&str]) -> (SessionManager, EventReceiver, SharedStorage, Vec<PrimaryKey>) {
        let storage: SharedStorage = Arc::new(FileStorage::new(temp_dir()).await.unwrap());
        let mut song_ids = vec![];

        for title in titles {
            let song = storage
                .create_song(NewSong {
                    title: title.to_string(),
                    artist: "Various".to_string(),
                    youtube: None,
                    category: None,
                    favorite: false,
                    key: 0,
                })
                .await
                .unwrap();

            song_ids.push(song.id);
        }

        let (sender, receiver) = unbounded();
        let session = SessionManager::restore(storage.clone(), sender)
            .await
            .unwrap();

        (session, receiver, storage, song_ids)
    }

    fn drain(receiver: &EventReceiver) -> Vec<EncoreEvent> {
        receiver.try_iter().collect()
    }

    #[tokio::test]
    async fn enqueue_into_empty_session_promotes_immediately() {
        let (session, _events, _storage, songs) = setup(&["Respect"]).await;

        session.enqueue(songs[0], "Aretha").await;

        let state = session.current_state().await;
        let current = state.current_song.expect("a current song is set");

        assert_eq!(current.song.title, "Respect");
        assert_eq!(current.requested_by, "Aretha");
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn enqueue_appends_when_something_is_playing() {
        let (session, _events, _storage, songs) = setup(&["Respect", "Proud Mary"]).await;

        session.enqueue(songs[0], "Aretha").await;
        session.enqueue(songs[1], "Tina").await;

        let state = session.current_state().await;

        assert_eq!(state.current_song.unwrap().song.title, "Respect");
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.queue[0].song.title, "Proud Mary");
    }

    #[tokio::test]
    async fn advance_pops_exactly_the_head() {
        let (session, _events, _storage, songs) = setup(&["One", "Two", "Three"]).await;

        session.enqueue(songs[0], "a").await;
        session.enqueue(songs[1], "b").await;
        session.enqueue(songs[2], "c").await;

        session.advance().await;

        let state = session.current_state().await;
        assert_eq!(state.current_song.unwrap().song.title, "Two");
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.queue[0].song.title, "Three");

        session.advance().await;
        session.advance().await;

        let state = session.current_state().await;
        assert_eq!(state.current_song, None);
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn remove_entry_never_touches_the_current_song() {
        let (session, _events, _storage, songs) = setup(&["One", "Two"]).await;

        session.enqueue(songs[0], "a").await;
        session.enqueue(songs[1], "b").await;

        let state = session.current_state().await;
        let current_id = state.current_song.as_ref().unwrap().id;
        let queued_id = state.queue[0].id;

        // Removing the current song's id changes nothing
        session.remove_entry(current_id).await;
        assert_eq!(session.current_state().await, state);

        // Removing a queued id only drops that entry
        session.remove_entry(queued_id).await;

        let state = session.current_state().await;
        assert_eq!(state.current_song.unwrap().id, current_id);
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn clear_always_yields_the_empty_session() {
        let (session, _events, _storage, songs) = setup(&["One", "Two"]).await;

        session.enqueue(songs[0], "a").await;
        session.enqueue(songs[1], "b").await;
        session.clear().await;

        assert_eq!(session.current_state().await, SessionData::default());

        // Clearing an already empty session is fine too
        session.clear().await;
        assert_eq!(session.current_state().await, SessionData::default());
    }

    #[tokio::test]
    async fn unknown_song_id_is_dropped_without_a_broadcast() {
        let (session, events, _storage, _songs) = setup(&[]).await;

        session.enqueue(999, "nobody").await;

        assert_eq!(session.current_state().await, SessionData::default());
        assert!(drain(&events).is_empty());
    }

    #[tokio::test]
    async fn every_mutation_broadcasts_exactly_one_snapshot() {
        let (session, events, _storage, songs) = setup(&["One"]).await;

        session.enqueue(songs[0], "a").await;
        session.advance().await;
        session.remove_entry(123).await;
        session.clear().await;

        let broadcasts = drain(&events);
        assert_eq!(broadcasts.len(), 4);

        assert!(broadcasts
            .iter()
            .all(|e| matches!(e, EncoreEvent::StateUpdate { .. })));
    }

    #[tokio::test]
    async fn qr_toggle_broadcasts_its_own_event() {
        let (session, events, _storage, _songs) = setup(&[]).await;

        assert!(!session.qr_visible());

        session.set_qr_visible(true).await;

        assert!(session.qr_visible());
        assert!(matches!(
            drain(&events).as_slice(),
            [EncoreEvent::QrVisibility { visible: true }]
        ));
    }

    #[tokio::test]
    async fn state_survives_a_restart() {
        let (session, _events, storage, songs) = setup(&["One", "Two"]).await;

        session.enqueue(songs[0], "a").await;
        session.enqueue(songs[1], "b").await;

        let before = session.current_state().await;

        let (sender, _receiver) = unbounded();
        let restored = SessionManager::restore(storage, sender).await.unwrap();

        assert_eq!(restored.current_state().await, before);
    }

    #[tokio::test]
    async fn idle_current_song_is_repaired_on_the_next_mutation() {
        let (session, _events, storage, songs) = setup(&["One"]).await;

        session.enqueue(songs[0], "a").await;

        // Persist a session that was stored in the in-between shape:
        // nothing playing, but the queue has an entry
        let entry = session.current_state().await.current_song.unwrap();
        storage
            .save_session(&SessionData {
                queue: vec![entry.clone()],
                current_song: None,
            })
            .await
            .unwrap();

        let (sender, _receiver) = unbounded();
        let restored = SessionManager::restore(storage, sender).await.unwrap();

        restored.remove_entry(-1).await;

        let state = restored.current_state().await;
        assert_eq!(state.current_song, Some(entry));
        assert!(state.queue.is_empty());
    }
}
