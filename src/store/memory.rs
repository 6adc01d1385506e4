//! In-process store.
//!
//! Documents sit behind one mutex, so every commit is serialized and
//! trivially atomic. Listeners are called after the lock is released;
//! a listener may read the store again without deadlocking.

use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{GameId, Snapshot};
use crate::error::StoreError;

use super::patch::{apply_commit, Guard, Patch};
use super::{GameStore, Listener, Subscription};

type ListenerTable = FxHashMap<u64, (GameId, Listener)>;

/// Thread-safe in-memory [`GameStore`].
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<FxHashMap<GameId, Snapshot>>,
    listeners: Arc<Mutex<ListenerTable>>,
    next_listener: AtomicU64,
    failures_pending: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with an I/O error.
    ///
    /// Simulates a flaky backend.
    pub fn fail_next_commits(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Export a game as bincode bytes.
    pub fn export(&self, game: &GameId) -> Result<Vec<u8>, StoreError> {
        Ok(self.read(game)?.to_bytes()?)
    }

    /// Import a game from bincode bytes, replacing any existing document.
    pub fn import(&self, game: &GameId, bytes: &[u8]) -> Result<(), StoreError> {
        let snapshot = Snapshot::from_bytes(bytes)?;
        self.documents()?.insert(game.clone(), snapshot);
        Ok(())
    }

    fn documents(&self) -> Result<MutexGuard<'_, FxHashMap<GameId, Snapshot>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Io("document lock poisoned".to_string()))
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn notify(&self, game: &GameId, snapshot: &Snapshot) {
        let targets: Vec<Listener> = match self.listeners.lock() {
            Ok(table) => table
                .values()
                .filter(|(id, _)| id == game)
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
            Err(_) => {
                tracing::warn!(%game, "listener table poisoned; change not broadcast");
                return;
            }
        };

        for listener in targets {
            listener(snapshot);
        }
    }
}

impl GameStore for MemoryStore {
    fn create(&self, game: &GameId, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut documents = self.documents()?;
        if documents.contains_key(game) {
            return Err(StoreError::GameExists(game.clone()));
        }
        documents.insert(game.clone(), snapshot);
        Ok(())
    }

    fn read(&self, game: &GameId) -> Result<Snapshot, StoreError> {
        self.documents()?
            .get(game)
            .cloned()
            .ok_or_else(|| StoreError::GameNotFound(game.clone()))
    }

    fn subscribe(&self, game: &GameId, on_change: Listener) -> Result<Subscription, StoreError> {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .map_err(|_| StoreError::Io("listener lock poisoned".to_string()))?
            .insert(id, (game.clone(), on_change));

        let table = Arc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(table) = table.upgrade() {
                if let Ok(mut table) = table.lock() {
                    table.remove(&id);
                }
            }
        }))
    }

    fn batch_commit(&self, game: &GameId, guards: &[Guard], patches: &[Patch]) -> Result<u64, StoreError> {
        if self.take_injected_failure() {
            return Err(StoreError::Io("injected commit failure".to_string()));
        }

        let committed = {
            let mut documents = self.documents()?;
            let current = documents
                .get(game)
                .ok_or_else(|| StoreError::GameNotFound(game.clone()))?;
            let next = apply_commit(current, guards, patches)?;
            documents.insert(game.clone(), next.clone());
            next
        };

        tracing::trace!(%game, revision = committed.revision, patches = patches.len(), "commit");
        self.notify(game, &committed);
        Ok(committed.revision)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}
