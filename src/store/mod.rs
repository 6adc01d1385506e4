//! Persistence adapter.
//!
//! The game document lives in a shared store that many player clients
//! write to. The engine only needs four things from it:
//!
//! - `read`: the latest snapshot
//! - `subscribe`: a callback on every committed change
//! - `patch`: field-scoped atomic operations (set, increment, append)
//! - `batch_commit`: many patches, all-or-nothing, behind guards
//!
//! [`MemoryStore`] implements the contract in process; a networked
//! backend implements [`GameStore`] the same way.
//!
//! ## Example
//!
//! ```
//! use nation_turns::core::{GameId, NationId, Nation, Snapshot};
//! use nation_turns::store::{Field, GameStore, MemoryStore, Patch};
//!
//! let store = MemoryStore::new();
//! let game = GameId::new("g1");
//!
//! let mut snapshot = Snapshot::new(7);
//! snapshot.nations.insert(NationId::new("Avalon"), Nation::new("Avalon", 100, 50));
//! store.create(&game, snapshot).unwrap();
//!
//! store
//!     .patch(&game, &[Patch::increment(Field::NationResources(NationId::new("Avalon")), 25)])
//!     .unwrap();
//!
//! let latest = store.read(&game).unwrap();
//! assert_eq!(latest.nation(&NationId::new("Avalon")).unwrap().resources, 125);
//! assert_eq!(latest.revision, 1);
//! ```

mod memory;
mod patch;

pub use memory::MemoryStore;
pub use patch::{apply_commit, read_int, Field, Guard, Op, Patch, Value};

use std::sync::Arc;

use crate::core::{GameId, Snapshot};
use crate::error::StoreError;

/// Change callback, invoked with the freshly committed snapshot.
pub type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Handle returned by [`GameStore::subscribe`].
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the store-specific cancellation.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving changes.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Shared document store.
///
/// Implementations must apply each commit atomically: either every guard
/// holds and every patch lands (and the revision is bumped), or nothing
/// changes.
pub trait GameStore: Send + Sync {
    /// Create a new game document.
    fn create(&self, game: &GameId, snapshot: Snapshot) -> Result<(), StoreError>;

    /// Read the latest committed snapshot.
    fn read(&self, game: &GameId) -> Result<Snapshot, StoreError>;

    /// Register a change callback.
    fn subscribe(&self, game: &GameId, on_change: Listener) -> Result<Subscription, StoreError>;

    /// Commit patches atomically behind guards.
    ///
    /// Returns the new revision.
    fn batch_commit(&self, game: &GameId, guards: &[Guard], patches: &[Patch]) -> Result<u64, StoreError>;

    /// Commit independent field patches with no preconditions.
    fn patch(&self, game: &GameId, patches: &[Patch]) -> Result<u64, StoreError> {
        self.batch_commit(game, &[], patches)
    }
}

impl<S: GameStore + ?Sized> GameStore for Arc<S> {
    fn create(&self, game: &GameId, snapshot: Snapshot) -> Result<(), StoreError> {
        (**self).create(game, snapshot)
    }

    fn read(&self, game: &GameId) -> Result<Snapshot, StoreError> {
        (**self).read(game)
    }

    fn subscribe(&self, game: &GameId, on_change: Listener) -> Result<Subscription, StoreError> {
        (**self).subscribe(game, on_change)
    }

    fn batch_commit(&self, game: &GameId, guards: &[Guard], patches: &[Patch]) -> Result<u64, StoreError> {
        (**self).batch_commit(game, guards, patches)
    }
}
