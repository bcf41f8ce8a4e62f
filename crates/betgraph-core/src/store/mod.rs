//! Entity storage.
//!
//! The projection core depends on an [`EntityStore`] for two things: loading
//! prior entity state by key, and committing the [`WriteBatch`] produced by
//! one event atomically together with the dispatcher cursor.
//!
//! # Bet overlay contract
//!
//! Bet writes are [`BetPatch`]es, never full records. Every store must apply
//! a patch as a field-by-field overlay onto the stored bet (creating an empty
//! record first if none exists) and must leave fields the patch does not set
//! untouched. Stores with overwrite-by-default semantics have to merge before
//! writing. Event aggregates and leagues are written as complete records.

mod memory;
mod sqlite;

use thiserror::Error;

use crate::entity::{Bet, BetPatch, EventAggregate, League};
use crate::events::LogPosition;
use crate::keys::{BetKey, EventKey, LeagueKey};

pub use memory::InMemoryStore;
pub use sqlite::{SqliteEntityStore, StoreStats};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded.
    #[error("corrupt {table} row '{key}': {details}")]
    Corrupt {
        /// Table holding the row.
        table: &'static str,
        /// Key of the row.
        key: String,
        /// What failed to decode.
        details: String,
    },

    /// The store lock was poisoned by a panic in another thread.
    #[error("store lock poisoned")]
    Poisoned,
}

/// One entity write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityWrite {
    /// Overlay a patch onto the bet stored under `key`.
    Bet {
        /// Target bet.
        key: BetKey,
        /// Fields to set.
        patch: BetPatch,
    },

    /// Upsert a complete event aggregate.
    Event(EventAggregate),

    /// Upsert a complete league.
    League(League),
}

/// All writes produced by projecting one event, applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<EntityWrite>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a bet patch.
    pub fn put_bet(&mut self, key: BetKey, patch: BetPatch) {
        self.writes.push(EntityWrite::Bet { key, patch });
    }

    /// Queues an event aggregate upsert.
    pub fn put_event(&mut self, event: EventAggregate) {
        self.writes.push(EntityWrite::Event(event));
    }

    /// Queues a league upsert.
    pub fn put_league(&mut self, league: League) {
        self.writes.push(EntityWrite::League(league));
    }

    /// Returns the queued writes in order.
    #[must_use]
    pub fn writes(&self) -> &[EntityWrite] {
        &self.writes
    }

    /// Returns the number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// The dispatcher position to persist with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorUpdate<'a> {
    /// Cursor name, one per indexed contract.
    pub name: &'a str,
    /// Position of the event the batch was projected from.
    pub position: LogPosition,
}

/// Keyed storage for projected entities.
///
/// Implementations take `&self` and serialize writes internally. A store
/// performs no retries; every error is surfaced to the caller.
pub trait EntityStore {
    /// Loads a bet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_bet(&self, key: &BetKey) -> Result<Option<Bet>, StoreError>;

    /// Loads an event aggregate.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_event(&self, key: &EventKey) -> Result<Option<EventAggregate>, StoreError>;

    /// Loads a league.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_league(&self, key: &LeagueKey) -> Result<Option<League>, StoreError>;

    /// Applies every write in `batch` and, if given, advances the cursor.
    ///
    /// Either all writes and the cursor update become visible, or none do.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be committed.
    fn commit(&self, batch: &WriteBatch, cursor: Option<CursorUpdate<'_>>)
    -> Result<(), StoreError>;

    /// Returns the last committed position for a cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn cursor(&self, name: &str) -> Result<Option<LogPosition>, StoreError>;
}
