//! In-memory entity store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{CursorUpdate, EntityStore, EntityWrite, StoreError, WriteBatch};
use crate::entity::{Bet, EventAggregate, League};
use crate::events::LogPosition;
use crate::keys::{BetKey, EventKey, LeagueKey};

#[derive(Debug, Default)]
struct Tables {
    bets: BTreeMap<BetKey, Bet>,
    events: BTreeMap<EventKey, EventAggregate>,
    leagues: BTreeMap<LeagueKey, League>,
    cursors: BTreeMap<String, LogPosition>,
}

/// An [`EntityStore`] backed by ordered maps behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Returns every stored bet in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn bets(&self) -> Result<Vec<Bet>, StoreError> {
        Ok(self.lock()?.bets.values().cloned().collect())
    }

    /// Returns every stored event aggregate in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn events(&self) -> Result<Vec<EventAggregate>, StoreError> {
        Ok(self.lock()?.events.values().cloned().collect())
    }

    /// Returns every stored league in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn leagues(&self) -> Result<Vec<League>, StoreError> {
        Ok(self.lock()?.leagues.values().cloned().collect())
    }
}

impl EntityStore for InMemoryStore {
    fn load_bet(&self, key: &BetKey) -> Result<Option<Bet>, StoreError> {
        Ok(self.lock()?.bets.get(key).cloned())
    }

    fn load_event(&self, key: &EventKey) -> Result<Option<EventAggregate>, StoreError> {
        Ok(self.lock()?.events.get(key).cloned())
    }

    fn load_league(&self, key: &LeagueKey) -> Result<Option<League>, StoreError> {
        Ok(self.lock()?.leagues.get(key).cloned())
    }

    fn commit(
        &self,
        batch: &WriteBatch,
        cursor: Option<CursorUpdate<'_>>,
    ) -> Result<(), StoreError> {
        // Nothing below can fail once the lock is held.
        let mut tables = self.lock()?;

        for write in batch.writes() {
            match write {
                EntityWrite::Bet { key, patch } => {
                    tables
                        .bets
                        .entry(key.clone())
                        .or_insert_with(|| Bet::new(key.clone()))
                        .apply_patch(patch);
                },
                EntityWrite::Event(event) => {
                    tables.events.insert(event.id.clone(), event.clone());
                },
                EntityWrite::League(league) => {
                    tables.leagues.insert(league.id.clone(), league.clone());
                },
            }
        }

        if let Some(cursor) = cursor {
            tables
                .cursors
                .insert(cursor.name.to_string(), cursor.position);
        }

        Ok(())
    }

    fn cursor(&self, name: &str) -> Result<Option<LogPosition>, StoreError> {
        Ok(self.lock()?.cursors.get(name).copied())
    }
}
