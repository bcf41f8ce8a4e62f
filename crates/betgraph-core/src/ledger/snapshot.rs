//! In-memory ledger reader.
//!
//! A [`LedgerSnapshot`] holds the contract reads that were valid for one
//! event. Recorded feeds attach a snapshot to every event so that a replay
//! observes exactly the state the emitting call saw. Tests use it as a
//! mutable stand-in for contract storage.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::{BetRecord, LedgerError, LedgerReader};

/// Bet records and dispute mappings of one contract at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Bet records by bet ID.
    #[serde(default)]
    pub bets: BTreeMap<U256, BetRecord>,

    /// Arbitrator dispute ID to bet ID.
    #[serde(default)]
    pub disputes: BTreeMap<U256, U256>,
}

impl LedgerSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bet record (builder pattern).
    #[must_use]
    pub fn with_bet(mut self, bet_id: U256, record: BetRecord) -> Self {
        self.bets.insert(bet_id, record);
        self
    }

    /// Adds a dispute mapping (builder pattern).
    #[must_use]
    pub fn with_dispute(mut self, dispute_id: U256, bet_id: U256) -> Self {
        self.disputes.insert(dispute_id, bet_id);
        self
    }

    /// Inserts or replaces a bet record.
    pub fn insert_bet(&mut self, bet_id: U256, record: BetRecord) {
        self.bets.insert(bet_id, record);
    }

    /// Inserts or replaces a dispute mapping.
    pub fn insert_dispute(&mut self, dispute_id: U256, bet_id: U256) {
        self.disputes.insert(dispute_id, bet_id);
    }

    /// Returns a mutable reference to a stored record.
    pub fn bet_mut(&mut self, bet_id: U256) -> Option<&mut BetRecord> {
        self.bets.get_mut(&bet_id)
    }
}

impl LedgerReader for LedgerSnapshot {
    fn bet_record(&self, bet_id: U256) -> Result<BetRecord, LedgerError> {
        self.bets
            .get(&bet_id)
            .cloned()
            .ok_or(LedgerError::UnknownBet { bet_id })
    }

    fn dispute_to_bet(&self, dispute_id: U256) -> Result<U256, LedgerError> {
        self.disputes
            .get(&dispute_id)
            .copied()
            .ok_or(LedgerError::UnknownDispute { dispute_id })
    }
}
