//! Point-in-time reads against the emitting contract.
//!
//! Several projection rules cannot be computed from the event payload alone
//! and re-read authoritative values from contract storage instead. Reads are
//! taken as of the call that emitted the event being projected.
//!
//! A [`LedgerReader`] is bound to one contract instance and passed into each
//! rule invocation explicitly. The core never holds a global handle on the
//! contract.

mod snapshot;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::VoteEvidenceFlags;

pub use snapshot::LedgerSnapshot;

/// Errors returned by a [`LedgerReader`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    /// The contract holds no bet under this ID.
    #[error("no bet record for bet id {bet_id}")]
    UnknownBet {
        /// The requested bet ID.
        bet_id: U256,
    },

    /// The dispute ID does not map to any bet.
    #[error("dispute {dispute_id} does not resolve to a bet")]
    UnknownDispute {
        /// The requested dispute ID.
        dispute_id: U256,
    },

    /// The ledger could not be queried at all.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Returns `true` for failures caused by an unresolvable identifier.
    #[must_use]
    pub const fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::UnknownBet { .. } | Self::UnknownDispute { .. })
    }
}

/// The full storage record of one bet, as returned by the contract's `bets`
/// getter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRecord {
    pub staking_deadline: U256,
    pub voting_deadline: U256,
    pub backer_stake: U256,
    pub creator_stake: U256,
    pub outcome: i32,
    pub state: i32,
    #[serde(default)]
    pub vote_evidence_bools: VoteEvidenceFlags,
    pub creator: Address,
    /// The zero address until a backer matches the bet.
    #[serde(default)]
    pub backer: Address,
    pub description: String,
    #[serde(default)]
    pub creator_bet_description: String,
}

/// Read access to one GambleBoard contract instance.
///
/// The per-field getters default to reading the full record; readers backed
/// by a live node should override them with the contract's dedicated
/// getters.
pub trait LedgerReader {
    /// Reads the full record of a bet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownBet`] if no bet exists under `bet_id`.
    fn bet_record(&self, bet_id: U256) -> Result<BetRecord, LedgerError>;

    /// Reads the current outcome code of a bet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownBet`] if no bet exists under `bet_id`.
    fn outcome(&self, bet_id: U256) -> Result<i32, LedgerError> {
        self.bet_record(bet_id).map(|record| record.outcome)
    }

    /// Reads the current lifecycle state of a bet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownBet`] if no bet exists under `bet_id`.
    fn state(&self, bet_id: U256) -> Result<i32, LedgerError> {
        self.bet_record(bet_id).map(|record| record.state)
    }

    /// Reads the current vote/evidence bits of a bet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownBet`] if no bet exists under `bet_id`.
    fn vote_evidence_bools(&self, bet_id: U256) -> Result<VoteEvidenceFlags, LedgerError> {
        self.bet_record(bet_id)
            .map(|record| record.vote_evidence_bools)
    }

    /// Resolves an arbitrator dispute ID to the disputed bet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownDispute`] if the dispute is not known.
    fn dispute_to_bet(&self, dispute_id: U256) -> Result<U256, LedgerError>;
}

impl<T: LedgerReader + ?Sized> LedgerReader for &T {
    fn bet_record(&self, bet_id: U256) -> Result<BetRecord, LedgerError> {
        (**self).bet_record(bet_id)
    }

    fn outcome(&self, bet_id: U256) -> Result<i32, LedgerError> {
        (**self).outcome(bet_id)
    }

    fn state(&self, bet_id: U256) -> Result<i32, LedgerError> {
        (**self).state(bet_id)
    }

    fn vote_evidence_bools(&self, bet_id: U256) -> Result<VoteEvidenceFlags, LedgerError> {
        (**self).vote_evidence_bools(bet_id)
    }

    fn dispute_to_bet(&self, dispute_id: U256) -> Result<U256, LedgerError> {
        (**self).dispute_to_bet(dispute_id)
    }
}
