//! Projected entity types.
//!
//! A stored [`Bet`] is the fold of every [`BetPatch`] written for its key.
//! All bet fields are optional in storage because partial updates may reach
//! the store before the creation event (meta-evidence is emitted by the
//! contract ahead of `BetCreated`) or without it.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::keys::{BetKey, EventKey, LeagueKey};
use crate::ledger::BetRecord;

/// Vote and evidence status bits kept by the contract for each bet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteEvidenceFlags(pub u8);

impl VoteEvidenceFlags {
    /// Returns the raw bit field.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns whether bit `index` (0 = least significant) is set.
    #[must_use]
    pub const fn is_set(self, index: u8) -> bool {
        index < 8 && self.0 & (1 << index) != 0
    }
}

/// A wager as currently known to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    /// Store key derived from the ledger bet ID.
    pub id: BetKey,
    pub staking_deadline: Option<U256>,
    pub voting_deadline: Option<U256>,
    pub backer_stake: Option<U256>,
    pub creator_stake: Option<U256>,
    pub outcome: Option<i32>,
    pub state: Option<i32>,
    pub vote_evidence_bools: Option<VoteEvidenceFlags>,
    pub creator: Option<Address>,
    /// Absent until the bet is matched.
    pub backer: Option<Address>,
    pub description: Option<String>,
    pub creator_bet_description: Option<String>,
    pub country: Option<i32>,
    pub league: Option<String>,
    pub category: Option<i32>,
    /// Set once a dispute is raised.
    #[serde(rename = "disputeID")]
    pub dispute_id: Option<U256>,
    pub meta_evidence: Option<String>,
    /// Unix seconds of the creation event.
    pub time_created: Option<u64>,
    /// Unix seconds of the latest event that wrote this field.
    pub time_updated: Option<u64>,
}

impl Bet {
    /// Creates an empty record for `id`.
    #[must_use]
    pub fn new(id: BetKey) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Overlays every field set in `patch` onto this record.
    ///
    /// Fields the patch leaves unset keep their stored value.
    pub fn apply_patch(&mut self, patch: &BetPatch) {
        fn overlay<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }

        overlay(&mut self.staking_deadline, patch.staking_deadline.as_ref());
        overlay(&mut self.voting_deadline, patch.voting_deadline.as_ref());
        overlay(&mut self.backer_stake, patch.backer_stake.as_ref());
        overlay(&mut self.creator_stake, patch.creator_stake.as_ref());
        overlay(&mut self.outcome, patch.outcome.as_ref());
        overlay(&mut self.state, patch.state.as_ref());
        overlay(&mut self.vote_evidence_bools, patch.vote_evidence_bools.as_ref());
        overlay(&mut self.creator, patch.creator.as_ref());
        overlay(&mut self.backer, patch.backer.as_ref());
        overlay(&mut self.description, patch.description.as_ref());
        overlay(
            &mut self.creator_bet_description,
            patch.creator_bet_description.as_ref(),
        );
        overlay(&mut self.country, patch.country.as_ref());
        overlay(&mut self.league, patch.league.as_ref());
        overlay(&mut self.category, patch.category.as_ref());
        overlay(&mut self.dispute_id, patch.dispute_id.as_ref());
        overlay(&mut self.meta_evidence, patch.meta_evidence.as_ref());
        overlay(&mut self.time_created, patch.time_created.as_ref());
        overlay(&mut self.time_updated, patch.time_updated.as_ref());
    }
}

/// A sparse bet update.
///
/// Each projection rule builds its patch through the constructor named after
/// its event kind, so a rule can only write the fields that event
/// communicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetPatch {
    pub staking_deadline: Option<U256>,
    pub voting_deadline: Option<U256>,
    pub backer_stake: Option<U256>,
    pub creator_stake: Option<U256>,
    pub outcome: Option<i32>,
    pub state: Option<i32>,
    pub vote_evidence_bools: Option<VoteEvidenceFlags>,
    pub creator: Option<Address>,
    pub backer: Option<Address>,
    pub description: Option<String>,
    pub creator_bet_description: Option<String>,
    pub country: Option<i32>,
    pub league: Option<String>,
    pub category: Option<i32>,
    pub dispute_id: Option<U256>,
    pub meta_evidence: Option<String>,
    pub time_created: Option<u64>,
    pub time_updated: Option<u64>,
}

impl BetPatch {
    /// Initial snapshot of a newly created bet.
    ///
    /// Every contract-held field comes from `record`; the classification
    /// fields come from the creation event. A zero backer address means the
    /// bet is still unmatched and leaves `backer` unset.
    #[must_use]
    pub fn created(
        record: &BetRecord,
        country: i32,
        league: &str,
        category: i32,
        timestamp: u64,
    ) -> Self {
        Self {
            staking_deadline: Some(record.staking_deadline),
            voting_deadline: Some(record.voting_deadline),
            backer_stake: Some(record.backer_stake),
            creator_stake: Some(record.creator_stake),
            outcome: Some(record.outcome),
            state: Some(record.state),
            vote_evidence_bools: Some(record.vote_evidence_bools),
            creator: Some(record.creator),
            backer: (!record.backer.is_zero()).then_some(record.backer),
            description: Some(record.description.clone()),
            creator_bet_description: Some(record.creator_bet_description.clone()),
            country: Some(country),
            league: Some(league.to_string()),
            category: Some(category),
            time_created: Some(timestamp),
            time_updated: Some(timestamp),
            ..Self::default()
        }
    }

    /// A backer matched the bet.
    #[must_use]
    pub fn placement(state: i32, backer: Address, timestamp: u64) -> Self {
        Self {
            state: Some(state),
            backer: Some(backer),
            time_updated: Some(timestamp),
            ..Self::default()
        }
    }

    /// Stakes were returned.
    #[must_use]
    pub fn refund(state: i32, backer_stake: U256, creator_stake: U256, timestamp: u64) -> Self {
        Self {
            state: Some(state),
            backer_stake: Some(backer_stake),
            creator_stake: Some(creator_stake),
            time_updated: Some(timestamp),
            ..Self::default()
        }
    }

    /// The lifecycle state moved.
    #[must_use]
    pub fn state_change(state: i32, timestamp: u64) -> Self {
        Self {
            state: Some(state),
            time_updated: Some(timestamp),
            ..Self::default()
        }
    }

    /// Outcome, state and vote/evidence bits re-read from the ledger.
    ///
    /// Shared by the voted-on and evidence rules.
    #[must_use]
    pub fn read_through(
        outcome: i32,
        state: i32,
        vote_evidence_bools: VoteEvidenceFlags,
        timestamp: u64,
    ) -> Self {
        Self {
            outcome: Some(outcome),
            state: Some(state),
            vote_evidence_bools: Some(vote_evidence_bools),
            time_updated: Some(timestamp),
            ..Self::default()
        }
    }

    /// The arbitrator ruled. Carries no timestamp.
    #[must_use]
    pub fn ruling(state: i32, outcome: i32) -> Self {
        Self {
            state: Some(state),
            outcome: Some(outcome),
            ..Self::default()
        }
    }

    /// A dispute was raised.
    #[must_use]
    pub fn dispute(record: &BetRecord, dispute_id: U256, timestamp: u64) -> Self {
        Self {
            state: Some(record.state),
            backer_stake: Some(record.backer_stake),
            creator_stake: Some(record.creator_stake),
            dispute_id: Some(dispute_id),
            time_updated: Some(timestamp),
            ..Self::default()
        }
    }

    /// Free-form meta-evidence attached to the record. Carries no timestamp.
    #[must_use]
    pub fn meta_evidence(evidence: &str) -> Self {
        Self {
            meta_evidence: Some(evidence.to_string()),
            ..Self::default()
        }
    }

    /// Returns `true` if the patch sets no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Bets grouped by description, country and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAggregate {
    pub id: EventKey,
    pub description: String,
    /// Earliest staking deadline among member bets. Never increases.
    pub start_time: U256,
    pub country: i32,
    pub league: String,
    pub category: i32,
    /// Member bet IDs in creation order. Not deduplicated.
    #[serde(rename = "betIDs")]
    pub bet_ids: Vec<U256>,
}

impl EventAggregate {
    /// Creates an aggregate with no member bets.
    #[must_use]
    pub fn new(
        id: EventKey,
        description: impl Into<String>,
        start_time: U256,
        country: i32,
        league: impl Into<String>,
        category: i32,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            start_time,
            country,
            league: league.into(),
            category,
            bet_ids: Vec::new(),
        }
    }

    /// Lowers `start_time` to `staking_deadline` if it is strictly earlier.
    pub fn observe_staking_deadline(&mut self, staking_deadline: U256) {
        if staking_deadline < self.start_time {
            self.start_time = staking_deadline;
        }
    }
}

/// A country, category and league-name triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueKey,
    pub league: String,
    pub category: i32,
    pub country: i32,
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn record() -> BetRecord {
        BetRecord {
            staking_deadline: U256::from(1000u64),
            voting_deadline: U256::from(2000u64),
            backer_stake: U256::from(5u64),
            creator_stake: U256::from(7u64),
            outcome: 0,
            state: 1,
            vote_evidence_bools: VoteEvidenceFlags(0),
            creator: Address::repeat_byte(0xaa),
            backer: Address::ZERO,
            description: "Derby".to_string(),
            creator_bet_description: "Home wins".to_string(),
        }
    }

    #[test]
    fn test_flags_bits() {
        let flags = VoteEvidenceFlags(0b0000_0101);
        assert!(flags.is_set(0));
        assert!(!flags.is_set(1));
        assert!(flags.is_set(2));
        assert!(!flags.is_set(9));
        assert_eq!(flags.bits(), 5);
    }

    #[test]
    fn test_created_patch_leaves_zero_backer_unset() {
        let patch = BetPatch::created(&record(), 1, "", 2, 50);
        assert_eq!(patch.backer, None);
        assert_eq!(patch.creator, Some(Address::repeat_byte(0xaa)));
        assert_eq!(patch.time_created, Some(50));
        assert_eq!(patch.time_updated, Some(50));
        assert_eq!(patch.dispute_id, None);
        assert_eq!(patch.meta_evidence, None);
    }

    #[test]
    fn test_apply_patch_keeps_unset_fields() {
        let mut bet = Bet::new(BetKey::from_id(U256::from(1u64)));
        bet.apply_patch(&BetPatch::created(&record(), 1, "Premier", 2, 50));
        bet.apply_patch(&BetPatch::meta_evidence("/ipfs/meta"));
        bet.apply_patch(&BetPatch::placement(2, Address::repeat_byte(0xbb), 60));

        assert_eq!(bet.state, Some(2));
        assert_eq!(bet.backer, Some(Address::repeat_byte(0xbb)));
        assert_eq!(bet.time_created, Some(50));
        assert_eq!(bet.time_updated, Some(60));
        assert_eq!(bet.description.as_deref(), Some("Derby"));
        assert_eq!(bet.meta_evidence.as_deref(), Some("/ipfs/meta"));
        assert_eq!(bet.creator_stake, Some(U256::from(7u64)));
    }

    #[test]
    fn test_patch_constructors_set_only_their_fields() {
        let ruling = BetPatch::ruling(4, 2);
        assert_eq!(
            ruling,
            BetPatch {
                state: Some(4),
                outcome: Some(2),
                ..BetPatch::default()
            }
        );
        assert!(BetPatch::default().is_empty());
        assert!(!BetPatch::state_change(1, 10).is_empty());
    }

    #[test]
    fn test_observe_staking_deadline_only_lowers() {
        let mut agg = EventAggregate::new(
            EventKey::new("Derby12"),
            "Derby",
            U256::from(1000u64),
            1,
            "",
            2,
        );
        agg.observe_staking_deadline(U256::from(1500u64));
        assert_eq!(agg.start_time, U256::from(1000u64));
        agg.observe_staking_deadline(U256::from(1000u64));
        assert_eq!(agg.start_time, U256::from(1000u64));
        agg.observe_staking_deadline(U256::from(500u64));
        assert_eq!(agg.start_time, U256::from(500u64));
    }
}
