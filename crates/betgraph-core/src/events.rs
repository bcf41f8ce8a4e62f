//! Decoded GambleBoard contract events.
//!
//! The contract emits its own bet lifecycle events plus the ERC-792
//! (`Ruling`) and ERC-1497 (`Dispute`, `Evidence`, `MetaEvidence`)
//! arbitration events. Field names follow the Solidity parameters without
//! their leading underscore.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// `BetCreated(uint256 betID, uint8 country, string league, uint8 category)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetCreated {
    pub bet_id: U256,
    pub country: i32,
    #[serde(default)]
    pub league: String,
    pub category: i32,
}

/// `BetPlaced(uint256 betID, uint8 state, address backer)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetPlaced {
    pub bet_id: U256,
    pub state: i32,
    pub backer: Address,
}

/// `BetRefund(uint256 betID, uint8 state, uint256 backerStake, uint256 creatorStake)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRefund {
    pub bet_id: U256,
    pub state: i32,
    pub backer_stake: U256,
    pub creator_stake: U256,
}

/// `BetStateChanged(uint256 betID, uint8 state)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetStateChanged {
    pub bet_id: U256,
    pub state: i32,
}

/// `BetVotedOn(uint256 betID)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetVotedOn {
    pub bet_id: U256,
}

/// `Ruling(address arbitrator, uint256 disputeID, uint256 ruling)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruling {
    #[serde(default)]
    pub arbitrator: Address,
    pub dispute_id: U256,
    pub ruling: U256,
}

/// `Dispute(address arbitrator, uint256 disputeID, uint256 metaEvidenceID, uint256 evidenceGroupID)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    #[serde(default)]
    pub arbitrator: Address,
    pub dispute_id: U256,
    #[serde(default)]
    pub meta_evidence_id: U256,
    pub evidence_group_id: U256,
}

/// `Evidence(address arbitrator, uint256 evidenceGroupID, address party, string evidence)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub arbitrator: Address,
    pub evidence_group_id: U256,
    #[serde(default)]
    pub party: Address,
    #[serde(default)]
    pub evidence: String,
}

/// `MetaEvidence(uint256 metaEvidenceID, string evidence)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEvidence {
    pub meta_evidence_id: U256,
    pub evidence: String,
}

/// Any event the projection handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    BetCreated(BetCreated),
    BetPlaced(BetPlaced),
    BetRefund(BetRefund),
    BetStateChanged(BetStateChanged),
    BetVotedOn(BetVotedOn),
    Ruling(Ruling),
    Dispute(Dispute),
    Evidence(Evidence),
    MetaEvidence(MetaEvidence),
}

impl LedgerEvent {
    /// Returns the event name as emitted by the contract.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BetCreated(_) => "BetCreated",
            Self::BetPlaced(_) => "BetPlaced",
            Self::BetRefund(_) => "BetRefund",
            Self::BetStateChanged(_) => "BetStateChanged",
            Self::BetVotedOn(_) => "BetVotedOn",
            Self::Ruling(_) => "Ruling",
            Self::Dispute(_) => "Dispute",
            Self::Evidence(_) => "Evidence",
            Self::MetaEvidence(_) => "MetaEvidence",
        }
    }
}

/// Position of a log entry in the chain: block number, then log index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl LogPosition {
    /// Creates a position.
    #[must_use]
    pub const fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// A decoded event together with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Where the log sits in the chain.
    pub position: LogPosition,

    /// Timestamp of the enclosing block, in unix seconds.
    pub block_timestamp: u64,

    /// Address of the emitting contract.
    pub contract: Address,

    /// The decoded event.
    pub event: LedgerEvent,
}

impl EventEnvelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(
        position: LogPosition,
        block_timestamp: u64,
        contract: Address,
        event: LedgerEvent,
    ) -> Self {
        Self {
            position,
            block_timestamp,
            contract,
            event,
        }
    }
}
