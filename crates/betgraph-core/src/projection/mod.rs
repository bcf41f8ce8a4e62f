//! Event-to-entity projection.
//!
//! Each contract event kind maps to exactly one rule. A rule is a pure
//! function of the event payload, the block timestamp, point-in-time ledger
//! reads and previously stored aggregate state, and returns the
//! [`WriteBatch`] to commit.
//!
//! # Rule summary
//!
//! | Event             | Writes                                              |
//! |-------------------|-----------------------------------------------------|
//! | `BetCreated`      | full bet snapshot, event aggregate, league          |
//! | `BetPlaced`       | state, backer, timeUpdated                          |
//! | `BetRefund`       | state, stakes, timeUpdated                          |
//! | `BetStateChanged` | state, timeUpdated                                  |
//! | `BetVotedOn`      | outcome, state, flags (from ledger), timeUpdated    |
//! | `Ruling`          | state (from ledger), outcome (from event)           |
//! | `Dispute`         | state, stakes (from ledger), disputeID, timeUpdated |
//! | `Evidence`        | outcome, state, flags (from ledger), timeUpdated    |
//! | `MetaEvidence`    | metaEvidence                                        |
//!
//! # Identifier assumptions
//!
//! `Dispute` and `Evidence` carry an ERC-1497 evidence group ID rather than a
//! bet ID. GambleBoard uses the bet ID as the evidence group ID, and the
//! rules rely on that. `MetaEvidence` is keyed by its meta-evidence ID, which
//! the contract likewise sets to the bet ID.
//!
//! `Ruling` does not write `timeUpdated`; stored bets keep the timestamp of
//! the event before the ruling.
//!
//! # Atomicity
//!
//! Rules perform every ledger read before producing any write, and they
//! never commit themselves. A failed read therefore discards the whole
//! event.

mod rules;


use thiserror::Error;
use tracing::trace;

use crate::events::{EventEnvelope, LedgerEvent};
use crate::keys::KeyScheme;
use crate::ledger::{LedgerError, LedgerReader};
use crate::store::{EntityStore, StoreError, WriteBatch};

/// Errors that abort the projection of one event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProjectionError {
    /// A required ledger read could not be resolved.
    #[error("ledger lookup failed: {0}")]
    Lookup(#[from] LedgerError),

    /// Prior entity state could not be loaded.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The event payload cannot be represented in the entity model.
    #[error("invalid {event} payload: {details}")]
    InvalidPayload {
        /// Event name.
        event: &'static str,
        /// What was wrong with it.
        details: String,
    },
}

/// Everything a rule may consult while projecting one event.
pub(crate) struct RuleContext<'a> {
    pub block_timestamp: u64,
    pub ledger: &'a dyn LedgerReader,
    pub store: &'a dyn EntityStore,
    pub keys: KeyScheme,
}

/// Dispatches events to their projection rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Projector {
    keys: KeyScheme,
}

impl Projector {
    /// Creates a projector deriving aggregate keys with `keys`.
    #[must_use]
    pub const fn new(keys: KeyScheme) -> Self {
        Self { keys }
    }

    /// Returns the key scheme in use.
    #[must_use]
    pub const fn key_scheme(&self) -> KeyScheme {
        self.keys
    }

    /// Projects one event into a write batch.
    ///
    /// `ledger` must be bound to the contract that emitted the event and
    /// reflect its state as of the emitting call. Nothing is written to
    /// `store`; the caller commits the returned batch.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Lookup`] if a required ledger read fails,
    /// [`ProjectionError::Store`] if prior state cannot be loaded, and
    /// [`ProjectionError::InvalidPayload`] for a ruling outside the `i32`
    /// range.
    pub fn project(
        &self,
        envelope: &EventEnvelope,
        ledger: &dyn LedgerReader,
        store: &dyn EntityStore,
    ) -> Result<WriteBatch, ProjectionError> {
        let ctx = RuleContext {
            block_timestamp: envelope.block_timestamp,
            ledger,
            store,
            keys: self.keys,
        };

        trace!(
            position = %envelope.position,
            event = envelope.event.name(),
            "projecting event"
        );

        match &envelope.event {
            LedgerEvent::BetCreated(event) => rules::bet_created(event, &ctx),
            LedgerEvent::BetPlaced(event) => Ok(rules::bet_placed(event, &ctx)),
            LedgerEvent::BetRefund(event) => Ok(rules::bet_refund(event, &ctx)),
            LedgerEvent::BetStateChanged(event) => Ok(rules::bet_state_changed(event, &ctx)),
            LedgerEvent::BetVotedOn(event) => rules::bet_voted_on(event, &ctx),
            LedgerEvent::Ruling(event) => rules::ruling(event, &ctx),
            LedgerEvent::Dispute(event) => rules::dispute(event, &ctx),
            LedgerEvent::Evidence(event) => rules::evidence(event, &ctx),
            LedgerEvent::MetaEvidence(event) => Ok(rules::meta_evidence(event)),
        }
    }
}
