//! Projection runner for delivering events to the projector.
//!
//! The runner delivers envelopes in ledger order, commits each write batch
//! together with the cursor position of its event, and resumes from the
//! stored cursor on the next run. Envelopes at or before the cursor are
//! skipped, so a redelivered prefix of the log is harmless.

use alloy_primitives::Address;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventEnvelope, LogPosition};
use crate::feed::FeedError;
use crate::keys::KeyScheme;
use crate::ledger::LedgerReader;
use crate::projection::{ProjectionError, Projector};
use crate::store::{CursorUpdate, EntityStore, StoreError};

/// Errors that can occur while running the projection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// An event could not be projected. Nothing was written for it.
    #[error("failed to project {event} at {position}: {source}")]
    Projection {
        /// Position of the failing event.
        position: LogPosition,
        /// Name of the failing event.
        event: &'static str,
        /// Underlying failure.
        #[source]
        source: ProjectionError,
    },

    /// Error from the entity store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error reading the event feed.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Configuration for the projection runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Cursor name under which progress is recorded.
    pub name: String,

    /// Only envelopes emitted by this contract are projected when set.
    pub contract: Option<Address>,

    /// Envelopes from blocks before this one are ignored.
    pub start_block: u64,

    /// Key scheme for event aggregates and leagues.
    pub key_scheme: KeyScheme,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "gambleboard".to_string(),
            contract: None,
            start_block: 0,
            key_scheme: KeyScheme::default(),
        }
    }
}

/// Why an envelope was not projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The envelope is at or before the stored cursor.
    AlreadyApplied,
    /// The envelope was emitted by another contract.
    ForeignContract,
    /// The envelope precedes the configured start block.
    BeforeStartBlock,
}

/// Outcome of delivering one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event was projected and committed.
    Projected {
        /// Number of entity writes in the committed batch.
        writes: usize,
    },
    /// The event was skipped.
    Skipped(SkipReason),
}

/// Result of running a feed to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Position of the last projected event, or the resume cursor if none
    /// was projected.
    pub last_position: Option<LogPosition>,

    /// Number of events projected in this run.
    pub events_processed: u64,

    /// Number of envelopes skipped in this run.
    pub events_skipped: u64,

    /// Whether a stored cursor existed when the run started.
    pub resumed_from_cursor: bool,
}

/// Runs the projector over envelopes with cursor support.
pub struct ProjectionRunner<'a, S> {
    store: &'a S,
    projector: Projector,
    config: RunnerConfig,
}

impl<'a, S: EntityStore> ProjectionRunner<'a, S> {
    /// Creates a new runner with the default configuration.
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, RunnerConfig::default())
    }

    /// Creates a new runner with custom configuration.
    #[must_use]
    pub const fn with_config(store: &'a S, config: RunnerConfig) -> Self {
        Self {
            store,
            projector: Projector::new(config.key_scheme),
            config,
        }
    }

    /// Returns the runner configuration.
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns the stored cursor for this runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn cursor(&self) -> Result<Option<LogPosition>, StoreError> {
        self.store.cursor(&self.config.name)
    }

    fn skip_reason(
        &self,
        envelope: &EventEnvelope,
        cursor: Option<LogPosition>,
    ) -> Option<SkipReason> {
        if self
            .config
            .contract
            .is_some_and(|contract| contract != envelope.contract)
        {
            return Some(SkipReason::ForeignContract);
        }
        if envelope.position.block_number < self.config.start_block {
            return Some(SkipReason::BeforeStartBlock);
        }
        if cursor.is_some_and(|cursor| envelope.position <= cursor) {
            return Some(SkipReason::AlreadyApplied);
        }
        None
    }

    /// Delivers one envelope.
    ///
    /// `ledger` must answer reads as of the call that emitted the event. The
    /// write batch and the new cursor position are committed atomically.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Projection`] if the rule fails, in which case
    /// neither entities nor the cursor change, and [`RunnerError::Store`] if
    /// the commit fails.
    pub fn apply(
        &self,
        envelope: &EventEnvelope,
        ledger: &dyn LedgerReader,
    ) -> Result<Applied, RunnerError> {
        let cursor = self.cursor()?;
        if let Some(reason) = self.skip_reason(envelope, cursor) {
            debug!(
                position = %envelope.position,
                event = envelope.event.name(),
                reason = ?reason,
                "skipping envelope"
            );
            return Ok(Applied::Skipped(reason));
        }

        let batch = self
            .projector
            .project(envelope, ledger, self.store)
            .map_err(|source| RunnerError::Projection {
                position: envelope.position,
                event: envelope.event.name(),
                source,
            })?;

        self.store.commit(
            &batch,
            Some(CursorUpdate {
                name: &self.config.name,
                position: envelope.position,
            }),
        )?;

        debug!(
            position = %envelope.position,
            event = envelope.event.name(),
            writes = batch.len(),
            "projected event"
        );
        Ok(Applied::Projected {
            writes: batch.len(),
        })
    }

    /// Delivers every envelope of `feed` in order, stopping at the first
    /// failure.
    ///
    /// Events committed before a failure stay committed and the cursor
    /// points at the last of them, so rerunning the same feed resumes at the
    /// failing event.
    ///
    /// # Errors
    ///
    /// Returns the first feed, projection or store error.
    pub fn run<I, L>(&self, feed: I) -> Result<RunResult, RunnerError>
    where
        I: IntoIterator<Item = Result<(EventEnvelope, L), FeedError>>,
        L: LedgerReader,
    {
        let start = self.cursor()?;
        let mut result = RunResult {
            last_position: start,
            resumed_from_cursor: start.is_some(),
            ..RunResult::default()
        };

        if let Some(cursor) = start {
            info!(name = %self.config.name, cursor = %cursor, "Resuming projection from cursor");
        }

        for item in feed {
            let (envelope, ledger) = item?;
            match self.apply(&envelope, &ledger) {
                Ok(Applied::Projected { .. }) => {
                    result.events_processed += 1;
                    result.last_position = Some(envelope.position);
                },
                Ok(Applied::Skipped(_)) => result.events_skipped += 1,
                Err(e) => {
                    warn!(error = %e, "Projection stopped");
                    return Err(e);
                },
            }
        }

        info!(
            name = %self.config.name,
            processed = result.events_processed,
            skipped = result.events_skipped,
            "Projection run complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod unit_tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::entity::VoteEvidenceFlags;
    use crate::events::{BetCreated, BetStateChanged, LedgerEvent};
    use crate::keys::BetKey;
    use crate::ledger::{BetRecord, LedgerSnapshot};
    use crate::store::InMemoryStore;

    fn contract() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn reads() -> LedgerSnapshot {
        LedgerSnapshot::new().with_bet(
            U256::from(1u64),
            BetRecord {
                staking_deadline: U256::from(1000u64),
                voting_deadline: U256::from(2000u64),
                backer_stake: U256::ZERO,
                creator_stake: U256::from(100u64),
                outcome: 0,
                state: 0,
                vote_evidence_bools: VoteEvidenceFlags(0),
                creator: Address::repeat_byte(0xc1),
                backer: Address::ZERO,
                description: "Derby".to_string(),
                creator_bet_description: String::new(),
            },
        )
    }

    fn created(block: u64) -> EventEnvelope {
        EventEnvelope::new(
            LogPosition::new(block, 0),
            5000,
            contract(),
            LedgerEvent::BetCreated(BetCreated {
                bet_id: U256::from(1u64),
                country: 1,
                league: String::new(),
                category: 2,
            }),
        )
    }

    fn state_changed(block: u64, state: i32) -> EventEnvelope {
        EventEnvelope::new(
            LogPosition::new(block, 0),
            5000 + block,
            contract(),
            LedgerEvent::BetStateChanged(BetStateChanged {
                bet_id: U256::from(1u64),
                state,
            }),
        )
    }

    fn feed(
        envelopes: Vec<EventEnvelope>,
    ) -> impl Iterator<Item = Result<(EventEnvelope, LedgerSnapshot), FeedError>> {
        envelopes.into_iter().map(|e| Ok((e, reads())))
    }

    #[test]
    fn test_run_from_empty_cursor() {
        let store = InMemoryStore::new();
        let runner = ProjectionRunner::new(&store);

        let result = runner
            .run(feed(vec![created(10), state_changed(11, 1)]))
            .unwrap();

        assert_eq!(result.events_processed, 2);
        assert_eq!(result.events_skipped, 0);
        assert!(!result.resumed_from_cursor);
        assert_eq!(result.last_position, Some(LogPosition::new(11, 0)));
        assert_eq!(runner.cursor().unwrap(), Some(LogPosition::new(11, 0)));
    }

    #[test]
    fn test_redelivery_is_skipped() {
        let store = InMemoryStore::new();
        let runner = ProjectionRunner::new(&store);
        runner
            .run(feed(vec![created(10), state_changed(11, 1)]))
            .unwrap();

        let result = runner
            .run(feed(vec![
                created(10),
                state_changed(11, 1),
                state_changed(12, 2),
            ]))
            .unwrap();

        assert!(result.resumed_from_cursor);
        assert_eq!(result.events_processed, 1);
        assert_eq!(result.events_skipped, 2);

        let event = store
            .load_event(&crate::keys::EventKey::new("Derby12"))
            .unwrap()
            .unwrap();
        assert_eq!(event.bet_ids, vec![U256::from(1u64)]);
        let bet = store
            .load_bet(&BetKey::from_id(U256::from(1u64)))
            .unwrap()
            .unwrap();
        assert_eq!(bet.state, Some(2));
    }

    #[test]
    fn test_filters_contract_and_start_block() {
        let store = InMemoryStore::new();
        let runner = ProjectionRunner::with_config(
            &store,
            RunnerConfig {
                contract: Some(contract()),
                start_block: 10,
                ..RunnerConfig::default()
            },
        );

        let mut foreign = created(10);
        foreign.contract = Address::repeat_byte(0xbb);

        assert_eq!(
            runner.apply(&foreign, &reads()).unwrap(),
            Applied::Skipped(SkipReason::ForeignContract)
        );
        assert_eq!(
            runner.apply(&created(9), &reads()).unwrap(),
            Applied::Skipped(SkipReason::BeforeStartBlock)
        );
        assert_eq!(runner.cursor().unwrap(), None);
        assert_eq!(
            runner.apply(&created(10), &reads()).unwrap(),
            Applied::Projected { writes: 2 }
        );
    }

    #[test]
    fn test_failure_leaves_cursor_at_last_success() {
        let store = InMemoryStore::new();
        let runner = ProjectionRunner::new(&store);

        let failing = (
            EventEnvelope::new(
                LogPosition::new(11, 0),
                5100,
                contract(),
                LedgerEvent::BetCreated(BetCreated {
                    bet_id: U256::from(2u64),
                    country: 1,
                    league: String::new(),
                    category: 2,
                }),
            ),
            reads(),
        );
        let items: Vec<Result<_, FeedError>> = vec![Ok((created(10), reads())), Ok(failing)];

        let err = runner.run(items).unwrap_err();
        match err {
            RunnerError::Projection {
                position, event, ..
            } => {
                assert_eq!(position, LogPosition::new(11, 0));
                assert_eq!(event, "BetCreated");
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.cursor().unwrap(), Some(LogPosition::new(10, 0)));
        assert!(
            store
                .load_bet(&BetKey::from_id(U256::from(2u64)))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_feed_error_stops_run() {
        let store = InMemoryStore::new();
        let runner = ProjectionRunner::new(&store);
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let items: Vec<Result<(EventEnvelope, LedgerSnapshot), FeedError>> =
            vec![Ok((created(10), reads())), Err(FeedError::Io(io))];

        assert!(matches!(runner.run(items), Err(RunnerError::Feed(_))));
        assert_eq!(runner.cursor().unwrap(), Some(LogPosition::new(10, 0)));
    }

    #[test]
    fn test_empty_feed() {
        let store = InMemoryStore::new();
        let runner = ProjectionRunner::new(&store);

        let result = runner.run(feed(Vec::new())).unwrap();

        assert_eq!(result, RunResult::default());
    }
}
