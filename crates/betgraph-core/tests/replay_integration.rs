//! End-to-end replay of a recorded feed into an on-disk store.

use std::io::Write;
use std::path::Path;

use alloy_primitives::{Address, U256};
use betgraph_core::events::{
    BetCreated, BetPlaced, BetVotedOn, Dispute, Evidence, MetaEvidence, Ruling,
};
use betgraph_core::{
    BetKey, BetRecord, EntityStore, EventEnvelope, EventKey, FeedReader, FeedRecord,
    InMemoryStore, LeagueKey, LedgerEvent, LedgerSnapshot, LogPosition, ProjectionRunner,
    RunnerConfig, RunnerError, SqliteEntityStore, VoteEvidenceFlags,
};
use tempfile::TempDir;

fn contract() -> Address {
    Address::repeat_byte(0xaa)
}

fn id(n: u64) -> U256 {
    U256::from(n)
}

fn base_record() -> BetRecord {
    BetRecord {
        staking_deadline: id(1_600_000_000),
        voting_deadline: id(1_600_086_400),
        backer_stake: U256::ZERO,
        creator_stake: id(1_000_000_000_000_000_000),
        outcome: 0,
        state: 0,
        vote_evidence_bools: VoteEvidenceFlags(0),
        creator: Address::repeat_byte(0xc1),
        backer: Address::ZERO,
        description: "Derby".to_string(),
        creator_bet_description: "Home side wins".to_string(),
    }
}

fn envelope(block: u64, ts: u64, event: LedgerEvent) -> EventEnvelope {
    EventEnvelope::new(LogPosition::new(block, 0), ts, contract(), event)
}

/// The ledger state as it evolves over the lifecycle of bet 1.
fn lifecycle() -> Vec<FeedRecord> {
    let created = base_record();

    let mut placed = created.clone();
    placed.state = 1;
    placed.backer = Address::repeat_byte(0xb2);
    placed.backer_stake = id(1_000_000_000_000_000_000);

    let mut voted = placed.clone();
    voted.state = 2;
    voted.outcome = 1;
    voted.vote_evidence_bools = VoteEvidenceFlags(0b01);

    let mut disputed = voted.clone();
    disputed.state = 3;

    let mut evidenced = disputed.clone();
    evidenced.vote_evidence_bools = VoteEvidenceFlags(0b11);

    let mut ruled = evidenced.clone();
    ruled.state = 4;

    let snapshot = |record: &BetRecord| LedgerSnapshot::new().with_bet(id(1), record.clone());

    vec![
        FeedRecord::new(
            envelope(
                100,
                4_900,
                LedgerEvent::MetaEvidence(MetaEvidence {
                    meta_evidence_id: id(1),
                    evidence: "/ipfs/QmMeta/metaEvidence.json".to_string(),
                }),
            ),
            LedgerSnapshot::new(),
        ),
        FeedRecord::new(
            envelope(
                100,
                4_900,
                LedgerEvent::BetCreated(BetCreated {
                    bet_id: id(1),
                    country: 44,
                    league: "Premier".to_string(),
                    category: 1,
                }),
            ),
            snapshot(&created),
        )
        .at_log(1),
        FeedRecord::new(
            envelope(
                110,
                5_000,
                LedgerEvent::BetPlaced(BetPlaced {
                    bet_id: id(1),
                    state: 1,
                    backer: Address::repeat_byte(0xb2),
                }),
            ),
            snapshot(&placed),
        ),
        FeedRecord::new(
            envelope(120, 6_000, LedgerEvent::BetVotedOn(BetVotedOn { bet_id: id(1) })),
            snapshot(&voted),
        ),
        FeedRecord::new(
            envelope(
                130,
                7_000,
                LedgerEvent::Dispute(Dispute {
                    arbitrator: Address::repeat_byte(0xa0),
                    dispute_id: id(77),
                    meta_evidence_id: id(1),
                    evidence_group_id: id(1),
                }),
            ),
            snapshot(&disputed),
        ),
        FeedRecord::new(
            envelope(
                140,
                8_000,
                LedgerEvent::Evidence(Evidence {
                    arbitrator: Address::repeat_byte(0xa0),
                    evidence_group_id: id(1),
                    party: Address::repeat_byte(0xb2),
                    evidence: "/ipfs/QmEvidence/evidence.json".to_string(),
                }),
            ),
            snapshot(&evidenced),
        ),
        FeedRecord::new(
            envelope(
                150,
                9_000,
                LedgerEvent::Ruling(Ruling {
                    arbitrator: Address::repeat_byte(0xa0),
                    dispute_id: id(77),
                    ruling: id(2),
                }),
            ),
            snapshot(&ruled).with_dispute(id(77), id(1)),
        ),
    ]
}

trait AtLog {
    fn at_log(self, log_index: u64) -> Self;
}

impl AtLog for FeedRecord {
    fn at_log(mut self, log_index: u64) -> Self {
        self.envelope.position.log_index = log_index;
        self
    }
}

fn write_feed(path: &Path, records: &[FeedRecord]) {
    let mut file = std::fs::File::create(path).unwrap();
    for record in records {
        writeln!(file, "{}", record.to_line().unwrap()).unwrap();
    }
}

fn config() -> RunnerConfig {
    RunnerConfig {
        contract: Some(contract()),
        ..RunnerConfig::default()
    }
}

#[test]
fn test_full_lifecycle_replay() {
    let dir = TempDir::new().unwrap();
    let feed = dir.path().join("feed.ndjson");
    write_feed(&feed, &lifecycle());

    let store = SqliteEntityStore::open(dir.path().join("entities.db")).unwrap();
    let runner = ProjectionRunner::with_config(&store, config());
    let result = runner.run(FeedReader::open(&feed).unwrap()).unwrap();

    assert_eq!(result.events_processed, 7);
    assert_eq!(result.last_position, Some(LogPosition::new(150, 0)));

    let bet = store.load_bet(&BetKey::from_id(id(1))).unwrap().unwrap();
    assert_eq!(bet.id.as_str(), "0x1");
    assert_eq!(
        bet.meta_evidence.as_deref(),
        Some("/ipfs/QmMeta/metaEvidence.json")
    );
    assert_eq!(bet.description.as_deref(), Some("Derby"));
    assert_eq!(bet.backer, Some(Address::repeat_byte(0xb2)));
    assert_eq!(bet.backer_stake, Some(id(1_000_000_000_000_000_000)));
    assert_eq!(bet.dispute_id, Some(id(77)));
    assert_eq!(bet.vote_evidence_bools, Some(VoteEvidenceFlags(0b11)));
    assert_eq!(bet.outcome, Some(2));
    assert_eq!(bet.state, Some(4));
    assert_eq!(bet.time_created, Some(4_900));
    // The ruling does not touch timeUpdated.
    assert_eq!(bet.time_updated, Some(8_000));

    let event = store
        .load_event(&EventKey::new("Derby441"))
        .unwrap()
        .unwrap();
    assert_eq!(event.start_time, id(1_600_000_000));
    assert_eq!(event.bet_ids, vec![id(1)]);

    let league = store
        .load_league(&LeagueKey::new("441Premier"))
        .unwrap()
        .unwrap();
    assert_eq!(league.league, "Premier");

    let stats = store.stats().unwrap();
    assert_eq!((stats.bets, stats.events, stats.leagues), (1, 1, 1));
}

#[test]
fn test_resume_after_restart_and_redelivery() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("entities.db");
    let records = lifecycle();

    let partial = dir.path().join("partial.ndjson");
    write_feed(&partial, &records[..3]);
    {
        let store = SqliteEntityStore::open(&db).unwrap();
        let runner = ProjectionRunner::with_config(&store, config());
        let result = runner.run(FeedReader::open(&partial).unwrap()).unwrap();
        assert_eq!(result.events_processed, 3);
    }

    let full = dir.path().join("full.ndjson");
    write_feed(&full, &records);
    let store = SqliteEntityStore::open(&db).unwrap();
    let runner = ProjectionRunner::with_config(&store, config());
    let result = runner.run(FeedReader::open(&full).unwrap()).unwrap();

    assert!(result.resumed_from_cursor);
    assert_eq!(result.events_skipped, 3);
    assert_eq!(result.events_processed, 4);

    // Redelivered creation must not append a second member.
    let event = store
        .load_event(&EventKey::new("Derby441"))
        .unwrap()
        .unwrap();
    assert_eq!(event.bet_ids, vec![id(1)]);
}

#[test]
fn test_sqlite_and_memory_replays_agree() {
    let dir = TempDir::new().unwrap();
    let feed = dir.path().join("feed.ndjson");
    write_feed(&feed, &lifecycle());

    let sqlite = SqliteEntityStore::open(dir.path().join("entities.db")).unwrap();
    ProjectionRunner::with_config(&sqlite, config())
        .run(FeedReader::open(&feed).unwrap())
        .unwrap();

    let memory = InMemoryStore::new();
    ProjectionRunner::with_config(&memory, config())
        .run(FeedReader::open(&feed).unwrap())
        .unwrap();

    let key = BetKey::from_id(id(1));
    assert_eq!(sqlite.load_bet(&key).unwrap(), memory.load_bet(&key).unwrap());
    let event_key = EventKey::new("Derby441");
    assert_eq!(
        sqlite.load_event(&event_key).unwrap(),
        memory.load_event(&event_key).unwrap()
    );
}

#[test]
fn test_lookup_failure_halts_without_partial_writes() {
    let dir = TempDir::new().unwrap();
    let mut records = lifecycle();
    // The voted-on event arrives without the reads it needs.
    records[3].reads = LedgerSnapshot::new();

    let feed = dir.path().join("feed.ndjson");
    write_feed(&feed, &records);

    let store = SqliteEntityStore::open(dir.path().join("entities.db")).unwrap();
    let runner = ProjectionRunner::with_config(&store, config());
    let err = runner.run(FeedReader::open(&feed).unwrap()).unwrap_err();

    assert!(matches!(
        err,
        RunnerError::Projection { event: "BetVotedOn", .. }
    ));
    assert_eq!(runner.cursor().unwrap(), Some(LogPosition::new(110, 0)));

    let bet = store.load_bet(&BetKey::from_id(id(1))).unwrap().unwrap();
    assert_eq!(bet.state, Some(1));
    assert_eq!(bet.outcome, Some(0));
    assert_eq!(bet.time_updated, Some(5_000));
}
