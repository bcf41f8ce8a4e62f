//! `SQLite`-backed entity store.
//!
//! Bets are stored one column per field. A bet patch is written with an
//! `INSERT ... ON CONFLICT DO UPDATE` whose assignments `COALESCE` the new
//! value with the stored one, so a `NULL` (unset) patch field never erases a
//! stored value. 256-bit integers are stored as decimal text and addresses
//! as `0x`-prefixed hex text.

// SQLite returns i64 for integer columns, but positions, timestamps and
// counts written by this store are always non-negative.
#![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, U256};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::debug;

use super::{CursorUpdate, EntityStore, EntityWrite, StoreError, WriteBatch};
use crate::entity::{Bet, BetPatch, EventAggregate, League, VoteEvidenceFlags};
use crate::events::LogPosition;
use crate::keys::{BetKey, EventKey, LeagueKey};

/// Schema for entity storage.
const ENTITY_SCHEMA: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS bets (
    id TEXT PRIMARY KEY,
    staking_deadline TEXT,
    voting_deadline TEXT,
    backer_stake TEXT,
    creator_stake TEXT,
    outcome INTEGER,
    state INTEGER,
    vote_evidence_bools INTEGER,
    creator TEXT,
    backer TEXT,
    description TEXT,
    creator_bet_description TEXT,
    country INTEGER,
    league TEXT,
    category INTEGER,
    dispute_id TEXT,
    meta_evidence TEXT,
    time_created INTEGER,
    time_updated INTEGER
);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    start_time TEXT NOT NULL,
    country INTEGER NOT NULL,
    league TEXT NOT NULL,
    category INTEGER NOT NULL,
    bet_ids TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leagues (
    id TEXT PRIMARY KEY,
    league TEXT NOT NULL,
    category INTEGER NOT NULL,
    country INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS projection_cursor (
    name TEXT PRIMARY KEY,
    block_number INTEGER NOT NULL,
    log_index INTEGER NOT NULL,
    updated_at_ns INTEGER NOT NULL
);
";

const UPSERT_BET_SQL: &str = "
INSERT INTO bets (
    id, staking_deadline, voting_deadline, backer_stake, creator_stake,
    outcome, state, vote_evidence_bools, creator, backer, description,
    creator_bet_description, country, league, category, dispute_id,
    meta_evidence, time_created, time_updated
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
ON CONFLICT(id) DO UPDATE SET
    staking_deadline = COALESCE(excluded.staking_deadline, bets.staking_deadline),
    voting_deadline = COALESCE(excluded.voting_deadline, bets.voting_deadline),
    backer_stake = COALESCE(excluded.backer_stake, bets.backer_stake),
    creator_stake = COALESCE(excluded.creator_stake, bets.creator_stake),
    outcome = COALESCE(excluded.outcome, bets.outcome),
    state = COALESCE(excluded.state, bets.state),
    vote_evidence_bools = COALESCE(excluded.vote_evidence_bools, bets.vote_evidence_bools),
    creator = COALESCE(excluded.creator, bets.creator),
    backer = COALESCE(excluded.backer, bets.backer),
    description = COALESCE(excluded.description, bets.description),
    creator_bet_description = COALESCE(excluded.creator_bet_description, bets.creator_bet_description),
    country = COALESCE(excluded.country, bets.country),
    league = COALESCE(excluded.league, bets.league),
    category = COALESCE(excluded.category, bets.category),
    dispute_id = COALESCE(excluded.dispute_id, bets.dispute_id),
    meta_evidence = COALESCE(excluded.meta_evidence, bets.meta_evidence),
    time_created = COALESCE(excluded.time_created, bets.time_created),
    time_updated = COALESCE(excluded.time_updated, bets.time_updated)
";

const SELECT_BET_SQL: &str = "
SELECT staking_deadline, voting_deadline, backer_stake, creator_stake,
       outcome, state, vote_evidence_bools, creator, backer, description,
       creator_bet_description, country, league, category, dispute_id,
       meta_evidence, time_created, time_updated
FROM bets WHERE id = ?1
";

/// Row counts per entity table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub bets: u64,
    pub events: u64,
    pub leagues: u64,
}

/// Raw column values of one `bets` row.
struct BetRow {
    staking_deadline: Option<String>,
    voting_deadline: Option<String>,
    backer_stake: Option<String>,
    creator_stake: Option<String>,
    outcome: Option<i32>,
    state: Option<i32>,
    vote_evidence_bools: Option<i64>,
    creator: Option<String>,
    backer: Option<String>,
    description: Option<String>,
    creator_bet_description: Option<String>,
    country: Option<i32>,
    league: Option<String>,
    category: Option<i32>,
    dispute_id: Option<String>,
    meta_evidence: Option<String>,
    time_created: Option<i64>,
    time_updated: Option<i64>,
}

/// Storage for projected entities and dispatcher cursors.
pub struct SqliteEntityStore {
    conn: Mutex<Connection>,
}

impl SqliteEntityStore {
    /// Opens or creates an entity store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;
        debug!(path = %path.display(), "opened entity store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory entity store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(ENTITY_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Returns the number of stored entities per table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;
        let count = |table: &str| -> Result<u64, StoreError> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            bets: count("bets")?,
            events: count("events")?,
            leagues: count("leagues")?,
        })
    }

    fn upsert_bet(conn: &Connection, key: &BetKey, patch: &BetPatch) -> Result<(), StoreError> {
        conn.execute(
            UPSERT_BET_SQL,
            params![
                key.as_str(),
                patch.staking_deadline.map(|v| v.to_string()),
                patch.voting_deadline.map(|v| v.to_string()),
                patch.backer_stake.map(|v| v.to_string()),
                patch.creator_stake.map(|v| v.to_string()),
                patch.outcome,
                patch.state,
                patch.vote_evidence_bools.map(VoteEvidenceFlags::bits),
                patch.creator.map(|a| a.to_string()),
                patch.backer.map(|a| a.to_string()),
                patch.description,
                patch.creator_bet_description,
                patch.country,
                patch.league,
                patch.category,
                patch.dispute_id.map(|v| v.to_string()),
                patch.meta_evidence,
                patch.time_created,
                patch.time_updated,
            ],
        )?;
        Ok(())
    }

    fn upsert_event(conn: &Connection, event: &EventAggregate) -> Result<(), StoreError> {
        let bet_ids = serde_json::to_string(&event.bet_ids)?;
        conn.execute(
            "INSERT OR REPLACE INTO events
                 (id, description, start_time, country, league, category, bet_ids)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.as_str(),
                event.description,
                event.start_time.to_string(),
                event.country,
                event.league,
                event.category,
                bet_ids,
            ],
        )?;
        Ok(())
    }

    fn upsert_league(conn: &Connection, league: &League) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO leagues (id, league, category, country)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                league.id.as_str(),
                league.league,
                league.category,
                league.country,
            ],
        )?;
        Ok(())
    }
}

impl EntityStore for SqliteEntityStore {
    fn load_bet(&self, key: &BetKey) -> Result<Option<Bet>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(SELECT_BET_SQL, params![key.as_str()], |row| {
                Ok(BetRow {
                    staking_deadline: row.get(0)?,
                    voting_deadline: row.get(1)?,
                    backer_stake: row.get(2)?,
                    creator_stake: row.get(3)?,
                    outcome: row.get(4)?,
                    state: row.get(5)?,
                    vote_evidence_bools: row.get(6)?,
                    creator: row.get(7)?,
                    backer: row.get(8)?,
                    description: row.get(9)?,
                    creator_bet_description: row.get(10)?,
                    country: row.get(11)?,
                    league: row.get(12)?,
                    category: row.get(13)?,
                    dispute_id: row.get(14)?,
                    meta_evidence: row.get(15)?,
                    time_created: row.get(16)?,
                    time_updated: row.get(17)?,
                })
            })
            .optional()?;

        row.map(|row| decode_bet(key, row)).transpose()
    }

    fn load_event(&self, key: &EventKey) -> Result<Option<EventAggregate>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT description, start_time, country, league, category, bet_ids
                 FROM events WHERE id = ?1",
                params![key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i32>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i32>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((description, start_time, country, league, category, bet_ids)) = row else {
            return Ok(None);
        };

        Ok(Some(EventAggregate {
            id: key.clone(),
            description,
            start_time: parse_u256("events", key.as_str(), &start_time)?,
            country,
            league,
            category,
            bet_ids: serde_json::from_str(&bet_ids)?,
        }))
    }

    fn load_league(&self, key: &LeagueKey) -> Result<Option<League>, StoreError> {
        let conn = self.lock()?;
        let league = conn
            .query_row(
                "SELECT league, category, country FROM leagues WHERE id = ?1",
                params![key.as_str()],
                |row| {
                    Ok(League {
                        id: key.clone(),
                        league: row.get(0)?,
                        category: row.get(1)?,
                        country: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(league)
    }

    fn commit(
        &self,
        batch: &WriteBatch,
        cursor: Option<CursorUpdate<'_>>,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for write in batch.writes() {
            match write {
                EntityWrite::Bet { key, patch } => Self::upsert_bet(&tx, key, patch)?,
                EntityWrite::Event(event) => Self::upsert_event(&tx, event)?,
                EntityWrite::League(league) => Self::upsert_league(&tx, league)?,
            }
        }

        if let Some(cursor) = cursor {
            let updated_at_ns = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            tx.execute(
                "INSERT INTO projection_cursor (name, block_number, log_index, updated_at_ns)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                     block_number = excluded.block_number,
                     log_index = excluded.log_index,
                     updated_at_ns = excluded.updated_at_ns",
                params![
                    cursor.name,
                    cursor.position.block_number,
                    cursor.position.log_index,
                    updated_at_ns,
                ],
            )?;
        }

        // Dropping an uncommitted transaction rolls it back.
        tx.commit()?;
        Ok(())
    }

    fn cursor(&self, name: &str) -> Result<Option<LogPosition>, StoreError> {
        let conn = self.lock()?;
        let position = conn
            .query_row(
                "SELECT block_number, log_index FROM projection_cursor WHERE name = ?1",
                params![name],
                |row| {
                    Ok(LogPosition::new(
                        row.get::<_, i64>(0)? as u64,
                        row.get::<_, i64>(1)? as u64,
                    ))
                },
            )
            .optional()?;
        Ok(position)
    }
}

fn corrupt(key: &str, details: String) -> StoreError {
    StoreError::Corrupt {
        table: "bets",
        key: key.to_string(),
        details,
    }
}

fn parse_u256(table: &'static str, key: &str, value: &str) -> Result<U256, StoreError> {
    U256::from_str(value).map_err(|e| StoreError::Corrupt {
        table,
        key: key.to_string(),
        details: format!("invalid integer '{value}': {e}"),
    })
}

fn parse_opt_u256(key: &str, value: Option<String>) -> Result<Option<U256>, StoreError> {
    value
        .map(|v| parse_u256("bets", key, &v))
        .transpose()
}

fn parse_opt_address(key: &str, value: Option<String>) -> Result<Option<Address>, StoreError> {
    value
        .map(|v| {
            Address::from_str(&v).map_err(|e| corrupt(key, format!("invalid address '{v}': {e}")))
        })
        .transpose()
}

fn decode_bet(key: &BetKey, row: BetRow) -> Result<Bet, StoreError> {
    let k = key.as_str();
    let vote_evidence_bools = row
        .vote_evidence_bools
        .map(|bits| {
            u8::try_from(bits)
                .map(VoteEvidenceFlags)
                .map_err(|_| corrupt(k, format!("vote_evidence_bools out of range: {bits}")))
        })
        .transpose()?;

    Ok(Bet {
        id: key.clone(),
        staking_deadline: parse_opt_u256(k, row.staking_deadline)?,
        voting_deadline: parse_opt_u256(k, row.voting_deadline)?,
        backer_stake: parse_opt_u256(k, row.backer_stake)?,
        creator_stake: parse_opt_u256(k, row.creator_stake)?,
        outcome: row.outcome,
        state: row.state,
        vote_evidence_bools,
        creator: parse_opt_address(k, row.creator)?,
        backer: parse_opt_address(k, row.backer)?,
        description: row.description,
        creator_bet_description: row.creator_bet_description,
        country: row.country,
        league: row.league,
        category: row.category,
        dispute_id: parse_opt_u256(k, row.dispute_id)?,
        meta_evidence: row.meta_evidence,
        time_created: row.time_created.map(|t| t as u64),
        time_updated: row.time_updated.map(|t| t as u64),
    })
}
