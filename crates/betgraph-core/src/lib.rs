#![allow(clippy::doc_markdown)]

//! betgraph-core - GambleBoard event projection
//!
//! This library turns the append-only event log of a GambleBoard wagering
//! contract into a queryable set of entities: one [`Bet`] per wager, one
//! [`EventAggregate`] per (description, country, category) grouping and one
//! [`League`] per (country, category, league name) triple.
//!
//! # Architecture
//!
//! ```text
//! EventEnvelope --> ProjectionRunner --> Projector --> WriteBatch --> EntityStore
//!                                            |
//!                                      LedgerReader
//! ```
//!
//! Every ledger event is handled by exactly one projection rule. A rule reads
//! whatever authoritative values it needs from the [`LedgerReader`], loads
//! prior aggregate state from the [`EntityStore`], and returns a
//! [`WriteBatch`]. Nothing is written until the rule has returned, so a
//! failed ledger read never leaves a half-populated entity behind.
//!
//! Bet writes are sparse [`BetPatch`]es. Stores overlay a patch onto the
//! stored record field by field and never replace the record wholesale.
//!
//! # Modules
//!
//! - [`keys`]: Stable identifiers for bets, event aggregates and leagues
//! - [`entity`]: Stored entity types and bet patches
//! - [`events`]: Decoded contract events and their delivery envelope
//! - [`ledger`]: Point-in-time contract reads
//! - [`projection`]: One projection rule per event kind
//! - [`store`]: Entity store trait with in-memory and `SQLite` backends
//! - [`runner`]: In-order delivery with a resumable cursor
//! - [`feed`]: Newline-delimited JSON feed of recorded events
//! - [`config`]: TOML configuration

pub mod config;
pub mod entity;
pub mod events;
pub mod feed;
pub mod keys;
pub mod ledger;
pub mod projection;
pub mod runner;
pub mod store;

pub use config::{BetgraphConfig, ConfigError};
pub use entity::{Bet, BetPatch, EventAggregate, League, VoteEvidenceFlags};
pub use events::{EventEnvelope, LedgerEvent, LogPosition};
pub use feed::{FeedError, FeedReader, FeedRecord};
pub use keys::{BetKey, EventKey, KeyScheme, LeagueKey};
pub use ledger::{BetRecord, LedgerError, LedgerReader, LedgerSnapshot};
pub use projection::{ProjectionError, Projector};
pub use runner::{Applied, ProjectionRunner, RunResult, RunnerConfig, RunnerError, SkipReason};
pub use store::{
    CursorUpdate, EntityStore, EntityWrite, InMemoryStore, SqliteEntityStore, StoreError,
    StoreStats, WriteBatch,
};
