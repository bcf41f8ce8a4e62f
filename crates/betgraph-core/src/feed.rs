//! Recorded event feeds.
//!
//! A feed is newline-delimited JSON with one [`FeedRecord`] per line. Each
//! record pairs an event envelope with the contract reads that were valid
//! when the event was emitted, so replaying a feed reproduces the live
//! projection without access to a node. Blank lines are ignored.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventEnvelope;
use crate::ledger::LedgerSnapshot;

/// Errors that can occur while reading a feed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedError {
    /// The feed could not be read.
    #[error("failed to read feed: {0}")]
    Io(#[from] io::Error),

    /// A line is not a valid feed record.
    #[error("invalid feed record on line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// One line of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    /// The event and where it was emitted.
    pub envelope: EventEnvelope,

    /// Contract state as seen by the emitting call.
    #[serde(default)]
    pub reads: LedgerSnapshot,
}

impl FeedRecord {
    /// Creates a record.
    #[must_use]
    pub const fn new(envelope: EventEnvelope, reads: LedgerSnapshot) -> Self {
        Self { envelope, reads }
    }

    /// Splits the record into the envelope and its ledger reads.
    #[must_use]
    pub fn into_parts(self) -> (EventEnvelope, LedgerSnapshot) {
        (self.envelope, self.reads)
    }

    /// Encodes the record as a single feed line without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Iterates the records of a feed in file order.
#[derive(Debug)]
pub struct FeedReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> FeedReader<R> {
    /// Reads records from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl FeedReader<BufReader<File>> {
    /// Opens a feed file.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for FeedReader<R> {
    type Item = Result<(EventEnvelope, LedgerSnapshot), FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(FeedError::Io(e))),
            };
            self.line += 1;

            if text.trim().is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str::<FeedRecord>(&text)
                    .map(FeedRecord::into_parts)
                    .map_err(|source| FeedError::Parse {
                        line: self.line,
                        source,
                    }),
            );
        }
    }
}
