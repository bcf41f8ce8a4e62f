//! `betgraph replay`: project a recorded feed into the store.

use std::path::Path;

use anyhow::{Context, Result};
use betgraph_core::{BetgraphConfig, FeedReader, ProjectionRunner, RunResult};

use super::open_store;

/// Replays `feed` and prints a summary.
pub fn run(config: &BetgraphConfig, feed: &Path) -> Result<()> {
    let result = replay(config, feed)?;

    println!(
        "Replayed {}: {} projected, {} skipped",
        feed.display(),
        result.events_processed,
        result.events_skipped
    );
    match result.last_position {
        Some(position) => println!("  Cursor: {position}"),
        None => println!("  Cursor: none"),
    }
    Ok(())
}

fn replay(config: &BetgraphConfig, feed: &Path) -> Result<RunResult> {
    let store = open_store(config)?;
    let reader = FeedReader::open(feed)
        .with_context(|| format!("failed to open feed {}", feed.display()))?;

    let runner = ProjectionRunner::with_config(&store, config.runner_config());
    runner
        .run(reader)
        .with_context(|| format!("replay of {} failed", feed.display()))
}
