//! Read-only inspection commands.

use std::str::FromStr;

use alloy_primitives::U256;
use anyhow::{Context, Result, anyhow, bail};
use betgraph_core::{BetKey, BetgraphConfig, EntityStore, EventKey, LeagueKey};
use serde::Serialize;

use super::open_store;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode entity")?;
    println!("{text}");
    Ok(())
}

/// Parses a bet ID given in decimal or `0x`-prefixed hex.
fn parse_bet_id(id: &str) -> Result<BetKey> {
    let id = id.trim();
    if id.is_empty() {
        bail!("bet id must not be empty");
    }
    U256::from_str(id)
        .map(BetKey::from_id)
        .map_err(|e| anyhow!("invalid bet id '{id}': {e}"))
}

/// Prints a bet.
pub fn bet(config: &BetgraphConfig, id: &str) -> Result<()> {
    let key = parse_bet_id(id)?;
    let store = open_store(config)?;
    let Some(bet) = store.load_bet(&key).context("failed to load bet")? else {
        bail!("bet {key} not found");
    };
    print_json(&bet)
}

/// Prints an event aggregate.
pub fn event(config: &BetgraphConfig, key: &str) -> Result<()> {
    let store = open_store(config)?;
    let key = EventKey::new(key);
    let Some(event) = store.load_event(&key).context("failed to load event")? else {
        bail!("event '{key}' not found");
    };
    print_json(&event)
}

/// Prints a league.
pub fn league(config: &BetgraphConfig, key: &str) -> Result<()> {
    let store = open_store(config)?;
    let key = LeagueKey::new(key);
    let Some(league) = store.load_league(&key).context("failed to load league")? else {
        bail!("league '{key}' not found");
    };
    print_json(&league)
}

/// Prints the resume cursor of the configured projection.
pub fn cursor(config: &BetgraphConfig) -> Result<()> {
    let store = open_store(config)?;
    let name = &config.projection.name;
    match store.cursor(name).context("failed to read cursor")? {
        Some(position) => println!("{name}: {position}"),
        None => println!("{name}: no events projected"),
    }
    Ok(())
}

/// Prints entity counts.
pub fn stats(config: &BetgraphConfig) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats().context("failed to count entities")?;
    println!("Bets:    {}", stats.bets);
    println!("Events:  {}", stats.events);
    println!("Leagues: {}", stats.leagues);
    Ok(())
}
