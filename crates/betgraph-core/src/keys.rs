//! Key derivation for projected entities.
//!
//! Bets are keyed by their ledger identifier. Event aggregates and leagues
//! have no ledger identity of their own, so their keys are derived from
//! classification fields carried by the `BetCreated` event.
//!
//! # Compatibility
//!
//! [`KeyScheme::Concatenated`] joins the parts without a separator, exactly as
//! previously stored keys were built. This is not injective: the description
//! `"Final1"` with country `2` and category `3` yields the same key as the
//! description `"Final"` with country `12` and category `3`. The collision is
//! never detected at runtime. [`KeyScheme::Delimited`] length-prefixes the
//! free-text part and separates the numeric codes, and should be chosen for
//! any store that does not need to match existing keys.

use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Store key of a [`Bet`](crate::Bet).
///
/// The `0x`-prefixed minimal lowercase hex form of the 256-bit ledger ID
/// (`0x0`, `0x1`, `0x3e8`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BetKey(String);

impl BetKey {
    /// Derives the key for a ledger bet ID.
    #[must_use]
    pub fn from_id(bet_id: U256) -> Self {
        Self(format!("0x{bet_id:x}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<U256> for BetKey {
    fn from(bet_id: U256) -> Self {
        Self::from_id(bet_id)
    }
}

impl fmt::Display for BetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store key of an [`EventAggregate`](crate::EventAggregate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(String);

impl EventKey {
    /// Wraps an already-derived key, e.g. one typed by an operator.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store key of a [`League`](crate::League).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeagueKey(String);

impl LeagueKey {
    /// Wraps an already-derived key, e.g. one typed by an operator.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeagueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How composite aggregate keys are joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// `description ++ country ++ category` with no separator.
    #[default]
    Concatenated,

    /// `len(description):description|country|category`.
    Delimited,
}

impl KeyScheme {
    /// Derives the event aggregate key for a bet classification.
    #[must_use]
    pub fn event_key(self, description: &str, country: i32, category: i32) -> EventKey {
        match self {
            Self::Concatenated => EventKey(format!("{description}{country}{category}")),
            Self::Delimited => EventKey(format!(
                "{}:{description}|{country}|{category}",
                description.len()
            )),
        }
    }

    /// Derives the league key, or `None` when the league name is empty.
    ///
    /// Bets without a league name do not belong to any league, and callers
    /// must skip league projection entirely in that case.
    #[must_use]
    pub fn league_key(self, country: i32, category: i32, league: &str) -> Option<LeagueKey> {
        if league.is_empty() {
            return None;
        }
        Some(match self {
            Self::Concatenated => LeagueKey(format!("{country}{category}{league}")),
            Self::Delimited => LeagueKey(format!("{country}|{category}|{}:{league}", league.len())),
        })
    }
}

/// Derives the key of a bet.
#[must_use]
pub fn bet_key(bet_id: U256) -> BetKey {
    BetKey::from_id(bet_id)
}

/// Derives an event aggregate key with [`KeyScheme::Concatenated`].
#[must_use]
pub fn event_key(description: &str, country: i32, category: i32) -> EventKey {
    KeyScheme::Concatenated.event_key(description, country, category)
}

/// Derives a league key with [`KeyScheme::Concatenated`].
#[must_use]
pub fn league_key(country: i32, category: i32, league: &str) -> Option<LeagueKey> {
    KeyScheme::Concatenated.league_key(country, category, league)
}

#[cfg(test)]
mod unit_tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_bet_key_is_minimal_hex() {
        assert_eq!(bet_key(U256::ZERO).as_str(), "0x0");
        assert_eq!(bet_key(U256::from(1u64)).as_str(), "0x1");
        assert_eq!(bet_key(U256::from(1000u64)).as_str(), "0x3e8");
        assert_eq!(
            bet_key(U256::MAX).as_str(),
            "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
        );
    }

    #[test]
    fn test_event_key_concatenates() {
        assert_eq!(event_key("Derby", 1, 2).as_str(), "Derby12");
        assert_eq!(event_key("", 0, 0).as_str(), "00");
        assert_eq!(event_key("Derby", -1, 2).as_str(), "Derby-12");
    }

    #[test]
    fn test_concatenated_keys_can_collide() {
        // Kept for compatibility with stored keys.
        assert_eq!(event_key("Final1", 2, 3), event_key("Final", 12, 3));
        assert_eq!(league_key(1, 23, "A"), league_key(12, 3, "A"));
    }

    #[test]
    fn test_delimited_keys_separate_colliding_inputs() {
        let scheme = KeyScheme::Delimited;
        assert_ne!(
            scheme.event_key("Final1", 2, 3),
            scheme.event_key("Final", 12, 3)
        );
        assert_ne!(
            scheme.league_key(1, 23, "A"),
            scheme.league_key(12, 3, "A")
        );
        assert_eq!(scheme.event_key("Derby", 1, 2).as_str(), "5:Derby|1|2");
    }

    #[test]
    fn test_league_key_requires_name() {
        assert_eq!(league_key(1, 2, ""), None);
        assert_eq!(KeyScheme::Delimited.league_key(1, 2, ""), None);
        assert_eq!(
            league_key(1, 2, "Premier").map(|k| k.as_str().to_string()),
            Some("12Premier".to_string())
        );
    }

    #[test]
    fn test_key_scheme_serde_names() {
        let scheme: KeyScheme = serde_json::from_str("\"delimited\"").unwrap();
        assert_eq!(scheme, KeyScheme::Delimited);
        assert_eq!(KeyScheme::default(), KeyScheme::Concatenated);
    }

    proptest! {
        #[test]
        fn prop_delimited_event_key_is_injective(
            a in (".{0,12}", -5i32..200, -5i32..200),
            b in (".{0,12}", -5i32..200, -5i32..200),
        ) {
            let ka = KeyScheme::Delimited.event_key(&a.0, a.1, a.2);
            let kb = KeyScheme::Delimited.event_key(&b.0, b.1, b.2);
            prop_assert_eq!(ka == kb, a == b);
        }

        #[test]
        fn prop_delimited_league_key_is_injective(
            a in (-5i32..200, -5i32..200, ".{1,12}"),
            b in (-5i32..200, -5i32..200, ".{1,12}"),
        ) {
            let ka = KeyScheme::Delimited.league_key(a.0, a.1, &a.2);
            let kb = KeyScheme::Delimited.league_key(b.0, b.1, &b.2);
            prop_assert_eq!(ka == kb, a == b);
        }

        #[test]
        fn prop_bet_key_round_trips_through_hex(raw in any::<[u64; 4]>()) {
            let id = U256::from_limbs(raw);
            let key = bet_key(id);
            let parsed: U256 = key.as_str().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}
