//! Per-connection event filter.
//!
//! A client subscribes to topics: a single pool (`"34001"`), every pool
//! of a city (`"34"`), or everything (`"*"`). Events are matched by the
//! pool code they carry.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{CityCode, PoolCode};

/// One subscription target as written by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Topic {
    /// Every pool.
    All,
    /// Every pool in one city.
    City(CityCode),
    /// A single pool.
    Pool(PoolCode),
}

impl Topic {
    /// Parses `"*"`, a 2-digit city code, or a 5-digit pool code.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "*" => Some(Self::All),
            s if s.len() == 2 => CityCode::parse(s).ok().map(Self::City),
            s => PoolCode::parse(s).ok().map(Self::Pool),
        }
    }

    /// Topics wider than one pool are reserved for operators.
    #[must_use]
    pub const fn is_broad(&self) -> bool {
        !matches!(self, Self::Pool(_))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::City(city) => write!(f, "{city}"),
            Self::Pool(code) => write!(f, "{code}"),
        }
    }
}

/// Topics held by a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    topics: BTreeSet<Topic>,
}

impl SubscriptionManager {
    /// Creates an empty filter that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a topic. Returns `false` if it was already held.
    pub fn subscribe(&mut self, topic: Topic) -> bool {
        self.topics.insert(topic)
    }

    /// Drops a topic. Returns `false` if it was not held.
    pub fn unsubscribe(&mut self, topic: Topic) -> bool {
        self.topics.remove(&topic)
    }

    /// Returns `true` if an event for `pool_code` should be forwarded.
    #[must_use]
    pub fn matches(&self, pool_code: PoolCode) -> bool {
        self.topics.contains(&Topic::All)
            || self.topics.contains(&Topic::City(pool_code.city()))
            || self.topics.contains(&Topic::Pool(pool_code))
    }

    /// Number of held topics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if the wildcard topic is held.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.topics.contains(&Topic::All)
    }

    /// Held topics in their textual form, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.topics.iter().map(ToString::to_string).collect()
    }
}
