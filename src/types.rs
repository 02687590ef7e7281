//! Domain types shared by the ledger, the recorder and the auction engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuctionError;

/// Lowest priority a bid may declare.
pub const MIN_PRIORITY: u8 = 1;

/// Highest priority a bid may declare.
pub const MAX_PRIORITY: u8 = 10;

/// Partition key of a team's account row.
pub fn token_pk(team_id: &str) -> String {
    format!("team#{}", team_id)
}

/// Partition key of a team's bid records.
pub fn bid_pk(team_id: &str) -> String {
    format!("bid#{}", team_id)
}

/// Bid priority, guaranteed to lie in `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(MAX_PRIORITY);

    pub fn new(value: i64) -> Result<Self, AuctionError> {
        if (MIN_PRIORITY as i64..=MAX_PRIORITY as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(AuctionError::InvalidPriority(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every valid priority, lowest first.
    pub fn all() -> impl Iterator<Item = Priority> {
        (MIN_PRIORITY..=MAX_PRIORITY).map(Priority)
    }
}

impl TryFrom<i64> for Priority {
    type Error = AuctionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.0 as i64
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_string())
    }
}

/// A request by a team to win the current round for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub team_id: String,
    /// Recipient the team wants to notify.
    pub target: String,
    pub priority: Priority,
}

impl Bid {
    pub fn new(team_id: impl Into<String>, target: impl Into<String>, priority: Priority) -> Self {
        Self {
            team_id: team_id.into(),
            target: target.into(),
            priority,
        }
    }
}

/// Per-team token account as persisted by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub pk: String,
    pub team_id: String,
    pub token_balance: i64,
    pub last_refill_time: i64,
    pub reputation_score: i64,
    /// Successful debits per priority level.
    pub priority_usage: BTreeMap<u8, i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Account {
    /// Fresh account with every usage counter at zero.
    pub fn new(team_id: &str, balance: i64, reputation: i64, now_ms: i64) -> Self {
        Self {
            pk: token_pk(team_id),
            team_id: team_id.to_string(),
            token_balance: balance,
            last_refill_time: now_ms,
            reputation_score: reputation,
            priority_usage: Priority::all().map(|p| (p.get(), 0)).collect(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Number of successful debits made at `priority`.
    pub fn usage(&self, priority: Priority) -> i64 {
        self.priority_usage.get(&priority.get()).copied().unwrap_or(0)
    }
}

/// Immutable audit entry written for every submitted bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRecord {
    pub pk: String,
    /// `<team>#<bid id>#<created_at_ms>`
    pub sk: String,
    pub target: String,
    pub priority: i64,
    pub cost: i64,
    pub score: f64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl BidRecord {
    pub fn sort_key(team_id: &str, bid_id: &str, created_at_ms: i64) -> String {
        [team_id, bid_id, &created_at_ms.to_string()].join("#")
    }

    /// Bid id recovered from the sort key. The team prefix is taken from
    /// `pk`, so team ids containing `#` are handled.
    pub fn bid_id(&self) -> &str {
        let team_id = self.pk.strip_prefix("bid#").unwrap_or_default();
        self.sk
            .strip_prefix(team_id)
            .and_then(|rest| rest.strip_prefix('#'))
            .and_then(|rest| rest.rsplit_once('#'))
            .map(|(bid_id, _)| bid_id)
            .unwrap_or_default()
    }
}
