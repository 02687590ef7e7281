//! Bid ranking
//!
//! score = 0.7 * normalized priority + 0.3 * normalized reputation
//!
//! Priority maps 1..=10 onto 0..=100. Reputation is read directly as a
//! percentage and is not clamped.

use serde::{Deserialize, Serialize};

use crate::types::{Priority, MAX_PRIORITY, MIN_PRIORITY};

pub const PRIORITY_WEIGHT: f64 = 0.7;
pub const REPUTATION_WEIGHT: f64 = 0.3;

/// Reputation that normalizes to 100.
pub const MAX_REPUTATION: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub priority_weight: f64,
    pub reputation_weight: f64,
    pub reputation_scale: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            priority_weight: PRIORITY_WEIGHT,
            reputation_weight: REPUTATION_WEIGHT,
            reputation_scale: MAX_REPUTATION,
        }
    }
}

impl ScoreWeights {
    pub fn normalized_priority(&self, priority: Priority) -> f64 {
        (priority.get() - MIN_PRIORITY) as f64 / (MAX_PRIORITY - MIN_PRIORITY) as f64 * 100.0
    }

    pub fn normalized_reputation(&self, reputation: i64) -> f64 {
        reputation as f64 / self.reputation_scale * 100.0
    }

    /// Rank value of a bid, higher wins.
    pub fn score(&self, priority: Priority, reputation: i64) -> f64 {
        self.priority_weight * self.normalized_priority(priority)
            + self.reputation_weight * self.normalized_reputation(reputation)
    }
}
