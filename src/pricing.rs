//! Bid pricing
//!
//! Cost is a tiered base cost scaled by a reputation multiplier:
//! - priorities 1-3 cost 1, 4-6 cost 5, 7-9 cost 7 and 10 costs 10
//! - multiplier = min + (max - min) * (1 - reputation / 100)
//! - cost = floor(base * multiplier)
//!
//! Reputation is never clamped, so a team above 100 pays less than base
//! and a team below 0 pays more than 2.5x base.

use serde::{Deserialize, Serialize};

use crate::types::Priority;

/// Base cost per priority, index 0 is priority 1.
pub const BASE_COSTS: [i64; 10] = [1, 1, 1, 5, 5, 5, 7, 7, 7, 10];

/// Multiplier at full reputation (no markup).
pub const MIN_MULTIPLIER: f64 = 1.0;

/// Multiplier at zero reputation.
pub const MAX_MULTIPLIER: f64 = 2.5;

/// Reputation that maps to the minimum multiplier.
pub const REPUTATION_SCALE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSchedule {
    pub base_costs: [i64; 10],
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub reputation_scale: f64,
}

impl Default for PriceSchedule {
    fn default() -> Self {
        Self {
            base_costs: BASE_COSTS,
            min_multiplier: MIN_MULTIPLIER,
            max_multiplier: MAX_MULTIPLIER,
            reputation_scale: REPUTATION_SCALE,
        }
    }
}

impl PriceSchedule {
    pub fn base_cost(&self, priority: Priority) -> i64 {
        self.base_costs[(priority.get() - 1) as usize]
    }

    pub fn multiplier(&self, reputation: i64) -> f64 {
        self.min_multiplier
            + (self.max_multiplier - self.min_multiplier)
                * (1.0 - reputation as f64 / self.reputation_scale)
    }

    /// Token cost of a bid. Never negative: a multiplier driven below zero
    /// by reputation far above the scale prices the bid at 0.
    pub fn price(&self, priority: Priority, reputation: i64) -> i64 {
        let cost = self.base_cost(priority) as f64 * self.multiplier(reputation);
        (cost as i64).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(v: i64) -> Priority {
        Priority::new(v).unwrap()
    }

    #[test]
    fn test_base_cost_tiers() {
        let schedule = PriceSchedule::default();
        let tiers: Vec<i64> = Priority::all().map(|pr| schedule.base_cost(pr)).collect();
        assert_eq!(tiers, vec![1, 1, 1, 5, 5, 5, 7, 7, 7, 10]);
    }

    #[test]
    fn test_price_at_full_reputation_is_base() {
        let schedule = PriceSchedule::default();
        assert_eq!(schedule.price(p(9), 100), 7);
        assert_eq!(schedule.price(p(4), 100), 5);
        assert_eq!(schedule.price(p(10), 100), 10);
    }

    #[test]
    fn test_price_at_zero_reputation() {
        let schedule = PriceSchedule::default();
        // 10 * 2.5
        assert_eq!(schedule.price(p(10), 0), 25);
        // 5 * 2.5 = 12.5 truncates
        assert_eq!(schedule.price(p(5), 0), 12);
        // 1 * 2.5
        assert_eq!(schedule.price(p(1), 0), 2);
    }

    #[test]
    fn test_price_truncates() {
        let schedule = PriceSchedule::default();
        // multiplier 1.75, 7 * 1.75 = 12.25
        assert_eq!(schedule.price(p(8), 50), 12);
        // multiplier 1.15, 5 * 1.15 = 5.75
        assert_eq!(schedule.price(p(6), 90), 5);
    }

    #[test]
    fn test_price_uses_float_arithmetic() {
        let schedule = PriceSchedule::default();
        // 1.0 + 1.5 * (1 - 0.8) lands just under 1.3, so 10 * 1.3 truncates to 12
        assert_eq!(schedule.price(p(10), 80), 12);
    }

    #[test]
    fn test_price_monotonic_in_reputation() {
        let schedule = PriceSchedule::default();
        for priority in Priority::all() {
            let floor = schedule.price(priority, 100);
            let ceiling = schedule.price(priority, 0);
            let mut previous = ceiling;
            for reputation in 0..=100 {
                let cost = schedule.price(priority, reputation);
                assert!(floor <= cost && cost <= ceiling);
                assert!(cost <= previous, "price rose at {} / {}", priority, reputation);
                previous = cost;
            }
        }
    }

    #[test]
    fn test_reputation_outside_nominal_range() {
        let schedule = PriceSchedule::default();
        // below zero marks up past 2.5x: 10 * (1 + 1.5 * 1.5)
        assert_eq!(schedule.price(p(10), -50), 32);
        // above 100 discounts: 10 * (1 - 1.5 * 0.2)
        assert_eq!(schedule.price(p(10), 120), 7);
        // multiplier negative, floored at zero
        assert_eq!(schedule.price(p(10), 300), 0);
    }
}
