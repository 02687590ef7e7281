//! Auction engine
//!
//! One round takes a batch of simultaneous bids for a recipient and
//! produces at most one winner:
//!
//! 1. Collecting: read each team's balance and reputation
//! 2. Scoring: price, score and record every bid in input order
//! 3. Settling: debit the best affordable bid
//!
//! Ties keep the earliest bid. Bids are processed one at a time; nothing
//! in a round runs concurrently.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AuctionError, Result};
use crate::ledger::AccountLedger;
use crate::pricing::PriceSchedule;
use crate::recorder::BidRecorder;
use crate::scoring::ScoreWeights;
use crate::store::LedgerStore;
use crate::types::Bid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Collecting,
    Scoring,
    Settling,
    Won,
    NoWinner,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundPhase::Collecting => "collecting",
            RoundPhase::Scoring => "scoring",
            RoundPhase::Settling => "settling",
            RoundPhase::Won => "won",
            RoundPhase::NoWinner => "no_winner",
        };
        f.write_str(name)
    }
}

/// Result of a settled round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub winner: Bid,
    pub cost: i64,
    pub score: f64,
    /// Winner's balance after the debit.
    pub balance: i64,
    /// Bids written to the audit trail, affordable or not.
    pub recorded: usize,
}

struct Candidate<'a> {
    bid: &'a Bid,
    cost: i64,
    score: f64,
}

pub struct AuctionEngine {
    ledger: Arc<AccountLedger>,
    recorder: BidRecorder,
    pricing: PriceSchedule,
    scoring: ScoreWeights,
}

impl AuctionEngine {
    pub fn new(
        ledger: Arc<AccountLedger>,
        recorder: BidRecorder,
        pricing: PriceSchedule,
        scoring: ScoreWeights,
    ) -> Self {
        Self {
            ledger,
            recorder,
            pricing,
            scoring,
        }
    }

    /// Wire a ledger, recorder and engine over one store.
    pub fn from_config(store: Arc<dyn LedgerStore>, config: &Config) -> Self {
        let ledger = Arc::new(AccountLedger::new(
            store.clone(),
            config.ledger.clone(),
            config.penalty.clone(),
        ));
        Self::new(
            ledger,
            BidRecorder::new(store),
            config.pricing.clone(),
            config.scoring.clone(),
        )
    }

    pub fn ledger(&self) -> &Arc<AccountLedger> {
        &self.ledger
    }

    pub fn recorder(&self) -> &BidRecorder {
        &self.recorder
    }

    /// Run a round and return the winning team.
    pub async fn run_auction(&self, bids: &[Bid]) -> Result<String> {
        self.run_round(bids).await.map(|outcome| outcome.winner.team_id)
    }

    /// Run a round and return the settled winner with its price.
    ///
    /// A failure at any step leaves earlier audit records in place. If the
    /// winner's debit loses a race with another round the error is
    /// returned as is; the runner-up is not tried.
    pub async fn run_round(&self, bids: &[Bid]) -> Result<RoundOutcome> {
        let round_id = Uuid::new_v4();
        debug!("Round {} {} {} bids", round_id, RoundPhase::Collecting, bids.len());

        let mut best: Option<Candidate<'_>> = None;
        let mut recorded = 0;

        for bid in bids {
            let (balance, reputation) = self.ledger.get_balance(&bid.team_id).await?;

            let score = self.scoring.score(bid.priority, reputation);
            let cost = self.pricing.price(bid.priority, reputation);

            // record before the affordability check so every priced bid is audited
            self.recorder.record(bid, cost, score).await?;
            recorded += 1;

            if balance < cost {
                warn!(
                    "Team {} has insufficient tokens to bid (balance: {}, bid_cost: {})",
                    bid.team_id, balance, cost
                );
                continue;
            }

            // strict comparison: equal scores keep the earlier bid
            if best.as_ref().map_or(true, |current| score > current.score) {
                best = Some(Candidate { bid, cost, score });
            }
        }
        debug!("Round {} {} done, {} recorded", round_id, RoundPhase::Scoring, recorded);

        let Some(winner) = best else {
            info!("Round {} ended in {}", round_id, RoundPhase::NoWinner);
            return Err(AuctionError::NoWinner);
        };

        debug!("Round {} {} team {}", round_id, RoundPhase::Settling, winner.bid.team_id);
        let balance = self
            .ledger
            .debit(&winner.bid.team_id, winner.cost, winner.bid.priority)
            .await?;

        info!(
            "Team {} won the auction for user {} with a bid of {} tokens",
            winner.bid.team_id, winner.bid.target, winner.cost
        );

        Ok(RoundOutcome {
            winner: winner.bid.clone(),
            cost: winner.cost,
            score: winner.score,
            balance,
            recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountMutation, MemoryStore, Precondition, StoreError};
    use crate::types::{Account, BidRecord, Priority};
    use async_trait::async_trait;

    fn p(v: i64) -> Priority {
        Priority::new(v).unwrap()
    }

    fn engine_over(store: Arc<dyn LedgerStore>) -> AuctionEngine {
        AuctionEngine::from_config(store, &Config::default())
    }

    async fn engine_with_teams(teams: &[&str]) -> (AuctionEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_over(store.clone());
        engine.ledger().initialize_all(teams).await.unwrap();
        (engine, store)
    }

    async fn set_account(store: &MemoryStore, team: &str, balance: i64, reputation: i64) {
        let account = store.get_account(team).await.unwrap().unwrap();
        store
            .update(
                team,
                &AccountMutation::adjust_reputation(reputation - account.reputation_score, 0),
            )
            .await
            .unwrap();
        store
            .update(
                team,
                &AccountMutation {
                    balance_delta: balance - account.token_balance,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RoundPhase::NoWinner.to_string(), "no_winner");
        assert_eq!(RoundPhase::Settling.to_string(), "settling");
    }

    #[tokio::test]
    async fn test_single_affordable_bid_wins() {
        let (engine, _) = engine_with_teams(&["team-a"]).await;
        let winner = engine
            .run_auction(&[Bid::new("team-a", "user-1", p(1))])
            .await
            .unwrap();
        assert_eq!(winner, "team-a");
        assert_eq!(engine.ledger().get_balance("team-a").await.unwrap().0, 999);
    }

    #[tokio::test]
    async fn test_zero_score_bid_can_win() {
        let (engine, store) = engine_with_teams(&["team-a"]).await;
        set_account(&store, "team-a", 1000, 0).await;

        let outcome = engine
            .run_round(&[Bid::new("team-a", "user-1", p(1))])
            .await
            .unwrap();
        assert_eq!(outcome.score, 0.0);
        // 1 * 2.5
        assert_eq!(outcome.cost, 2);
    }

    #[tokio::test]
    async fn test_equal_scores_first_bid_wins() {
        let (engine, _) = engine_with_teams(&["team-a", "team-b"]).await;
        let bids = [
            Bid::new("team-b", "user-1", p(6)),
            Bid::new("team-a", "user-1", p(6)),
        ];
        assert_eq!(engine.run_auction(&bids).await.unwrap(), "team-b");
        assert_eq!(engine.ledger().get_balance("team-a").await.unwrap().0, 1000);
    }

    #[tokio::test]
    async fn test_reputation_weighs_in_score() {
        let (engine, store) = engine_with_teams(&["team-a", "team-b"]).await;
        set_account(&store, "team-a", 1000, 100).await;
        set_account(&store, "team-b", 1000, 50).await;

        let bids = [
            Bid::new("team-b", "user-1", p(5)),
            Bid::new("team-a", "user-1", p(9)),
        ];
        let outcome = engine.run_round(&bids).await.unwrap();
        assert_eq!(outcome.winner.team_id, "team-a");
        assert_eq!(outcome.cost, 7);
        assert_eq!(outcome.balance, 993);
        assert_eq!(outcome.recorded, 2);
        assert!((outcome.score - 92.222).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_unaffordable_bid_is_skipped_but_recorded() {
        let (engine, store) = engine_with_teams(&["rich", "poor"]).await;
        set_account(&store, "poor", 3, 100).await;

        let bids = [
            Bid::new("poor", "user-1", p(10)),
            Bid::new("rich", "user-1", p(2)),
        ];
        assert_eq!(engine.run_auction(&bids).await.unwrap(), "rich");
        assert_eq!(engine.recorder().history("poor").await.unwrap().len(), 1);
        assert_eq!(engine.ledger().get_balance("poor").await.unwrap().0, 3);
    }

    #[tokio::test]
    async fn test_no_winner() {
        let (engine, store) = engine_with_teams(&["team-a"]).await;
        set_account(&store, "team-a", 3, 100).await;

        let err = engine
            .run_auction(&[Bid::new("team-a", "user-1", p(4))])
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::NoWinner));

        let history = engine.recorder().history("team-a").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].cost, 5);
        assert_eq!(engine.ledger().get_balance("team-a").await.unwrap().0, 3);
    }

    #[tokio::test]
    async fn test_empty_round_has_no_winner() {
        let (engine, _) = engine_with_teams(&[]).await;
        assert!(matches!(
            engine.run_auction(&[]).await,
            Err(AuctionError::NoWinner)
        ));
    }

    #[tokio::test]
    async fn test_unknown_team_aborts_round() {
        let (engine, _) = engine_with_teams(&["team-a"]).await;
        let bids = [
            Bid::new("team-a", "user-1", p(3)),
            Bid::new("ghost", "user-1", p(10)),
        ];
        let err = engine.run_auction(&bids).await.unwrap_err();
        assert!(matches!(err, AuctionError::AccountNotFound(team) if team == "ghost"));

        // the first bid stays recorded, nobody is charged
        assert_eq!(engine.recorder().history("team-a").await.unwrap().len(), 1);
        assert_eq!(engine.ledger().get_balance("team-a").await.unwrap().0, 1000);
    }

    /// Store whose bid table is down.
    struct AuditOutage(MemoryStore);

    #[async_trait]
    impl LedgerStore for AuditOutage {
        async fn insert_account(&self, account: &Account) -> std::result::Result<(), StoreError> {
            self.0.insert_account(account).await
        }

        async fn get_account(
            &self,
            team_id: &str,
        ) -> std::result::Result<Option<Account>, StoreError> {
            self.0.get_account(team_id).await
        }

        async fn conditional_update(
            &self,
            team_id: &str,
            precondition: Precondition,
            mutation: &AccountMutation,
        ) -> std::result::Result<Account, StoreError> {
            self.0.conditional_update(team_id, precondition, mutation).await
        }

        async fn append_bid(&self, _record: &BidRecord) -> std::result::Result<(), StoreError> {
            Err(StoreError::Unavailable("bids table offline".to_string()))
        }

        async fn bids_for_team(
            &self,
            team_id: &str,
        ) -> std::result::Result<Vec<BidRecord>, StoreError> {
            self.0.bids_for_team(team_id).await
        }
    }

    #[tokio::test]
    async fn test_recording_failure_aborts_round() {
        let store = Arc::new(AuditOutage(MemoryStore::new()));
        let engine = engine_over(store);
        engine.ledger().initialize("team-a").await.unwrap();

        let err = engine
            .run_auction(&[Bid::new("team-a", "user-1", p(9))])
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::RecordingFailed { .. }));
        assert_eq!(engine.ledger().get_balance("team-a").await.unwrap().0, 1000);
    }

    /// Store that drains the balance between the round's read and its debit.
    struct RacingStore(MemoryStore);

    #[async_trait]
    impl LedgerStore for RacingStore {
        async fn insert_account(&self, account: &Account) -> std::result::Result<(), StoreError> {
            self.0.insert_account(account).await
        }

        async fn get_account(
            &self,
            team_id: &str,
        ) -> std::result::Result<Option<Account>, StoreError> {
            self.0.get_account(team_id).await
        }

        async fn conditional_update(
            &self,
            team_id: &str,
            precondition: Precondition,
            mutation: &AccountMutation,
        ) -> std::result::Result<Account, StoreError> {
            if let Precondition::BalanceAtLeast(_) = precondition {
                let drain = AccountMutation {
                    balance_delta: -995,
                    ..Default::default()
                };
                self.0.update(team_id, &drain).await?;
            }
            self.0.conditional_update(team_id, precondition, mutation).await
        }

        async fn append_bid(&self, record: &BidRecord) -> std::result::Result<(), StoreError> {
            self.0.append_bid(record).await
        }

        async fn bids_for_team(
            &self,
            team_id: &str,
        ) -> std::result::Result<Vec<BidRecord>, StoreError> {
            self.0.bids_for_team(team_id).await
        }
    }

    #[tokio::test]
    async fn test_lost_debit_race_fails_round_without_fallback() {
        let store = Arc::new(RacingStore(MemoryStore::new()));
        let engine = engine_over(store);
        engine
            .ledger()
            .initialize_all(["team-a", "team-b"])
            .await
            .unwrap();

        let bids = [
            Bid::new("team-a", "user-1", p(10)),
            Bid::new("team-b", "user-1", p(1)),
        ];
        let err = engine.run_auction(&bids).await.unwrap_err();
        assert!(matches!(
            err,
            AuctionError::InsufficientBalance { ref team_id, cost: 10 } if team_id == "team-a"
        ));
        assert_eq!(engine.ledger().get_balance("team-a").await.unwrap().0, 5);
        assert_eq!(engine.ledger().get_balance("team-b").await.unwrap().0, 1000);
    }

    /// Store whose reputation writes fail after the debit has landed.
    struct PenaltyOutage(MemoryStore);

    #[async_trait]
    impl LedgerStore for PenaltyOutage {
        async fn insert_account(&self, account: &Account) -> std::result::Result<(), StoreError> {
            self.0.insert_account(account).await
        }

        async fn get_account(
            &self,
            team_id: &str,
        ) -> std::result::Result<Option<Account>, StoreError> {
            self.0.get_account(team_id).await
        }

        async fn conditional_update(
            &self,
            team_id: &str,
            precondition: Precondition,
            mutation: &AccountMutation,
        ) -> std::result::Result<Account, StoreError> {
            if mutation.reputation_delta != 0 {
                return Err(StoreError::Unavailable("down".to_string()));
            }
            self.0.conditional_update(team_id, precondition, mutation).await
        }

        async fn append_bid(&self, record: &BidRecord) -> std::result::Result<(), StoreError> {
            self.0.append_bid(record).await
        }

        async fn bids_for_team(
            &self,
            team_id: &str,
        ) -> std::result::Result<Vec<BidRecord>, StoreError> {
            self.0.bids_for_team(team_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_penalty_keeps_debit() {
        let store = Arc::new(PenaltyOutage(MemoryStore::new()));
        let engine = engine_over(store);
        engine.ledger().initialize("team-a").await.unwrap();
        let bid = [Bid::new("team-a", "user-1", p(10))];

        for _ in 0..5 {
            engine.run_round(&bid).await.unwrap();
        }
        let err = engine.run_round(&bid).await.unwrap_err();
        assert!(matches!(err, AuctionError::Store(StoreError::Unavailable(_))));

        let account = engine.ledger().account("team-a").await.unwrap();
        assert_eq!(account.token_balance, 940);
        assert_eq!(account.reputation_score, 100);
        assert_eq!(account.usage(p(10)), 6);
    }
}
