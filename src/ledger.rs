//! Account ledger
//!
//! Owns per-team token balance, reputation and priority usage. Every
//! mutation goes through the store's atomic update; the ledger keeps no
//! in-process lock, so concurrent rounds in any number of processes are
//! serialized only by the store's conditional write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AuctionError, Result};
use crate::store::{now_ms, AccountMutation, LedgerStore, Precondition, StoreError};
use crate::types::{Account, Priority};

pub const INITIAL_TOKEN_COUNT: i64 = 1000;
pub const INITIAL_REPUTATION_SCORE: i64 = 100;

/// Debits at the abuse priority tolerated before the penalty applies.
pub const ABUSE_THRESHOLD: i64 = 5;
pub const REPUTATION_PENALTY: i64 = 10;

/// Starting values written by initialize and refill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub initial_balance: i64,
    pub initial_reputation: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: INITIAL_TOKEN_COUNT,
            initial_reputation: INITIAL_REPUTATION_SCORE,
        }
    }
}

/// When a debit over the abuse threshold costs reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyMode {
    /// Every debit that leaves the usage count above the threshold.
    #[default]
    EveryDebit,
    /// Only the debit that first crosses the threshold.
    OncePerBreach,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyPolicy {
    pub abuse_priority: Priority,
    pub threshold: i64,
    pub reputation_penalty: i64,
    pub mode: PenaltyMode,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            abuse_priority: Priority::HIGHEST,
            threshold: ABUSE_THRESHOLD,
            reputation_penalty: REPUTATION_PENALTY,
            mode: PenaltyMode::EveryDebit,
        }
    }
}

impl PenaltyPolicy {
    /// Whether the debit that produced `account` should be penalized.
    ///
    /// The usage checked is always the abuse priority's, whatever priority
    /// the debit itself was made at.
    pub fn applies_to(&self, priority: Priority, account: &Account) -> bool {
        let usage = account.usage(self.abuse_priority);
        match self.mode {
            PenaltyMode::EveryDebit => usage > self.threshold,
            PenaltyMode::OncePerBreach => {
                priority == self.abuse_priority && usage == self.threshold + 1
            }
        }
    }
}

pub struct AccountLedger {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
    penalty: PenaltyPolicy,
}

impl AccountLedger {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig, penalty: PenaltyPolicy) -> Self {
        Self {
            store,
            config,
            penalty,
        }
    }

    /// Create the team's account unless it already exists.
    ///
    /// Returns `true` when a new account was written. Re-running is safe.
    pub async fn initialize(&self, team_id: &str) -> Result<bool> {
        let account = Account::new(
            team_id,
            self.config.initial_balance,
            self.config.initial_reputation,
            now_ms(),
        );

        match self.store.insert_account(&account).await {
            Ok(()) => {
                info!(
                    "Initialized team {} with {} tokens",
                    team_id, self.config.initial_balance
                );
                Ok(true)
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!("Team {} already exists", team_id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Initialize every team in order, stopping at the first store failure.
    pub async fn initialize_all<I, S>(&self, teams: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut created = 0;
        for team_id in teams {
            if self.initialize(team_id.as_ref()).await? {
                created += 1;
            }
        }
        Ok(created)
    }

    pub async fn account(&self, team_id: &str) -> Result<Account> {
        self.store
            .get_account(team_id)
            .await?
            .ok_or_else(|| AuctionError::AccountNotFound(team_id.to_string()))
    }

    /// Current `(balance, reputation)` of a team.
    pub async fn get_balance(&self, team_id: &str) -> Result<(i64, i64)> {
        let account = self.account(team_id).await?;
        Ok((account.token_balance, account.reputation_score))
    }

    /// Spend `cost` tokens at `priority` and return the new balance.
    ///
    /// The balance check, the decrement and the usage increment are one
    /// conditional write. The reputation penalty that may follow is a
    /// second, independent write: if it fails the debit stays applied.
    pub async fn debit(&self, team_id: &str, cost: i64, priority: Priority) -> Result<i64> {
        if cost < 0 {
            return Err(AuctionError::InvalidCost(cost));
        }

        let mutation = AccountMutation::debit(cost, priority, now_ms());
        let account = match self
            .store
            .conditional_update(team_id, Precondition::BalanceAtLeast(cost), &mutation)
            .await
        {
            Ok(account) => account,
            Err(StoreError::PreconditionFailed) => {
                warn!(
                    "Debit of {} tokens rejected for team {}: insufficient balance",
                    cost, team_id
                );
                return Err(AuctionError::InsufficientBalance {
                    team_id: team_id.to_string(),
                    cost,
                });
            }
            Err(StoreError::NotFound(_)) => {
                return Err(AuctionError::AccountNotFound(team_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Debited {} tokens from team {} at priority {} (balance: {})",
            cost, team_id, priority, account.token_balance
        );

        if self.penalty.applies_to(priority, &account) {
            self.apply_penalty(team_id, account.usage(self.penalty.abuse_priority))
                .await?;
        }

        Ok(account.token_balance)
    }

    async fn apply_penalty(&self, team_id: &str, usage: i64) -> Result<i64> {
        let mutation = AccountMutation::adjust_reputation(-self.penalty.reputation_penalty, now_ms());
        let account = self.store.update(team_id, &mutation).await?;
        warn!(
            "Team {} used priority {} {} times, reputation reduced by {} to {}",
            team_id,
            self.penalty.abuse_priority,
            usage,
            self.penalty.reputation_penalty,
            account.reputation_score
        );
        Ok(account.reputation_score)
    }

    /// Reset balance and reputation to their initial values. Priority
    /// usage is kept.
    pub async fn refill(&self, team_id: &str) -> Result<()> {
        let mutation = AccountMutation::refill(
            self.config.initial_balance,
            self.config.initial_reputation,
            now_ms(),
        );
        match self.store.update(team_id, &mutation).await {
            Ok(_) => {
                info!("Refilled team {}", team_id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(AuctionError::AccountNotFound(team_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn refill_all<I, S>(&self, teams: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for team_id in teams {
            self.refill(team_id.as_ref()).await?;
        }
        Ok(())
    }
}
