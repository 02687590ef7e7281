//! Bid audit trail
//!
//! Every priced bid gets a write-once record, whether it wins, loses or
//! cannot be afforded. The records are the only history of how often a
//! team asked for each priority.

use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AuctionError, Result};
use crate::store::{now_ms, LedgerStore};
use crate::types::{bid_pk, Bid, BidRecord};

/// Source of unique bid identifiers.
pub trait BidIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// `bid_<uuid v7>`: unique and lexically ordered by creation time.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidBidIds;

impl BidIdSource for UuidBidIds {
    fn next_id(&self) -> String {
        format!("bid_{}", Uuid::now_v7().simple())
    }
}

pub struct BidRecorder {
    store: Arc<dyn LedgerStore>,
    ids: Arc<dyn BidIdSource>,
}

impl BidRecorder {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_ids(store, Arc::new(UuidBidIds))
    }

    pub fn with_ids(store: Arc<dyn LedgerStore>, ids: Arc<dyn BidIdSource>) -> Self {
        Self { store, ids }
    }

    /// Append the audit record of a priced bid.
    pub async fn record(&self, bid: &Bid, cost: i64, score: f64) -> Result<BidRecord> {
        let now = now_ms();
        let bid_id = self.ids.next_id();

        let record = BidRecord {
            pk: bid_pk(&bid.team_id),
            sk: BidRecord::sort_key(&bid.team_id, &bid_id, now),
            target: bid.target.clone(),
            priority: bid.priority.into(),
            cost,
            score,
            created_at_ms: now,
            updated_at_ms: now,
        };

        if let Err(e) = self.store.append_bid(&record).await {
            error!("Failed to record bid {} for team {}: {}", bid_id, bid.team_id, e);
            return Err(AuctionError::RecordingFailed {
                team_id: bid.team_id.clone(),
                source: e,
            });
        }

        debug!(
            "Recorded bid {} for team {} (priority: {}, cost: {}, score: {:.2})",
            bid_id, bid.team_id, bid.priority, cost, score
        );
        Ok(record)
    }

    /// All bids a team has submitted, oldest first.
    pub async fn history(&self, team_id: &str) -> Result<Vec<BidRecord>> {
        Ok(self.store.bids_for_team(team_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Priority;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct SequentialIds(AtomicU64);

    impl BidIdSource for SequentialIds {
        fn next_id(&self) -> String {
            format!("bid_{:04}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn test_uuid_ids_are_unique_and_prefixed() {
        let ids = UuidBidIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a.starts_with("bid_"));
        assert!(!a.contains('#'));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_record_builds_keys() {
        let store = Arc::new(MemoryStore::new());
        let recorder = BidRecorder::with_ids(store, Arc::new(SequentialIds(AtomicU64::new(1))));

        let bid = Bid::new("team-a", "user-9", Priority::new(4).unwrap());
        let record = recorder.record(&bid, 5, 23.33).await.unwrap();

        assert_eq!(record.pk, "bid#team-a");
        assert!(record.sk.starts_with("team-a#bid_0001#"));
        assert_eq!(record.target, "user-9");
        assert_eq!(record.priority, 4);
        assert_eq!(record.cost, 5);
        assert_eq!(record.created_at_ms, record.updated_at_ms);
    }

    #[tokio::test]
    async fn test_history_in_submission_order() {
        let store = Arc::new(MemoryStore::new());
        let recorder = BidRecorder::with_ids(store, Arc::new(SequentialIds(AtomicU64::new(1))));

        for priority in [3, 7, 10] {
            let bid = Bid::new("team-a", "user-1", Priority::new(priority).unwrap());
            recorder.record(&bid, 1, 0.0).await.unwrap();
        }
        let other = Bid::new("team-b", "user-1", Priority::new(1).unwrap());
        recorder.record(&other, 1, 0.0).await.unwrap();

        let history = recorder.history("team-a").await.unwrap();
        let priorities: Vec<i64> = history.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![3, 7, 10]);
    }
}
