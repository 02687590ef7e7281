//! End-to-end auction rounds against the embedded stores.

use std::sync::Arc;

use token_auction::config::StorageBackend;
use token_auction::{
    store, AccountMutation, AuctionEngine, AuctionError, Bid, Config, LedgerStore, MemoryStore,
    PenaltyMode, Priority, SqliteStorage,
};

fn p(v: i64) -> Priority {
    Priority::new(v).unwrap()
}

fn sqlite() -> Arc<dyn LedgerStore> {
    Arc::new(SqliteStorage::in_memory().unwrap())
}

fn memory() -> Arc<dyn LedgerStore> {
    Arc::new(MemoryStore::new())
}

async fn start(store: Arc<dyn LedgerStore>, config: &Config, teams: &[&str]) -> AuctionEngine {
    let engine = AuctionEngine::from_config(store, config);
    engine.ledger().initialize_all(teams).await.unwrap();
    engine
}

#[tokio::test]
async fn test_reputation_and_priority_decide_the_winner() {
    for store in [sqlite(), memory()] {
        let engine = start(store.clone(), &Config::default(), &["team-a", "team-b"]).await;
        store
            .update("team-b", &AccountMutation::adjust_reputation(-50, 1))
            .await
            .unwrap();

        let bids = vec![
            Bid::new("team-a", "user-1", p(9)),
            Bid::new("team-b", "user-1", p(5)),
        ];
        let outcome = engine.run_round(&bids).await.unwrap();

        assert_eq!(outcome.winner.team_id, "team-a");
        assert_eq!(outcome.cost, 7);
        assert!((outcome.score - 92.222).abs() < 0.01);
        assert_eq!(outcome.balance, 993);
        assert_eq!(outcome.recorded, 2);

        let (balance, reputation) = engine.ledger().get_balance("team-b").await.unwrap();
        assert_eq!((balance, reputation), (1000, 50));

        let account = engine.ledger().account("team-a").await.unwrap();
        assert_eq!(account.usage(p(9)), 1);
    }
}

#[tokio::test]
async fn test_unaffordable_round_is_still_audited() {
    let mut config = Config::default();
    config.ledger.initial_balance = 3;

    for store in [sqlite(), memory()] {
        let engine = start(store, &config, &["team-a"]).await;

        let err = engine
            .run_auction(&[Bid::new("team-a", "user-1", p(4))])
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::NoWinner));

        let history = engine.recorder().history("team-a").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].cost, 5);
        assert_eq!(history[0].priority, 4);

        let account = engine.ledger().account("team-a").await.unwrap();
        assert_eq!(account.token_balance, 3);
        assert_eq!(account.usage(p(4)), 0);
    }
}

#[tokio::test]
async fn test_tie_goes_to_first_bid() {
    let engine = start(sqlite(), &Config::default(), &["team-a", "team-b"]).await;

    let winner = engine
        .run_auction(&[
            Bid::new("team-b", "user-1", p(6)),
            Bid::new("team-a", "user-1", p(6)),
        ])
        .await
        .unwrap();
    assert_eq!(winner, "team-b");
}

#[tokio::test]
async fn test_repeated_top_priority_costs_reputation() {
    let engine = start(sqlite(), &Config::default(), &["team-a"]).await;
    let bid = [Bid::new("team-a", "user-1", p(10))];

    for _ in 0..5 {
        engine.run_round(&bid).await.unwrap();
    }
    let (balance, reputation) = engine.ledger().get_balance("team-a").await.unwrap();
    assert_eq!((balance, reputation), (950, 100));

    let sixth = engine.run_round(&bid).await.unwrap();
    assert_eq!(sixth.cost, 10);
    let (balance, reputation) = engine.ledger().get_balance("team-a").await.unwrap();
    assert_eq!((balance, reputation), (940, 90));

    // lower reputation raises the price: 10 * 1.15
    let seventh = engine.run_round(&bid).await.unwrap();
    assert_eq!(seventh.cost, 11);
    let (_, reputation) = engine.ledger().get_balance("team-a").await.unwrap();
    assert_eq!(reputation, 80);
}

#[tokio::test]
async fn test_once_per_breach_penalizes_a_single_time() {
    let mut config = Config::default();
    config.penalty.mode = PenaltyMode::OncePerBreach;
    let engine = start(memory(), &config, &["team-a"]).await;
    let bid = [Bid::new("team-a", "user-1", p(10))];

    for _ in 0..8 {
        engine.run_round(&bid).await.unwrap();
    }
    let (_, reputation) = engine.ledger().get_balance("team-a").await.unwrap();
    assert_eq!(reputation, 90);
}

#[tokio::test]
async fn test_refill_restores_balance_but_keeps_usage() {
    let engine = start(sqlite(), &Config::default(), &["team-a"]).await;
    let bid = [Bid::new("team-a", "user-1", p(10))];
    for _ in 0..6 {
        engine.run_round(&bid).await.unwrap();
    }

    engine.ledger().refill("team-a").await.unwrap();

    let account = engine.ledger().account("team-a").await.unwrap();
    assert_eq!(account.token_balance, 1000);
    assert_eq!(account.reputation_score, 100);
    assert_eq!(account.usage(p(10)), 6);

    // usage is still over the threshold, so the next debit is penalized
    engine.run_round(&bid).await.unwrap();
    let (_, reputation) = engine.ledger().get_balance("team-a").await.unwrap();
    assert_eq!(reputation, 90);
}

#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
    let path = std::env::temp_dir().join(format!("auction-{}.db", uuid::Uuid::new_v4()));

    {
        let store: Arc<dyn LedgerStore> = Arc::new(SqliteStorage::new(&path).unwrap());
        let engine = start(store, &Config::default(), &["team-a"]).await;
        engine
            .run_round(&[Bid::new("team-a", "user-1", p(4))])
            .await
            .unwrap();
    }

    let mut config = Config::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.sqlite_path = path.to_string_lossy().into_owned();
    let store = store::open(&config.storage).await.unwrap();
    let engine = AuctionEngine::from_config(store, &config);

    assert!(!engine.ledger().initialize("team-a").await.unwrap());
    let (balance, _) = engine.ledger().get_balance("team-a").await.unwrap();
    assert_eq!(balance, 995);
    assert_eq!(engine.recorder().history("team-a").await.unwrap().len(), 1);

    drop(engine);
    let _ = std::fs::remove_file(&path);
}
