//! Full-pipeline lifecycle tests: feed -> engine -> risk -> order manager.

use std::time::Duration;

use hftsim::config::{EngineConfig, Limits};
use hftsim::domain::{OrderStatus, StrategyKind};
use hftsim::engine::Engine;

fn test_config() -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_millis(1),
        exec_latency: Duration::from_micros(50),
        fill_rate: 1.0,
        pop_timeout: Duration::from_millis(20),
        strategies: vec![StrategyKind::MarketMaking, StrategyKind::Arbitrage],
        ..EngineConfig::default()
    }
}

fn test_limits() -> Limits {
    Limits {
        max_position: 10_000.0,
        daily_loss_limit: -5_000.0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fills_flow_end_to_end_and_stop_joins_everything() {
    let mut engine = Engine::new(test_config(), test_limits(), None);
    engine.start();
    assert!(engine.is_running());
    // start is idempotent
    engine.start();

    tokio::time::sleep(Duration::from_millis(500)).await;

    engine.stop().await;
    assert!(!engine.is_running());

    // the market-making quote pair fires on every tick and everything fills
    let fills = engine.fills().snapshot();
    assert!(!fills.is_empty());
    assert!(fills.iter().all(|o| o.status == OrderStatus::Filled));
    assert!(fills.iter().all(|o| o.id > 0));
    assert!(fills.iter().all(|o| o.symbol == "BTCUSDT"));

    // every accepted order moved the position; the cap was never pierced
    assert!(engine.risk().position().abs() <= 10_000.0);
    // certain fills means the edge of every fill landed on the aggregate PnL
    assert!(engine.risk().pnl() > 0.0);

    // stop is idempotent
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn strategy_toggle_surface() {
    let mut engine = Engine::new(test_config(), test_limits(), None);

    assert_eq!(engine.strategies().len(), 2);
    assert!(engine.strategies()[0].is_active());

    engine.set_strategy_active(0, false);
    assert!(!engine.strategies()[0].is_active());
    engine.toggle_strategy(0);
    assert!(engine.strategies()[0].is_active());

    // out-of-range index is a no-op, not an error
    engine.set_strategy_active(99, false);
    engine.toggle_strategy(99);

    // a deactivated registry produces no orders at all
    engine.set_strategy_active(0, false);
    engine.set_strategy_active(1, false);
    engine.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine.stop().await;

    assert!(engine.fills().is_empty());
    assert_eq!(engine.risk().position(), 0.0);
    let (_, order_depth) = engine.queue_depths();
    assert_eq!(order_depth, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_background_work_after_stop() {
    let mut engine = Engine::new(test_config(), test_limits(), None);
    engine.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    engine.stop().await;

    let fills_at_stop = engine.fills().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    // nothing keeps running in the background after stop returns
    assert_eq!(engine.fills().len(), fills_at_stop);
}
