// ===============================
// src/engine.rs
// ===============================
//
// The orchestrator. Owns the queues, the book, the risk gate, and the
// strategy registry; spawns one task per responsibility (feed, trading loop,
// order manager) and joins them all on stop. The trading loop is the only
// writer of the order book.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::book::OrderBook;
use crate::config::{EngineConfig, Limits};
use crate::domain::{Event, Order, OrderIdGen, Tick};
use crate::feed;
use crate::metrics::{ORDERS_ACCEPTED, ORDERS_REJECTED};
use crate::oms::{self, FillLog};
use crate::queue::WaitQueue;
use crate::risk::RiskManager;
use crate::strategy::{self, StrategyHandle};

pub struct Engine {
    cfg: EngineConfig,
    ticks: Arc<WaitQueue<Tick>>,
    orders: Arc<WaitQueue<Order>>,
    book: Arc<OrderBook>,
    risk: Arc<RiskManager>,
    strategies: Arc<Vec<Arc<StrategyHandle>>>,
    fills: Arc<FillLog>,
    recorder: Option<mpsc::Sender<Event>>,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    pub fn new(cfg: EngineConfig, limits: Limits, recorder: Option<mpsc::Sender<Event>>) -> Self {
        let ids = Arc::new(OrderIdGen::new());
        let strategies = Arc::new(strategy::build(&cfg.strategies, &ids));
        Self {
            cfg,
            ticks: Arc::new(WaitQueue::new()),
            orders: Arc::new(WaitQueue::new()),
            book: Arc::new(OrderBook::new()),
            risk: Arc::new(RiskManager::new(&limits)),
            strategies,
            fills: Arc::new(FillLog::default()),
            recorder,
            running: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }

    /// Spawns the feed, the trading loop, and the order manager. Calling
    /// `start` on a running engine is a no-op.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.tasks.push(tokio::spawn(feed::run(
            self.cfg.clone(),
            self.ticks.clone(),
            self.recorder.clone(),
            self.running.clone(),
        )));
        self.tasks.push(tokio::spawn(oms::run(
            self.cfg.clone(),
            self.orders.clone(),
            self.fills.clone(),
            self.risk.clone(),
            self.recorder.clone(),
            self.running.clone(),
        )));
        self.tasks.push(tokio::spawn(trade_loop(
            self.cfg.clone(),
            self.ticks.clone(),
            self.orders.clone(),
            self.book.clone(),
            self.risk.clone(),
            self.strategies.clone(),
            self.recorder.clone(),
            self.running.clone(),
        )));
        info!(strategies = self.strategies.len(), "engine started");
    }

    /// Signals every worker to wind down and waits for all of them, so no
    /// background work outlives the call. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Toggle surface for the console: an out-of-range index is ignored.
    pub fn set_strategy_active(&self, index: usize, active: bool) {
        if let Some(handle) = self.strategies.get(index) {
            handle.set_active(active);
            info!(strategy = handle.name(), active, "strategy toggled");
        }
    }

    pub fn toggle_strategy(&self, index: usize) {
        if let Some(handle) = self.strategies.get(index) {
            self.set_strategy_active(index, !handle.is_active());
        }
    }

    pub fn strategies(&self) -> &[Arc<StrategyHandle>] {
        &self.strategies
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn fills(&self) -> &FillLog {
        &self.fills
    }

    /// (tick queue, order queue) depths; advisory snapshots.
    pub fn queue_depths(&self) -> (usize, usize) {
        (self.ticks.len(), self.orders.len())
    }
}

#[allow(clippy::too_many_arguments)]
async fn trade_loop(
    cfg: EngineConfig,
    ticks: Arc<WaitQueue<Tick>>,
    orders: Arc<WaitQueue<Order>>,
    book: Arc<OrderBook>,
    risk: Arc<RiskManager>,
    strategies: Arc<Vec<Arc<StrategyHandle>>>,
    recorder: Option<mpsc::Sender<Event>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        // The bounded wait doubles as the shutdown polling interval.
        let Some(tick) = ticks.pop(cfg.pop_timeout).await else {
            continue;
        };
        on_tick(
            &tick,
            &cfg,
            &book,
            &risk,
            &strategies,
            &orders,
            recorder.as_ref(),
        );
    }
    debug!("trading loop stopped");
}

/// One full pipeline pass for a single tick: refresh the synthetic ladder,
/// then let every active strategy quote against it, gating each candidate
/// through risk before it reaches the order queue. Strategies run in
/// registration order, so risk checks serialize within the tick.
pub(crate) fn on_tick(
    tick: &Tick,
    cfg: &EngineConfig,
    book: &OrderBook,
    risk: &RiskManager,
    strategies: &[Arc<StrategyHandle>],
    orders: &WaitQueue<Order>,
    recorder: Option<&mpsc::Sender<Event>>,
) {
    refresh_ladder(book, tick, cfg.book_levels);

    for handle in strategies {
        if !handle.is_active() {
            continue;
        }
        for order in handle.generate(tick, book) {
            match risk.check_order(&order) {
                Ok(()) => {
                    let (side, qty) = (order.side, order.qty);
                    ORDERS_ACCEPTED.inc();
                    if let Some(tx) = recorder {
                        let _ = tx.try_send(Event::Order(order.clone()));
                    }
                    orders.push(order);
                    risk.apply_position(side, qty);
                }
                Err(err) => {
                    ORDERS_REJECTED.inc();
                    warn!(%err, strategy = handle.name(), "order rejected");
                }
            }
        }
    }
}

/// Rewrites a band of synthetic levels around the tick's quote. Each write
/// replaces whatever was resting at that exact price; levels further out
/// from previous ticks simply stay behind.
fn refresh_ladder(book: &OrderBook, tick: &Tick, levels: usize) {
    let mut rng = rand::thread_rng();
    for i in 0..levels as i64 {
        book.update_bid(tick.bid - i, rng.gen_range(1.0..50.0));
        book.update_ask(tick.ask + i, rng.gen_range(1.0..50.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, Side, StrategyKind};
    use std::time::Duration;

    fn tick(bid: i64, ask: i64) -> Tick {
        Tick {
            ts_ns: 0,
            symbol: "BTCUSDT".into(),
            px: (bid + ask) / 2,
            volume: 500.0,
            bid,
            ask,
        }
    }

    fn harness(
        limits: Limits,
        kinds: &[StrategyKind],
    ) -> (
        EngineConfig,
        Arc<OrderBook>,
        Arc<RiskManager>,
        Vec<Arc<StrategyHandle>>,
        Arc<WaitQueue<Order>>,
    ) {
        let cfg = EngineConfig::default();
        let ids = Arc::new(crate::domain::OrderIdGen::new());
        (
            cfg,
            Arc::new(OrderBook::new()),
            Arc::new(RiskManager::new(&limits)),
            strategy::build(kinds, &ids),
            Arc::new(WaitQueue::new()),
        )
    }

    #[tokio::test]
    async fn wide_spread_tick_flows_through_to_the_order_queue() {
        let (cfg, book, risk, strategies, orders) = harness(
            Limits {
                max_position: 10_000.0,
                daily_loss_limit: -5_000.0,
            },
            &[StrategyKind::MarketMaking],
        );

        on_tick(
            &tick(100_00, 100_10),
            &cfg,
            &book,
            &risk,
            &strategies,
            &orders,
            None,
        );

        // ladder got rewritten around the quote
        assert_eq!(book.best_bid_ask(), (Some(100_00), Some(100_10)));
        let depth = book.depth(cfg.book_levels);
        assert_eq!(depth.bids.len(), cfg.book_levels);
        assert_eq!(depth.asks.len(), cfg.book_levels);

        // quote pair accepted and queued in order
        assert_eq!(orders.len(), 2);
        let buy = orders.pop(Duration::from_millis(10)).await.unwrap();
        let sell = orders.pop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(buy.side, Side::Buy);
        assert_eq!(buy.px, 100_01);
        assert_eq!(sell.side, Side::Sell);
        assert_eq!(sell.px, 100_09);
        assert!(buy.status == OrderStatus::Pending && sell.status == OrderStatus::Pending);

        // balanced pair nets the position out
        assert_eq!(risk.position(), 0.0);
    }

    #[tokio::test]
    async fn risk_rejections_never_reach_the_queue() {
        let (cfg, book, risk, strategies, orders) = harness(
            Limits {
                max_position: 5.0, // below the market-making quote size
                daily_loss_limit: -5_000.0,
            },
            &[StrategyKind::MarketMaking],
        );

        on_tick(
            &tick(100_00, 100_10),
            &cfg,
            &book,
            &risk,
            &strategies,
            &orders,
            None,
        );

        assert!(orders.is_empty());
        assert_eq!(risk.position(), 0.0);
        // the strategy still saw the tick and credited its own notional PnL
        assert_eq!(strategies[0].trades(), 1);
    }

    #[tokio::test]
    async fn inactive_strategies_are_skipped() {
        let (cfg, book, risk, strategies, orders) = harness(
            Limits {
                max_position: 10_000.0,
                daily_loss_limit: -5_000.0,
            },
            &[StrategyKind::MarketMaking, StrategyKind::Arbitrage],
        );
        strategies[0].set_active(false);

        on_tick(
            &tick(100_00, 100_10),
            &cfg,
            &book,
            &risk,
            &strategies,
            &orders,
            None,
        );

        // market making is off and arbitrage only seeded its baseline
        assert!(orders.is_empty());
    }
}
