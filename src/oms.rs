// ===============================
// src/oms.rs
// ===============================
//
// Order manager: the downstream consumer of the order queue. Simulates venue
// processing latency and a fixed-probability fill per order. Fills land in
// the shared fill log and credit the aggregate PnL with the order's expected
// edge; unfilled orders vanish with no notification upstream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Event, Order, OrderStatus};
use crate::metrics::{FILLS, UNFILLED};
use crate::queue::WaitQueue;
use crate::risk::RiskManager;

/// Orders that made it through the whole pipeline. Guarded by its own lock,
/// independent of the order book; the log owns its orders outright.
#[derive(Debug, Default)]
pub struct FillLog {
    orders: Mutex<Vec<Order>>,
}

impl FillLog {
    pub fn append(&self, order: Order) {
        self.locked().push(order);
    }

    pub fn len(&self) -> usize {
        self.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    /// Point-in-time copy for presentation.
    pub fn snapshot(&self) -> Vec<Order> {
        self.locked().clone()
    }

    fn locked(&self) -> MutexGuard<'_, Vec<Order>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub async fn run(
    cfg: EngineConfig,
    orders: Arc<WaitQueue<Order>>,
    fills: Arc<FillLog>,
    risk: Arc<RiskManager>,
    recorder: Option<mpsc::Sender<Event>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let Some(mut order) = orders.pop(cfg.pop_timeout).await else {
            continue;
        };
        // An order in flight always finishes processing before the running
        // flag is looked at again.
        sleep(cfg.exec_latency).await;
        let filled = rand::thread_rng().gen_bool(cfg.fill_rate);
        if !filled {
            UNFILLED.inc();
            debug!(id = order.id, "order went unfilled, dropping");
            continue;
        }
        order.status = OrderStatus::Filled;
        // Realized PnL reaches the aggregate book only when the order
        // actually fills.
        risk.add_pnl(order.edge);
        FILLS.inc();
        if let Some(tx) = &recorder {
            let _ = tx.try_send(Event::Fill(order.clone()));
        }
        fills.append(order);
    }
    debug!("order manager stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::domain::{Side, StrategyKind};
    use std::time::Duration;

    fn order(id: u64, edge: f64) -> Order {
        Order {
            id,
            ts_ns: 0,
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            px: 100_00,
            qty: 10.0,
            strategy: StrategyKind::MarketMaking,
            status: OrderStatus::Pending,
            edge,
        }
    }

    fn harness(fill_rate: f64) -> (EngineConfig, Arc<WaitQueue<Order>>, Arc<FillLog>, Arc<RiskManager>) {
        let cfg = EngineConfig {
            fill_rate,
            exec_latency: Duration::ZERO,
            pop_timeout: Duration::from_millis(10),
            ..EngineConfig::default()
        };
        let limits = Limits {
            max_position: 10_000.0,
            daily_loss_limit: -5_000.0,
        };
        (
            cfg,
            Arc::new(WaitQueue::new()),
            Arc::new(FillLog::default()),
            Arc::new(RiskManager::new(&limits)),
        )
    }

    #[tokio::test]
    async fn certain_fill_rate_fills_everything() {
        let (cfg, orders, fills, risk) = harness(1.0);
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run(
            cfg,
            orders.clone(),
            fills.clone(),
            risk.clone(),
            None,
            running.clone(),
        ));

        orders.push(order(1, 0.5));
        orders.push(order(2, 0.25));
        orders.push(order(3, 0.25));
        tokio::time::sleep(Duration::from_millis(100)).await;
        running.store(false, Ordering::Relaxed);
        task.await.unwrap();

        let filled = fills.snapshot();
        assert_eq!(filled.len(), 3);
        assert!(filled.iter().all(|o| o.status == OrderStatus::Filled));
        assert_eq!(
            filled.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!((risk.pnl() - 1.0).abs() < 1e-9);
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn zero_fill_rate_fills_nothing() {
        let (cfg, orders, fills, risk) = harness(0.0);
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run(
            cfg,
            orders.clone(),
            fills.clone(),
            risk.clone(),
            None,
            running.clone(),
        ));

        orders.push(order(1, 0.5));
        orders.push(order(2, 0.5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        running.store(false, Ordering::Relaxed);
        task.await.unwrap();

        assert!(fills.is_empty());
        assert_eq!(risk.pnl(), 0.0);
        assert!(orders.is_empty());
    }
}
