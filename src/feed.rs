// ===============================
// src/feed.rs
// ===============================
//
// Synthetic market data: a multiplicative random walk sampled on a fixed
// cadence, randomized volume, and a constant-width quoted band around the
// walk. Stands in for a real feed; the pipeline only relies on it producing
// a tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{now_ns, Event, Tick, PX_SCALE};
use crate::metrics::TICKS;
use crate::queue::WaitQueue;

pub async fn run(
    cfg: EngineConfig,
    ticks: Arc<WaitQueue<Tick>>,
    recorder: Option<mpsc::Sender<Event>>,
    running: Arc<AtomicBool>,
) {
    let mut base_px = cfg.base_px;
    while running.load(Ordering::Relaxed) {
        // ThreadRng is not Send; keep it inside the iteration, never across
        // an await.
        let (step, volume) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(-0.001..=0.001), rng.gen_range(100.0..1_100.0))
        };
        base_px = (base_px * (1.0 + step)).max(1.0);
        let px = (base_px * PX_SCALE).round() as i64;
        let tick = Tick {
            ts_ns: now_ns(),
            symbol: cfg.symbol.clone(),
            px,
            volume,
            bid: px - cfg.feed_half_spread,
            ask: px + cfg.feed_half_spread,
        };
        if let Some(tx) = &recorder {
            let _ = tx.try_send(Event::Tick(tick.clone()));
        }
        ticks.push(tick);
        TICKS.inc();
        sleep(cfg.tick_interval).await;
    }
    debug!("market data feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn feed_produces_ticks_until_stopped() {
        let cfg = EngineConfig {
            tick_interval: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let ticks = Arc::new(WaitQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run(cfg.clone(), ticks.clone(), None, running.clone()));

        let tick = ticks.pop(Duration::from_secs(1)).await.expect("a tick");
        assert_eq!(tick.symbol, cfg.symbol);
        assert_eq!(tick.ask - tick.bid, 2 * cfg.feed_half_spread);
        assert!(tick.px > 0);
        assert!(tick.volume >= 100.0);

        running.store(false, Ordering::Relaxed);
        task.await.unwrap();
    }
}
