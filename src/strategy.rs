// ===============================
// src/strategy.rs
// ===============================
//
// Four signal generators share one capability: look at the latest tick and
// the current book, return candidate orders. Strategies never talk to each
// other and keep no shared state; everything cross-cutting (activation flag,
// notional PnL, trade count, order id minting) lives in StrategyHandle.
//
// A strategy must never stall the trading loop: it reads the book without
// holding the engine's attention and any panic inside `on_tick` is contained
// at the call site and treated as "no signal this tick".

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::error;

use crate::accum::AtomicF64;
use crate::book::OrderBook;
use crate::domain::{now_ns, px_to_quote, Order, OrderIdGen, OrderStatus, Side, StrategyKind, Tick};
use crate::metrics::SIGNALS;

/// One candidate order plus the profit the strategy expects to capture from
/// it, in quote units.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub side: Side,
    pub px: i64,
    pub qty: f64,
    pub edge: f64,
}

pub trait SignalGen: Send {
    fn on_tick(&mut self, tick: &Tick, book: &OrderBook) -> Vec<Candidate>;
}

/// Wraps a signal generator with the per-strategy shared state the rest of
/// the system reads: activation flag, notional PnL, trade counter. Also
/// mints order ids from the injected process-wide generator.
pub struct StrategyHandle {
    kind: StrategyKind,
    active: AtomicBool,
    pnl: AtomicF64,
    trades: AtomicU64,
    ids: Arc<OrderIdGen>,
    inner: Mutex<Box<dyn SignalGen>>,
}

impl StrategyHandle {
    pub fn new(kind: StrategyKind, gen: Box<dyn SignalGen>, ids: Arc<OrderIdGen>) -> Self {
        Self {
            kind,
            active: AtomicBool::new(true),
            pnl: AtomicF64::default(),
            trades: AtomicU64::new(0),
            ids,
            inner: Mutex::new(gen),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn pnl(&self) -> f64 {
        self.pnl.get()
    }

    pub fn trades(&self) -> u64 {
        self.trades.load(Ordering::Relaxed)
    }

    /// Runs the generator against the current tick and converts its
    /// candidates into pending orders. Inactive strategies emit nothing; a
    /// panicking generator is logged and emits nothing.
    pub fn generate(&self, tick: &Tick, book: &OrderBook) -> Vec<Order> {
        if !self.is_active() {
            return Vec::new();
        }
        let mut inner = self.locked();
        let candidates = match panic::catch_unwind(AssertUnwindSafe(|| inner.on_tick(tick, book))) {
            Ok(candidates) => candidates,
            Err(_) => {
                error!(strategy = self.name(), "signal generation panicked, no signal this tick");
                Vec::new()
            }
        };
        drop(inner);
        if candidates.is_empty() {
            return Vec::new();
        }

        // Notional PnL is credited when the signal is emitted; the realized
        // counterpart lands on the aggregate book only at fill time.
        self.pnl.add(candidates.iter().map(|c| c.edge).sum());
        self.trades.fetch_add(1, Ordering::Relaxed);
        SIGNALS.with_label_values(&[self.name()]).inc();

        candidates
            .into_iter()
            .map(|c| Order {
                id: self.ids.next_id(),
                ts_ns: now_ns(),
                symbol: tick.symbol.clone(),
                side: c.side,
                px: c.px,
                qty: c.qty,
                strategy: self.kind,
                status: OrderStatus::Pending,
                edge: c.edge,
            })
            .collect()
    }

    fn locked(&self) -> MutexGuard<'_, Box<dyn SignalGen>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the registry in registration order; the engine iterates it in this
/// exact order on every tick.
pub fn build(kinds: &[StrategyKind], ids: &Arc<OrderIdGen>) -> Vec<Arc<StrategyHandle>> {
    kinds
        .iter()
        .map(|kind| {
            let gen: Box<dyn SignalGen> = match kind {
                StrategyKind::MarketMaking => Box::new(MarketMaking::default()),
                StrategyKind::Arbitrage => Box::new(Arbitrage::default()),
                StrategyKind::Momentum => Box::new(Momentum::default()),
                StrategyKind::MeanReversion => Box::new(MeanReversion::default()),
            };
            Arc::new(StrategyHandle::new(*kind, gen, ids.clone()))
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Market making: when the book spread is wide enough, quote one tick inside
// both sides and book the captured spread as the expected edge.
// -----------------------------------------------------------------------------
pub struct MarketMaking {
    spread_threshold: i64,
    quote_qty: f64,
    tick_size: i64,
}

impl MarketMaking {
    pub fn new(spread_threshold: i64, quote_qty: f64) -> Self {
        Self {
            spread_threshold,
            quote_qty,
            tick_size: 1,
        }
    }
}

impl Default for MarketMaking {
    fn default() -> Self {
        Self::new(2, 10.0)
    }
}

impl SignalGen for MarketMaking {
    fn on_tick(&mut self, _tick: &Tick, book: &OrderBook) -> Vec<Candidate> {
        let (Some(best_bid), Some(best_ask)) = book.best_bid_ask() else {
            return Vec::new();
        };
        if best_ask - best_bid <= self.spread_threshold {
            return Vec::new();
        }

        let buy_px = best_bid + self.tick_size;
        let sell_px = best_ask - self.tick_size;
        // No matching happens here; the "captured" spread is the edge the
        // quote pair would earn if both sides filled.
        let captured = px_to_quote(sell_px - buy_px) * self.quote_qty;
        vec![
            Candidate {
                side: Side::Buy,
                px: buy_px,
                qty: self.quote_qty,
                edge: captured / 2.0,
            },
            Candidate {
                side: Side::Sell,
                px: sell_px,
                qty: self.quote_qty,
                edge: captured / 2.0,
            },
        ]
    }
}

// -----------------------------------------------------------------------------
// Arbitrage: fade any move larger than the threshold: sell after an up-move,
// buy after a down-move. The first observed tick only seeds the baseline.
// -----------------------------------------------------------------------------
pub struct Arbitrage {
    move_threshold: i64,
    qty: f64,
    last_px: Option<i64>,
}

impl Arbitrage {
    pub fn new(move_threshold: i64, qty: f64) -> Self {
        Self {
            move_threshold,
            qty,
            last_px: None,
        }
    }
}

impl Default for Arbitrage {
    fn default() -> Self {
        Self::new(5, 5.0)
    }
}

impl SignalGen for Arbitrage {
    fn on_tick(&mut self, tick: &Tick, _book: &OrderBook) -> Vec<Candidate> {
        let Some(last) = self.last_px.replace(tick.px) else {
            return Vec::new();
        };
        let delta = tick.px - last;
        if delta.abs() <= self.move_threshold {
            return Vec::new();
        }
        let side = if delta > 0 { Side::Sell } else { Side::Buy };
        vec![Candidate {
            side,
            px: tick.px,
            qty: self.qty,
            edge: px_to_quote(delta.abs()) * self.qty,
        }]
    }
}

// -----------------------------------------------------------------------------
// Momentum: ride a streak. After `streak_len` consecutive mid moves in the
// same direction, emit one order in that direction and start over.
// -----------------------------------------------------------------------------
pub struct Momentum {
    streak_len: u32,
    qty: f64,
    last_mid: Option<i64>,
    dir: i8,
    run: u32,
    run_move: i64,
}

impl Momentum {
    pub fn new(streak_len: u32, qty: f64) -> Self {
        Self {
            streak_len,
            qty,
            last_mid: None,
            dir: 0,
            run: 0,
            run_move: 0,
        }
    }
}

impl Default for Momentum {
    fn default() -> Self {
        Self::new(3, 5.0)
    }
}

impl SignalGen for Momentum {
    fn on_tick(&mut self, tick: &Tick, _book: &OrderBook) -> Vec<Candidate> {
        let mid = tick.mid();
        let Some(last) = self.last_mid.replace(mid) else {
            return Vec::new();
        };
        let delta = mid - last;
        let dir: i8 = match delta {
            d if d > 0 => 1,
            d if d < 0 => -1,
            _ => 0,
        };
        if dir == 0 || dir != self.dir {
            self.dir = dir;
            self.run = u32::from(dir != 0);
            self.run_move = delta;
            return Vec::new();
        }

        self.run += 1;
        self.run_move += delta;
        if self.run < self.streak_len {
            return Vec::new();
        }

        let side = if dir > 0 { Side::Buy } else { Side::Sell };
        let edge = px_to_quote(self.run_move.abs()) * self.qty;
        let px = if dir > 0 { tick.ask } else { tick.bid };
        self.dir = 0;
        self.run = 0;
        self.run_move = 0;
        vec![Candidate {
            side,
            px,
            qty: self.qty,
            edge,
        }]
    }
}

// -----------------------------------------------------------------------------
// Mean reversion: rolling mid-price mean over a fixed window; buy when the
// ask trades below the mean minus an edge, sell when the bid trades above it.
// -----------------------------------------------------------------------------
pub struct MeanReversion {
    window: VecDeque<i64>,
    sum: i64,
    w: usize,
    edge_ticks: i64,
    qty: f64,
}

impl MeanReversion {
    pub fn new(w: usize, edge_ticks: i64, qty: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(w),
            sum: 0,
            w,
            edge_ticks,
            qty,
        }
    }
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self::new(20, 3, 5.0)
    }
}

impl SignalGen for MeanReversion {
    fn on_tick(&mut self, tick: &Tick, _book: &OrderBook) -> Vec<Candidate> {
        if self.window.len() == self.w {
            if let Some(x) = self.window.pop_front() {
                self.sum -= x;
            }
        }
        let mid = tick.mid();
        self.window.push_back(mid);
        self.sum += mid;
        if self.window.len() < self.w {
            return Vec::new();
        }

        let fair = self.sum / self.w as i64;
        if tick.ask < fair - self.edge_ticks {
            return vec![Candidate {
                side: Side::Buy,
                px: tick.ask,
                qty: self.qty,
                edge: px_to_quote(fair - tick.ask) * self.qty,
            }];
        }
        if tick.bid > fair + self.edge_ticks {
            return vec![Candidate {
                side: Side::Sell,
                px: tick.bid,
                qty: self.qty,
                edge: px_to_quote(tick.bid - fair) * self.qty,
            }];
        }
        Vec::new()
    }
}
