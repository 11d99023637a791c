// ===============================
// src/book.rs
// ===============================
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::px_to_quote;

#[derive(Debug, Default)]
struct Ladder {
    bids: BTreeMap<i64, f64>,
    asks: BTreeMap<i64, f64>,
}

/// Two-sided price ladder for one symbol, guarded by a single mutex.
///
/// Writes are snapshot-style: each update replaces the resting quantity at
/// that exact price; a non-positive quantity removes the level outright, so
/// zero-quantity levels are never stored. Readers and writers share the one
/// critical section; there is no shared-read fast path.
#[derive(Debug, Default)]
pub struct OrderBook {
    inner: Mutex<Ladder>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_bid(&self, px: i64, qty: f64) {
        let mut ladder = self.locked();
        if qty > 0.0 {
            ladder.bids.insert(px, qty);
        } else {
            ladder.bids.remove(&px);
        }
    }

    pub fn update_ask(&self, px: i64, qty: f64) {
        let mut ladder = self.locked();
        if qty > 0.0 {
            ladder.asks.insert(px, qty);
        } else {
            ladder.asks.remove(&px);
        }
    }

    /// Tightest resting prices; `None` on an empty side.
    pub fn best_bid_ask(&self) -> (Option<i64>, Option<i64>) {
        let ladder = self.locked();
        let best_bid = ladder.bids.last_key_value().map(|(px, _)| *px);
        let best_ask = ladder.asks.first_key_value().map(|(px, _)| *px);
        (best_bid, best_ask)
    }

    /// Best ask minus best bid, or 0 while either side is empty.
    pub fn spread(&self) -> i64 {
        let ladder = self.locked();
        match (ladder.bids.last_key_value(), ladder.asks.first_key_value()) {
            (Some((bid, _)), Some((ask, _))) => ask - bid,
            _ => 0,
        }
    }

    /// Read-only snapshot of the top `n` levels per side, bids descending and
    /// asks ascending. Presentation only; nothing in the pipeline depends on
    /// it.
    pub fn depth(&self, n: usize) -> DepthSnapshot {
        let ladder = self.locked();
        DepthSnapshot {
            bids: ladder
                .bids
                .iter()
                .rev()
                .take(n)
                .map(|(px, qty)| (*px, *qty))
                .collect(),
            asks: ladder
                .asks
                .iter()
                .take(n)
                .map(|(px, qty)| (*px, *qty))
                .collect(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Ladder> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    pub bids: Vec<(i64, f64)>,
    pub asks: Vec<(i64, f64)>,
}

impl DepthSnapshot {
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.first().map(|(px, _)| *px)
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.asks.first().map(|(px, _)| *px)
    }
}

impl fmt::Display for DepthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "side |    price |   size")?;
        for (px, qty) in self.asks.iter().rev() {
            writeln!(f, " ask | {:>8.2} | {:>6.1}", px_to_quote(*px), qty)?;
        }
        writeln!(f, "-----+----------+-------")?;
        for (px, qty) in &self.bids {
            writeln!(f, " bid | {:>8.2} | {:>6.1}", px_to_quote(*px), qty)?;
        }
        Ok(())
    }
}
