// ===============================
// src/domain.rs
// ===============================
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Prices are integer ticks at 2 decimals: 100_00 == 100.00 quote units.
pub const PX_SCALE: f64 = 100.0;

pub fn px_to_quote(px: i64) -> f64 {
    px as f64 / PX_SCALE
}

pub fn now_ns() -> i128 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    MarketMaking,
    Arbitrage,
    Momentum,
    MeanReversion,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::MarketMaking => "market_making",
            StrategyKind::Arbitrage => "arbitrage",
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "mean_reversion",
        }
    }

    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market_making" | "marketmaking" | "mm" => Some(StrategyKind::MarketMaking),
            "arbitrage" | "arb" => Some(StrategyKind::Arbitrage),
            "momentum" | "mom" => Some(StrategyKind::Momentum),
            "mean_reversion" | "meanreversion" | "mr" => Some(StrategyKind::MeanReversion),
            _ => None,
        }
    }

    /// Parses a comma separated list, dropping duplicates and unknown names.
    pub fn parse_many(list: &str) -> Vec<Self> {
        let mut out: Vec<Self> = list.split(',').filter_map(Self::parse_one).collect();
        out.dedup();
        out
    }
}

/// One synthetic market data observation. Produced once by the feed, never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub ts_ns: i128,
    pub symbol: String,
    pub px: i64,
    pub volume: f64,
    pub bid: i64,
    pub ask: i64,
}

impl Tick {
    pub fn spread(&self) -> i64 {
        self.ask - self.bid
    }

    pub fn mid(&self) -> i64 {
        (self.bid + self.ask) / 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub ts_ns: i128,
    pub symbol: String,
    pub side: Side,
    pub px: i64,
    pub qty: f64,
    pub strategy: StrategyKind,
    pub status: OrderStatus,
    /// Profit the originating strategy expects if this order fills, in quote
    /// units. Credited to the aggregate PnL only at fill time.
    pub edge: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Tick(Tick),
    Order(Order),
    Fill(Order),
}

/// Process-wide monotonic order id source. Ids start at 1 and are never
/// reused or reset; the generator is injected into whoever mints orders.
#[derive(Debug)]
pub struct OrderIdGen(AtomicU64);

impl OrderIdGen {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for OrderIdGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign() {
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
    }

    #[test]
    fn order_ids_are_monotonic_from_one() {
        let ids = OrderIdGen::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
    }

    #[test]
    fn parse_many_dedups_and_skips_unknown() {
        let kinds = StrategyKind::parse_many("mm, mm, arbitrage, bogus");
        assert_eq!(
            kinds,
            vec![StrategyKind::MarketMaking, StrategyKind::Arbitrage]
        );
        assert!(StrategyKind::parse_many("").is_empty());
    }

    #[test]
    fn tick_spread_and_mid() {
        let tick = Tick {
            ts_ns: 0,
            symbol: "BTCUSDT".into(),
            px: 100_05,
            volume: 250.0,
            bid: 100_00,
            ask: 100_10,
        };
        assert_eq!(tick.spread(), 10);
        assert_eq!(tick.mid(), 100_05);
    }
}
