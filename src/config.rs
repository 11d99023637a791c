// ===============================
// src/config.rs
// ===============================
use std::env;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;

use crate::domain::StrategyKind;

/// Command line surface of the simulator. Risk limits come from the
/// environment (see [`Limits`]) so they can live in `.env` next to
/// operational tweaks.
#[derive(Debug, Parser)]
#[command(name = "hftsim", version, about = "simulated concurrent trading pipeline")]
pub struct Args {
    /// Traded symbol (single-symbol system).
    #[arg(long, default_value = "BTCUSDT")]
    pub symbol: String,

    /// Tick generation interval in milliseconds.
    #[arg(long, default_value_t = 1)]
    pub tick_ms: u64,

    /// Probability that a routed order fills, 0.0..=1.0.
    #[arg(long, default_value_t = 0.9)]
    pub fill_rate: f64,

    /// Comma separated strategy set:
    /// market_making,arbitrage,momentum,mean_reversion
    #[arg(long, default_value = "market_making,arbitrage")]
    pub strategies: String,

    /// Prometheus metrics port.
    #[arg(long, default_value_t = 9898)]
    pub metrics_port: u16,

    /// Append pipeline events to this JSONL file.
    #[arg(long)]
    pub record_file: Option<String>,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        let mut strategies = StrategyKind::parse_many(&self.strategies);
        if strategies.is_empty() {
            strategies = EngineConfig::default().strategies;
        }
        EngineConfig {
            symbol: self.symbol.clone(),
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            fill_rate: self.fill_rate.clamp(0.0, 1.0),
            strategies,
            ..EngineConfig::default()
        }
    }
}

/// Aggregate risk limits. `daily_loss_limit` is a floor, normally negative.
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_position: f64,
    pub daily_loss_limit: f64,
}

impl Limits {
    pub fn from_env() -> Self {
        let max_position = env::var("MAX_POSITION")
            .ok()
            .and_then(|x| x.parse().ok())
            .unwrap_or(10_000.0);
        let daily_loss_limit = env::var("DAILY_LOSS_LIMIT")
            .ok()
            .and_then(|x| x.parse().ok())
            .unwrap_or(-5_000.0);
        Self {
            max_position,
            daily_loss_limit,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub symbol: String,
    /// Cadence of the synthetic feed.
    pub tick_interval: Duration,
    /// Starting price of the random walk, in quote units.
    pub base_px: f64,
    /// Half-width of the synthetic quoted spread, in ticks.
    pub feed_half_spread: i64,
    /// Synthetic levels rewritten per side on every tick.
    pub book_levels: usize,
    /// Simulated venue processing latency per order.
    pub exec_latency: Duration,
    /// Probability that an order fills.
    pub fill_rate: f64,
    /// Bounded wait used by the consumer loops; doubles as the shutdown
    /// polling interval.
    pub pop_timeout: Duration,
    pub strategies: Vec<StrategyKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            tick_interval: Duration::from_millis(1),
            base_px: 50_000.0,
            feed_half_spread: 5,
            book_levels: 5,
            exec_latency: Duration::from_micros(100),
            fill_rate: 0.9,
            pop_timeout: Duration::from_millis(100),
            strategies: vec![StrategyKind::MarketMaking, StrategyKind::Arbitrage],
        }
    }
}

pub fn load() -> (Args, Limits) {
    // Read .env first so DAILY_LOSS_LIMIT etc. are visible.
    let _ = dotenv();
    (Args::parse(), Limits::from_env())
}
