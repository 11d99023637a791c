// ===============================
// src/risk.rs
// ===============================
use thiserror::Error;

use crate::accum::AtomicF64;
use crate::config::Limits;
use crate::domain::{Order, Side};

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("position limit exceeded (would be {would_be:.1}, cap {cap:.1})")]
    PositionLimit { would_be: f64, cap: f64 },
    #[error("daily loss limit reached (pnl {pnl:.2}, floor {floor:.2})")]
    LossLimit { pnl: f64, floor: f64 },
}

/// Pre-trade gate and sole owner of the aggregate position / PnL pair.
///
/// `check_order` only reads the shared accumulators; it takes no reservation.
/// The engine keeps the check-then-update sequence on its single trading
/// task, which is what makes back-to-back checks within one tick safe. Any
/// future parallel risk evaluation would need an explicit reservation
/// protocol on the position cell.
pub struct RiskManager {
    max_position: f64,
    daily_loss_limit: f64,
    position: AtomicF64,
    pnl: AtomicF64,
}

impl RiskManager {
    pub fn new(limits: &Limits) -> Self {
        Self {
            max_position: limits.max_position,
            daily_loss_limit: limits.daily_loss_limit,
            position: AtomicF64::default(),
            pnl: AtomicF64::default(),
        }
    }

    /// Validates a candidate against the position cap (boundary inclusive)
    /// and the daily loss floor. Rejection is an expected outcome: the
    /// caller logs and drops the order, nothing retries.
    pub fn check_order(&self, order: &Order) -> Result<(), RiskError> {
        let would_be = self.position.get() + order.side.sign() * order.qty;
        if would_be.abs() > self.max_position {
            return Err(RiskError::PositionLimit {
                would_be,
                cap: self.max_position,
            });
        }
        let pnl = self.pnl.get();
        if pnl < self.daily_loss_limit {
            return Err(RiskError::LossLimit {
                pnl,
                floor: self.daily_loss_limit,
            });
        }
        Ok(())
    }

    pub fn apply_position(&self, side: Side, qty: f64) {
        self.position.add(side.sign() * qty);
    }

    pub fn add_pnl(&self, delta: f64) {
        self.pnl.add(delta);
    }

    pub fn position(&self) -> f64 {
        self.position.get()
    }

    pub fn pnl(&self) -> f64 {
        self.pnl.get()
    }
}
