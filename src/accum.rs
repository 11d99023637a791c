// ===============================
// src/accum.rs
// ===============================
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free `f64` running total over an atomic bit cell.
///
/// `add` retries a compare-and-swap until its delta lands, so no update is
/// ever lost regardless of interleaving; the retry loop is unbounded in
/// theory but settles in a single pass under low contention. `get` is a
/// plain atomic read with no ordering relative to in-flight adds.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn add(&self, delta: f64) {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}
