// src/rate_gates/gate.rs
// A single "next-available-instant" interval gate.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};

use crate::metrics;

/// Throttles callers to at most one pass per `interval`, mirroring the
/// teacher's `utils::rate_limiter::RateLimiter` (a `governor` quota wrapper)
/// but expressed as a minimum spacing rather than a requests-per-minute rate,
/// which is what §4.B's three gates actually need.
pub struct IntervalGate {
    limiter: Arc<GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    label: &'static str,
}

impl IntervalGate {
    pub fn new(interval: Duration, label: &'static str) -> Self {
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()));
        Self {
            limiter: Arc::new(GovRateLimiter::direct(quota)),
            label,
        }
    }

    /// Block until the gate opens, then record this instant as the new
    /// reference point. Reports the wait as a metric (§4.B) so a saturated
    /// send queue shows up as rising `matchmaker_rate_gate_wait_ms`.
    pub async fn acquire(&self) {
        let start = Instant::now();
        self.limiter.until_ready().await;
        metrics::record_rate_gate_wait(self.label, start.elapsed().as_millis() as u64);
    }
}
