//! The two timing disciplines that pace the tick loop.
//!
//! [`SteppedTimer`] supplies a deterministic logical clock: one unit per tick,
//! no sleeping. [`RealTimeTimer`] reports wall-clock milliseconds and paces
//! the loop toward a target period, compensating for the observed per-tick
//! processing cost with a short rolling window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples kept in the real-time pacing window.
const PACING_WINDOW: usize = 5;

/// Logical clock consumed by readiness checks; paces the tick loop.
pub trait Timer: Send {
    /// Current time in timer units (ticks or milliseconds since reset).
    fn time(&mut self) -> i64;
    /// Called once at the end of every tick.
    fn loop_end(&mut self);
    /// Block until the next tick is due. May return immediately.
    fn loop_wait(&mut self);
    /// Restart the clock from zero.
    fn reset(&mut self);
}

/// Logical-step clock: advances by exactly 1 per tick, never sleeps.
#[derive(Debug, Default)]
pub struct SteppedTimer {
    now: i64,
}

impl SteppedTimer {
    pub fn new() -> SteppedTimer {
        SteppedTimer::default()
    }
}

impl Timer for SteppedTimer {
    fn time(&mut self) -> i64 {
        self.now
    }

    fn loop_end(&mut self) {
        self.now += 1;
    }

    fn loop_wait(&mut self) {
        // Pacing is external in stepped mode.
    }

    fn reset(&mut self) {
        self.now = 0;
    }
}

/// Wall-clock timer pacing the loop toward a target period.
#[derive(Debug)]
pub struct RealTimeTimer {
    base: Instant,
    target_period: Duration,
    last_return: Instant,
    observed: VecDeque<Duration>,
}

impl RealTimeTimer {
    pub fn new(target_period: Duration) -> RealTimeTimer {
        let now = Instant::now();
        RealTimeTimer {
            base: now,
            target_period,
            last_return: now,
            observed: VecDeque::with_capacity(PACING_WINDOW),
        }
    }
}

impl Timer for RealTimeTimer {
    fn time(&mut self) -> i64 {
        self.base.elapsed().as_millis() as i64
    }

    fn loop_end(&mut self) {}

    fn loop_wait(&mut self) {
        if self.observed.len() == PACING_WINDOW {
            self.observed.pop_front();
        }
        self.observed.push_back(self.last_return.elapsed());
        if let Some(residual) = pacing_residual(self.target_period, self.observed.make_contiguous())
        {
            std::thread::sleep(residual);
        }
        self.last_return = Instant::now();
    }

    fn reset(&mut self) {
        let now = Instant::now();
        self.base = now;
        self.last_return = now;
        self.observed.clear();
    }
}

/// Residual sleep needed to hold `target`: `target - avg(window)` when
/// positive, `None` when the loop is already at or behind the target period
/// (graceful degradation under overload, no catch-up bursts).
fn pacing_residual(target: Duration, window: &[Duration]) -> Option<Duration> {
    if window.is_empty() {
        return Some(target);
    }
    let total: Duration = window.iter().sum();
    let avg = total / window.len() as u32;
    target.checked_sub(avg).filter(|residual| !residual.is_zero())
}
