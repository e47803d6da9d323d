//! The agent loop: one dedicated tick thread per agent.
//!
//! `stopped → running ⇄ paused → stopped`. The tick thread is the sole
//! mutator of plan state; control methods only touch the two atomic flags,
//! polled at the configured (≤10ms) granularity. Cancellation is
//! cooperative: `stop` takes effect at the next poll point, at most one tick
//! later. The only suspension points are the readiness wait at start and the
//! real-time pacing sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::behavior::{BehaviorError, BehaviorRegistry};
use crate::config::AgentConfig;
use crate::plan::{CollectionKind, FireResult, Plan};
use crate::timer::{RealTimeTimer, SteppedTimer, Timer};

/// Control-method errors: calling a lifecycle operation in the wrong state,
/// or failing the bounded readiness wait.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("agent is already running")]
    AlreadyRunning,

    #[error("cannot {op}: agent is not running")]
    NotRunning { op: &'static str },

    #[error("behaviors not ready within {waited_ms}ms: {}", pending.join(", "))]
    BehaviorsNotReady { pending: Vec<String>, waited_ms: u64 },
}

/// How one tick went, as the loop reads the drive collection's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// An element fired; keep going.
    Followed,
    /// The collection goal fired.
    Won,
    /// No element anywhere was ready.
    Lost,
}

/// Why the tick thread exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    GoalReached,
    PlanLost,
    /// `stop()` was called, or the configured tick limit was reached.
    Stopped { ticks: u64 },
}

/// Running/paused snapshot for the hosting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentStatus {
    pub running: bool,
    pub paused: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    running: AtomicBool,
    paused: AtomicBool,
}

struct Inner {
    plan: Plan,
    registry: BehaviorRegistry,
}

/// Owns one plan, its behavior registry, and the background tick thread.
pub struct Agent {
    shared: Arc<Shared>,
    config: AgentConfig,
    handle: Option<JoinHandle<Result<RunOutcome, BehaviorError>>>,
}

impl Agent {
    pub fn new(plan: Plan, registry: BehaviorRegistry, config: AgentConfig) -> Agent {
        Agent {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { plan, registry }),
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
            }),
            config,
            handle: None,
        }
    }

    /// Start the tick thread. Fails if already running or if any behavior
    /// stays not-ready past the bounded wait (recoverable: retry `start`).
    pub fn start(&mut self) -> Result<(), ControlError> {
        // Reap a loop that already ended on its own; only a live thread
        // counts as running.
        match self.handle.as_ref().map(JoinHandle::is_finished) {
            Some(true) => {
                let _ = self.join();
            }
            Some(false) => return Err(ControlError::AlreadyRunning),
            None => {}
        }

        {
            let mut inner = self.shared.inner.lock();
            let timeout = Duration::from_millis(self.config.readiness_timeout_ms);
            inner
                .registry
                .wait_ready(timeout)
                .map_err(|err| ControlError::BehaviorsNotReady {
                    pending: err.pending,
                    waited_ms: err.waited_ms,
                })?;
        }

        // A fresh timer per run: start resets the clock.
        let mut timer: Box<dyn Timer> = match self.shared.inner.lock().plan.kind() {
            CollectionKind::Stepped => Box::new(SteppedTimer::new()),
            CollectionKind::RealTime => Box::new(RealTimeTimer::new(Duration::from_millis(
                self.config.tick_period_ms,
            ))),
        };
        timer.reset();

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let pause_poll = Duration::from_millis(self.config.pause_poll_ms);
        let max_ticks = self.config.max_ticks;
        info!("agent starting");
        self.handle = Some(std::thread::spawn(move || {
            tick_loop(&shared, timer, pause_poll, max_ticks)
        }));
        Ok(())
    }

    /// Toggle the pause flag. Must only be called while running.
    pub fn pause(&mut self) -> Result<(), ControlError> {
        if self.handle.is_none() {
            return Err(ControlError::NotRunning { op: "pause" });
        }
        let paused = !self.shared.paused.load(Ordering::SeqCst);
        self.shared.paused.store(paused, Ordering::SeqCst);
        info!(paused, "agent pause toggled");
        Ok(())
    }

    /// Clear both flags and join the tick thread. It is this, not thread
    /// cancellation, that ends the loop.
    pub fn stop(&mut self) -> Result<RunOutcome, ControlError> {
        let handle = self
            .handle
            .take()
            .ok_or(ControlError::NotRunning { op: "stop" })?;
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);
        let outcome = match handle.join() {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(%err, "behavior failed before stop");
                RunOutcome::Stopped { ticks: 0 }
            }
            Err(_) => RunOutcome::Stopped { ticks: 0 },
        };
        info!(?outcome, "agent stopped");
        Ok(outcome)
    }

    /// Wait for the loop to end on its own (won, lost, tick limit, or a
    /// behavior error).
    pub fn join(&mut self) -> Result<RunOutcome, BehaviorError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or(Ok(RunOutcome::Stopped { ticks: 0 })),
            None => Ok(RunOutcome::Stopped { ticks: 0 }),
        }
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            running: self.shared.running.load(Ordering::SeqCst),
            paused: self.shared.paused.load(Ordering::SeqCst),
        }
    }

    /// Render the live tree back into its textual notation.
    pub fn serialize_plan(&self) -> String {
        crate::lap::write(&self.shared.inner.lock().plan.describe())
    }
}

fn tick_loop(
    shared: &Shared,
    mut timer: Box<dyn Timer>,
    pause_poll: Duration,
    max_ticks: Option<u64>,
) -> Result<RunOutcome, BehaviorError> {
    let mut ticks = 0u64;
    loop {
        if !shared.running.load(Ordering::SeqCst) {
            return Ok(RunOutcome::Stopped { ticks });
        }
        if shared.paused.load(Ordering::SeqCst) {
            std::thread::sleep(pause_poll);
            continue;
        }
        if let Some(limit) = max_ticks {
            if ticks >= limit {
                shared.running.store(false, Ordering::SeqCst);
                return Ok(RunOutcome::Stopped { ticks });
            }
        }

        let outcome = {
            let mut inner = shared.inner.lock();
            let Inner { plan, registry } = &mut *inner;
            let t = timer.time();
            let result = match plan.fire(registry, t) {
                Ok(result) => result,
                Err(err) => {
                    shared.running.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            };
            match result {
                FireResult::GoalMet => TickOutcome::Won,
                FireResult::Continue => TickOutcome::Followed,
                FireResult::Done | FireResult::Descend(_) => TickOutcome::Lost,
            }
        };
        ticks += 1;
        debug!(tick = ticks, ?outcome, "tick fired");

        match outcome {
            TickOutcome::Won => {
                shared.running.store(false, Ordering::SeqCst);
                return Ok(RunOutcome::GoalReached);
            }
            TickOutcome::Lost => {
                shared.running.store(false, Ordering::SeqCst);
                return Ok(RunOutcome::PlanLost);
            }
            TickOutcome::Followed => {
                timer.loop_end();
                timer.loop_wait();
            }
        }
    }
}
