//! The behavior seam: named actions and senses supplied by the host.
//!
//! The [`Behavior`] trait decouples the execution tree from whatever embodies
//! the agent. Tree nodes store capability *names*; every invocation goes
//! through the [`BehaviorRegistry`], which owns the registered behaviors and
//! indexes their capabilities. Tests and the `run` subcommand use scripted
//! behaviors that return predetermined results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::value::Value;

/// Errors surfaced by behavior resolution and invocation.
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("no registered behavior provides {kind} \"{name}\"")]
    NameNotFound { kind: &'static str, name: String },

    #[error("capability \"{name}\" registered more than once")]
    DuplicateCapability { name: String },

    /// A behavior reported a runtime error of its own; the tick loop stops.
    #[error("behavior \"{behavior}\" failed: {message}")]
    BehaviorFailed { behavior: String, message: String },
}

/// One or more behaviors failed to report ready within the bounded wait at
/// agent start. Recoverable by retrying `start`.
#[derive(Debug, Error)]
#[error("behaviors not ready within {waited_ms}ms: {}", pending.join(", "))]
pub struct ReadinessTimeout {
    pub pending: Vec<String>,
    pub waited_ms: u64,
}

/// A behavior module: a named bundle of actions and senses.
///
/// Implementations own their internal state; the engine only ever interprets
/// the boolean outcome of an action and the [`Value`] of a sense. Returning
/// `Err` from either call reports a behavior-level failure, which aborts the
/// tick loop.
pub trait Behavior: Send {
    fn name(&self) -> &str;

    /// Action capability names this behavior provides.
    fn action_names(&self) -> Vec<String>;

    /// Sense capability names this behavior provides.
    fn sense_names(&self) -> Vec<String>;

    fn fire_action(&mut self, name: &str) -> Result<bool, BehaviorError>;

    fn read_sense(&mut self, name: &str) -> Result<Value, BehaviorError>;

    /// Polled during agent start until true or the readiness wait expires.
    fn ready(&mut self) -> bool {
        true
    }

    /// Latched behaviors make drive elements whose triggers read them sticky
    /// across ticks.
    fn is_latched(&self) -> bool {
        false
    }

    /// Called when drive arbitration preempts an element backed by this
    /// behavior.
    fn signal_interrupt(&mut self) {}
}

/// Owns registered behaviors and indexes their capabilities by name.
#[derive(Default)]
pub struct BehaviorRegistry {
    behaviors: Vec<Box<dyn Behavior>>,
    actions: HashMap<String, usize>,
    senses: HashMap<String, usize>,
}

impl BehaviorRegistry {
    pub fn new() -> BehaviorRegistry {
        BehaviorRegistry::default()
    }

    /// Register a behavior, indexing its capabilities. Rejects any action or
    /// sense name already claimed by an earlier registration.
    pub fn register(&mut self, behavior: Box<dyn Behavior>) -> Result<(), BehaviorError> {
        let index = self.behaviors.len();
        let action_names = behavior.action_names();
        let sense_names = behavior.sense_names();
        for name in action_names.iter().chain(sense_names.iter()) {
            if self.actions.contains_key(name) || self.senses.contains_key(name) {
                return Err(BehaviorError::DuplicateCapability { name: name.clone() });
            }
        }
        for name in action_names {
            self.actions.insert(name, index);
        }
        for name in sense_names {
            self.senses.insert(name, index);
        }
        self.behaviors.push(behavior);
        Ok(())
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_sense(&self, name: &str) -> bool {
        self.senses.contains_key(name)
    }

    pub fn fire_action(&mut self, name: &str) -> Result<bool, BehaviorError> {
        let index = *self
            .actions
            .get(name)
            .ok_or_else(|| BehaviorError::NameNotFound {
                kind: "action",
                name: name.to_string(),
            })?;
        self.behaviors[index].fire_action(name)
    }

    pub fn read_sense(&mut self, name: &str) -> Result<Value, BehaviorError> {
        let index = *self
            .senses
            .get(name)
            .ok_or_else(|| BehaviorError::NameNotFound {
                kind: "sense",
                name: name.to_string(),
            })?;
        self.behaviors[index].read_sense(name)
    }

    /// Whether the behavior owning this capability (sense first, then
    /// sense-act) is latched. Unknown names are not latched.
    pub fn capability_is_latched(&self, name: &str) -> bool {
        self.owner_of(name)
            .map(|index| self.behaviors[index].is_latched())
            .unwrap_or(false)
    }

    /// Signal an interrupt to the behaviors backing the given capabilities.
    /// Each owning behavior is signaled at most once.
    pub fn signal_interrupt_for(&mut self, capabilities: &[String]) {
        let mut owners: Vec<usize> = capabilities
            .iter()
            .filter_map(|name| self.owner_of(name))
            .collect();
        owners.sort_unstable();
        owners.dedup();
        for index in owners {
            if self.behaviors[index].is_latched() {
                self.behaviors[index].signal_interrupt();
            }
        }
    }

    /// Bounded wait for every behavior to report ready, polling at 10ms
    /// granularity. This is one of the two permitted suspension points.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), ReadinessTimeout> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut pending: Vec<String> = Vec::new();
            for behavior in self.behaviors.iter_mut() {
                if !behavior.ready() {
                    pending.push(behavior.name().to_string());
                }
            }
            if pending.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ReadinessTimeout {
                    pending,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn owner_of(&self, name: &str) -> Option<usize> {
        self.senses
            .get(name)
            .or_else(|| self.actions.get(name))
            .copied()
    }
}
