//! Reactive hierarchical-plan execution engine.
//!
//! At each discrete tick the engine selects and fires exactly one primitive
//! action out of a prioritized tree of behavior alternatives, preserving
//! partial progress through composite sub-plans across ticks. The
//! architecture separates concerns:
//!
//! - **[`plan`]**: Pure, deterministic firing logic — the arena of tree
//!   nodes, slip-stack pointers, retry counters, and latch arbitration.
//!   Behaviors are reached only through the registry seam.
//! - **[`behavior`]**: The seam to the host: named actions and senses behind
//!   the [`behavior::Behavior`] trait, indexed by a registry.
//! - **[`build`] / [`lap`]**: Linking a parsed plan description into an
//!   arena, and the textual plan notation it round-trips through.
//! - **[`agent`] / [`timer`]**: The background tick thread, its lifecycle
//!   flags, and the two timing disciplines that pace it.

pub mod agent;
pub mod behavior;
pub mod build;
pub mod config;
pub mod lap;
pub mod latch;
pub mod logging;
pub mod plan;
pub mod script;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod timer;
pub mod value;

pub use agent::{Agent, AgentStatus, ControlError, RunOutcome, TickOutcome};
pub use behavior::{Behavior, BehaviorError, BehaviorRegistry};
pub use build::{build, BuildError, PlanDescription};
pub use plan::{FireResult, NodeId, Plan};
pub use value::{Predicate, Value};
