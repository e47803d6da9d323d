//! Agent lifecycle scenarios: pause latency, restart, live serialization.

use std::time::Duration;

use posh::agent::{Agent, RunOutcome};
use posh::behavior::BehaviorRegistry;
use posh::build::build;
use posh::config::AgentConfig;
use posh::lap;
use posh::script::ScriptedBehavior;
use posh::value::Value;

fn paced_agent(plan_text: &str, behavior: ScriptedBehavior, config: AgentConfig) -> Agent {
    let mut registry = BehaviorRegistry::new();
    registry.register(Box::new(behavior)).expect("register");
    let desc = lap::parse(plan_text).expect("parse");
    let plan = build(&desc, &registry).expect("build");
    Agent::new(plan, registry, config)
}

/// Pausing halts ticking within the poll latency; resuming continues it.
#[test]
fn pause_halts_and_resume_continues() {
    let behavior = ScriptedBehavior::new("core")
        .with_action("succeed", true)
        .with_sense("go", Value::Bool(true));
    let journal = behavior.journal();
    // Real-time collection so the loop is paced rather than spinning.
    let mut agent = paced_agent(
        "(RDC life (drives ((only (trigger ((go))) succeed))))",
        behavior,
        AgentConfig {
            tick_period_ms: 5,
            ..AgentConfig::default()
        },
    );

    agent.start().expect("start");
    std::thread::sleep(Duration::from_millis(40));
    agent.pause().expect("pause");
    // One in-flight tick may still land after the flag flips.
    std::thread::sleep(Duration::from_millis(20));
    let paused_at = journal.lock().len();
    assert!(paused_at > 0, "agent ticked before the pause");
    assert!(agent.status().paused);

    std::thread::sleep(Duration::from_millis(50));
    assert!(journal.lock().len() <= paused_at + 1, "agent ticked while paused");

    agent.pause().expect("resume");
    std::thread::sleep(Duration::from_millis(40));
    assert!(journal.lock().len() > paused_at, "agent did not resume");

    agent.stop().expect("stop");
    assert!(!agent.status().running);
}

/// A finished run can be reaped and the agent restarted.
#[test]
fn restart_after_natural_finish() {
    let behavior = ScriptedBehavior::new("core")
        .with_action("succeed", true)
        .with_sense("done", Value::Bool(true))
        .with_sense("go", Value::Bool(true));
    let mut agent = paced_agent(
        "(SDC life (goal ((done))) (drives ((only (trigger ((go))) succeed))))",
        behavior,
        AgentConfig::default(),
    );

    agent.start().expect("start");
    assert_eq!(agent.join().expect("join"), RunOutcome::GoalReached);

    // The previous thread is finished; start must reap it and run again.
    agent.start().expect("restart");
    assert_eq!(agent.join().expect("join"), RunOutcome::GoalReached);
}

/// The live tree serializes back to the plan notation, with shared
/// composites emitted once.
#[test]
fn live_tree_serializes_with_memoized_composites() {
    let behavior = ScriptedBehavior::new("core")
        .with_action("succeed", true)
        .with_sense("go", Value::Bool(true))
        .with_sense("rest", Value::Bool(false));
    let mut registry = BehaviorRegistry::new();
    registry.register(Box::new(behavior)).expect("register");
    let desc = lap::parse(
        r#"
        (C task (elements ((do (trigger ((go))) succeed))))
        (SDC life
          (drives
            ((work (trigger ((go))) task))
            ((relax (trigger ((rest))) task))))
        "#,
    )
    .expect("parse");
    let plan = build(&desc, &registry).expect("build");
    let agent = Agent::new(plan, registry, AgentConfig::default());

    let text = agent.serialize_plan();
    assert_eq!(text.matches("(C task").count(), 1);
    let reparsed = lap::parse(&text).expect("reparse");
    assert_eq!(reparsed, desc);
}
