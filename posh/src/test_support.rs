//! Test-only helpers for constructing plan descriptions and registries.

use crate::behavior::BehaviorRegistry;
use crate::build::{
    CompetenceDesc, CompetenceElementDesc, DriveCollectionDesc, DriveElementDesc, PlanDescription,
};
use crate::plan::{SenseReading, Trigger};
use crate::script::ScriptedBehavior;
use crate::value::Value;

/// Trigger reading the given senses as a conjunction.
pub fn trigger(senses: &[&str]) -> Trigger {
    Trigger::new(senses.iter().map(|sense| SenseReading::new(*sense)).collect())
}

/// Drive element with deterministic defaults and no frequency bound.
pub fn drive(name: &str, sense: &str, target: &str) -> DriveElementDesc {
    DriveElementDesc {
        name: name.to_string(),
        trigger: trigger(&[sense]),
        target: target.to_string(),
        max_freq: None,
    }
}

/// Competence element with deterministic defaults.
pub fn element(name: &str, sense: &str, target: &str, max_retries: Option<u32>) -> CompetenceElementDesc {
    CompetenceElementDesc {
        name: name.to_string(),
        trigger: trigger(&[sense]),
        target: target.to_string(),
        max_retries,
    }
}

/// Competence from priority levels of elements.
pub fn competence(name: &str, levels: Vec<Vec<CompetenceElementDesc>>) -> CompetenceDesc {
    CompetenceDesc {
        name: name.to_string(),
        goal: None,
        elements: levels,
    }
}

/// Stepped drive collection named `life` with no goal.
pub fn stepped_collection(drives: Vec<Vec<DriveElementDesc>>) -> DriveCollectionDesc {
    DriveCollectionDesc {
        kind: "SDC".to_string(),
        name: "life".to_string(),
        goal: None,
        drives,
    }
}

/// Description with no composites.
pub fn flat_plan(drives: Vec<Vec<DriveElementDesc>>) -> PlanDescription {
    PlanDescription {
        collection: stepped_collection(drives),
        competences: Vec::new(),
        patterns: Vec::new(),
    }
}

/// Registry with a single behavior providing the standard scripted
/// fixtures: actions `succeed`/`fail`, senses `yes`/`no`.
pub fn basic_registry() -> BehaviorRegistry {
    let mut registry = BehaviorRegistry::new();
    registry
        .register(Box::new(
            ScriptedBehavior::new("basic")
                .with_action("succeed", true)
                .with_action("fail", false)
                .with_sense("yes", Value::Bool(true))
                .with_sense("no", Value::Bool(false)),
        ))
        .expect("register basic behavior");
    registry
}
