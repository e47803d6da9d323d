//! Triggers: conjunctions of sense / sense-act readings.

use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorError, BehaviorRegistry};
use crate::value::{compare, Predicate, Value};

/// One reading in a trigger: a named sense (or sense-act) and an optional
/// comparison. Without a comparison value the raw result is used for its
/// truthiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenseReading {
    pub sense: String,
    #[serde(default)]
    pub predicate: Predicate,
    #[serde(default)]
    pub value: Option<Value>,
}

impl SenseReading {
    pub fn new(sense: impl Into<String>) -> SenseReading {
        SenseReading {
            sense: sense.into(),
            predicate: Predicate::default(),
            value: None,
        }
    }

    pub fn comparing(sense: impl Into<String>, predicate: Predicate, value: Value) -> SenseReading {
        SenseReading {
            sense: sense.into(),
            predicate,
            value: Some(value),
        }
    }

    /// Read the sense and evaluate the comparison. Names that resolve to an
    /// action are fired as sense-acts for their boolean result.
    pub fn fires(&self, registry: &mut BehaviorRegistry) -> Result<bool, BehaviorError> {
        let raw = if registry.has_sense(&self.sense) {
            registry.read_sense(&self.sense)?
        } else {
            Value::Bool(registry.fire_action(&self.sense)?)
        };
        Ok(match self.value {
            Some(target) => compare(raw, self.predicate, target),
            None => raw.truthy(),
        })
    }
}

/// Ordered conjunction of readings; fires true iff every reading is true.
/// Triggers hold no mutable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub readings: Vec<SenseReading>,
}

impl Trigger {
    pub fn new(readings: Vec<SenseReading>) -> Trigger {
        Trigger { readings }
    }

    pub fn fires(&self, registry: &mut BehaviorRegistry) -> Result<bool, BehaviorError> {
        for reading in &self.readings {
            if !reading.fires(registry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Capability names read by this trigger, in declared order.
    pub fn capability_names(&self) -> Vec<String> {
        self.readings
            .iter()
            .map(|reading| reading.sense.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorRegistry;
    use crate::script::ScriptedBehavior;

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry
            .register(Box::new(
                ScriptedBehavior::new("stub")
                    .with_sense("hungry", Value::Bool(true))
                    .with_sense("energy", Value::Int(40))
                    .with_action("succeed", true)
                    .with_action("fail", false),
            ))
            .expect("register");
        registry
    }

    #[test]
    fn conjunction_requires_every_reading() {
        let mut registry = registry();
        let both = Trigger::new(vec![
            SenseReading::new("hungry"),
            SenseReading::comparing("energy", Predicate::Lt, Value::Int(50)),
        ]);
        assert!(both.fires(&mut registry).expect("fire"));

        let blocked = Trigger::new(vec![
            SenseReading::new("hungry"),
            SenseReading::comparing("energy", Predicate::Gt, Value::Int(50)),
        ]);
        assert!(!blocked.fires(&mut registry).expect("fire"));
    }

    #[test]
    fn empty_trigger_always_fires() {
        let mut registry = registry();
        assert!(Trigger::default().fires(&mut registry).expect("fire"));
    }

    #[test]
    fn sense_act_uses_action_result() {
        let mut registry = registry();
        assert!(
            SenseReading::new("succeed")
                .fires(&mut registry)
                .expect("fire")
        );
        assert!(!SenseReading::new("fail").fires(&mut registry).expect("fire"));
    }

    #[test]
    fn mismatched_comparison_fails_closed() {
        let mut registry = registry();
        let reading = SenseReading::comparing("energy", Predicate::Eq, Value::Float(40.0));
        assert!(!reading.fires(&mut registry).expect("fire"));
    }
}
