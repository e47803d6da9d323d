//! Scripted behaviors: predetermined action/sense results.
//!
//! Powers the `run` subcommand (scenario TOML files) and the integration
//! tests. A scripted value is either fixed or a per-call sequence whose final
//! entry repeats once the script is exhausted.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::behavior::{Behavior, BehaviorError, BehaviorRegistry};
use crate::latch::Latch;
use crate::value::Value;

/// Shared journal of behavior events, for assertions and the CLI trace.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone)]
enum Script<T> {
    Fixed(T),
    Sequence(Vec<T>, usize),
}

impl<T: Copy> Script<T> {
    fn next(&mut self) -> T {
        match self {
            Script::Fixed(value) => *value,
            Script::Sequence(values, cursor) => {
                let value = values[(*cursor).min(values.len() - 1)];
                *cursor += 1;
                value
            }
        }
    }
}

/// A behavior whose actions and senses return scripted results.
pub struct ScriptedBehavior {
    name: String,
    latched: bool,
    latch: Option<Latch>,
    ready_after: u32,
    ready_polls: u32,
    actions: BTreeMap<String, Script<bool>>,
    action_errors: Vec<String>,
    senses: BTreeMap<String, Script<Value>>,
    journal: Journal,
}

impl ScriptedBehavior {
    pub fn new(name: impl Into<String>) -> ScriptedBehavior {
        ScriptedBehavior {
            name: name.into(),
            latched: false,
            latch: None,
            ready_after: 0,
            ready_polls: 0,
            actions: BTreeMap::new(),
            action_errors: Vec::new(),
            senses: BTreeMap::new(),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_action(mut self, name: impl Into<String>, result: bool) -> Self {
        self.actions.insert(name.into(), Script::Fixed(result));
        self
    }

    /// Action returning each result in turn; the final one repeats.
    pub fn with_action_script(mut self, name: impl Into<String>, results: Vec<bool>) -> Self {
        assert!(!results.is_empty());
        self.actions.insert(name.into(), Script::Sequence(results, 0));
        self
    }

    /// Action that reports a behavior-level failure, aborting the tick loop.
    pub fn with_action_error(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.actions.insert(name.clone(), Script::Fixed(false));
        self.action_errors.push(name);
        self
    }

    pub fn with_sense(mut self, name: impl Into<String>, value: Value) -> Self {
        self.senses.insert(name.into(), Script::Fixed(value));
        self
    }

    /// Sense returning each value in turn; the final one repeats.
    pub fn with_sense_script(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        assert!(!values.is_empty());
        self.senses.insert(name.into(), Script::Sequence(values, 0));
        self
    }

    /// Mark this behavior latched; drive elements triggered off it stick.
    pub fn latched(mut self) -> Self {
        self.latched = true;
        self
    }

    /// Attach a latch that records interrupt requests.
    pub fn with_latch(mut self, latch: Latch) -> Self {
        self.latched = true;
        self.latch = Some(latch);
        self
    }

    /// Report not-ready for the first `polls` readiness checks.
    pub fn ready_after(mut self, polls: u32) -> Self {
        self.ready_after = polls;
        self
    }

    /// Handle to the journal of fired actions and interrupts.
    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    /// Share a journal across behaviors to observe interleaving.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Consume a pending interrupt recorded by the attached latch.
    pub fn take_latch_interrupt(&mut self) -> bool {
        self.latch
            .as_mut()
            .map(Latch::take_interrupt)
            .unwrap_or(false)
    }
}

impl Behavior for ScriptedBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_names(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    fn sense_names(&self) -> Vec<String> {
        self.senses.keys().cloned().collect()
    }

    fn fire_action(&mut self, name: &str) -> Result<bool, BehaviorError> {
        if self.action_errors.iter().any(|n| n == name) {
            return Err(BehaviorError::BehaviorFailed {
                behavior: self.name.clone(),
                message: format!("scripted failure in action \"{name}\""),
            });
        }
        let script = self
            .actions
            .get_mut(name)
            .ok_or_else(|| BehaviorError::NameNotFound {
                kind: "action",
                name: name.to_string(),
            })?;
        let result = script.next();
        self.journal.lock().push(format!("action:{name}"));
        Ok(result)
    }

    fn read_sense(&mut self, name: &str) -> Result<Value, BehaviorError> {
        let script = self
            .senses
            .get_mut(name)
            .ok_or_else(|| BehaviorError::NameNotFound {
                kind: "sense",
                name: name.to_string(),
            })?;
        Ok(script.next())
    }

    fn ready(&mut self) -> bool {
        if self.ready_polls < self.ready_after {
            self.ready_polls += 1;
            return false;
        }
        true
    }

    fn is_latched(&self) -> bool {
        self.latched
    }

    fn signal_interrupt(&mut self) {
        if let Some(latch) = &mut self.latch {
            latch.request_interrupt();
        }
        self.journal.lock().push(format!("interrupt:{}", self.name));
    }
}

/// Scenario file for `posh run`: a list of scripted behaviors (TOML).
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "behavior")]
    pub behaviors: Vec<BehaviorScript>,
}

#[derive(Debug, Deserialize)]
pub struct BehaviorScript {
    pub name: String,
    #[serde(default)]
    pub latched: bool,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionScript>,
    #[serde(default)]
    pub senses: BTreeMap<String, SenseScript>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionScript {
    Fixed(bool),
    Sequence(Vec<bool>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SenseScript {
    Fixed(Value),
    Sequence(Vec<Value>),
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Scenario> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let scenario: Scenario =
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        Ok(scenario)
    }

    /// Instantiate the scripted behaviors into a fresh registry.
    pub fn into_registry(self) -> Result<BehaviorRegistry, BehaviorError> {
        let mut registry = BehaviorRegistry::new();
        for script in self.behaviors {
            let mut behavior = ScriptedBehavior::new(script.name);
            if script.latched {
                behavior = behavior.latched();
            }
            for (name, action) in script.actions {
                behavior = match action {
                    ActionScript::Fixed(result) => behavior.with_action(name, result),
                    ActionScript::Sequence(results) => {
                        empty_script_check(behavior.name(), &name, results.is_empty())?;
                        behavior.with_action_script(name, results)
                    }
                };
            }
            for (name, sense) in script.senses {
                behavior = match sense {
                    SenseScript::Fixed(value) => behavior.with_sense(name, value),
                    SenseScript::Sequence(values) => {
                        empty_script_check(behavior.name(), &name, values.is_empty())?;
                        behavior.with_sense_script(name, values)
                    }
                };
            }
            registry.register(Box::new(behavior))?;
        }
        Ok(registry)
    }
}

fn empty_script_check(behavior: &str, name: &str, empty: bool) -> Result<(), BehaviorError> {
    if empty {
        return Err(BehaviorError::BehaviorFailed {
            behavior: behavior.to_string(),
            message: format!("empty script for \"{name}\""),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_repeat_their_final_entry() {
        let mut behavior = ScriptedBehavior::new("stub").with_action_script("go", vec![true, false]);
        assert!(behavior.fire_action("go").expect("fire"));
        assert!(!behavior.fire_action("go").expect("fire"));
        assert!(!behavior.fire_action("go").expect("fire"));
    }

    #[test]
    fn journal_records_actions_and_interrupts() {
        let mut behavior = ScriptedBehavior::new("stub").latched().with_action("go", true);
        let journal = behavior.journal();
        behavior.fire_action("go").expect("fire");
        behavior.signal_interrupt();
        assert_eq!(*journal.lock(), vec!["action:go", "interrupt:stub"]);
    }

    #[test]
    fn attached_latch_records_interrupts_once_charged() {
        let mut latch = Latch::new(0, 10, 2, 3, 1);
        let mut behavior = ScriptedBehavior::new("guard").with_latch(latch.clone());
        behavior.signal_interrupt();
        // Level 0 is below the interrupt threshold: nothing recorded.
        assert!(!behavior.take_latch_interrupt());

        latch.charge();
        let mut behavior = ScriptedBehavior::new("guard").with_latch(latch);
        behavior.signal_interrupt();
        assert!(behavior.take_latch_interrupt());
        assert!(!behavior.take_latch_interrupt());
    }

    #[test]
    fn ready_after_counts_polls() {
        let mut behavior = ScriptedBehavior::new("stub").ready_after(2);
        assert!(!behavior.ready());
        assert!(!behavior.ready());
        assert!(behavior.ready());
    }

    #[test]
    fn scenario_toml_builds_a_registry() {
        let scenario: Scenario = toml::from_str(
            r#"
            [[behavior]]
            name = "core"
            latched = true

            [behavior.actions]
            eat = true
            wander = [true, false]

            [behavior.senses]
            hungry = true
            energy = 42
            "#,
        )
        .expect("parse");
        let mut registry = scenario.into_registry().expect("registry");
        assert!(registry.has_action("eat"));
        assert!(registry.has_sense("energy"));
        assert!(registry.capability_is_latched("hungry"));
        assert_eq!(registry.read_sense("energy").expect("read"), Value::Int(42));
    }
}
