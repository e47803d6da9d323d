//! Canonical writer for the plan notation.
//!
//! Definitions are emitted dependency-first in discovery order, each named
//! composite exactly once, followed by the drive collection referencing them
//! by name. Re-parsing the output and re-writing it yields the same text.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::build::{ActionPatternDesc, CompetenceDesc, PlanDescription};
use crate::plan::Trigger;
use crate::value::Value;

enum Composite<'a> {
    Competence(&'a CompetenceDesc),
    Pattern(&'a ActionPatternDesc),
}

pub fn write(desc: &PlanDescription) -> String {
    let mut composites: HashMap<&str, Composite> = HashMap::new();
    for competence in &desc.competences {
        composites.insert(&competence.name, Composite::Competence(competence));
    }
    for pattern in &desc.patterns {
        composites.insert(&pattern.name, Composite::Pattern(pattern));
    }

    let mut out = String::new();
    let mut emitted = HashSet::new();

    // Reachable definitions, dependencies first.
    for level in &desc.collection.drives {
        for element in level {
            emit_composite(&element.target, &composites, &mut emitted, &mut out);
        }
    }
    // Defined but unreferenced composites still serialize, in declared order.
    for competence in &desc.competences {
        emit_composite(&competence.name, &composites, &mut emitted, &mut out);
    }
    for pattern in &desc.patterns {
        emit_composite(&pattern.name, &composites, &mut emitted, &mut out);
    }

    emit_collection(desc, &mut out);
    out
}

fn emit_composite(
    name: &str,
    composites: &HashMap<&str, Composite>,
    emitted: &mut HashSet<String>,
    out: &mut String,
) {
    let Some(composite) = composites.get(name) else {
        return; // a primitive
    };
    if !emitted.insert(name.to_string()) {
        return;
    }
    match composite {
        Composite::Competence(competence) => {
            // Dependencies first; the visited set bounds cycles.
            for level in &competence.elements {
                for element in level {
                    emit_composite(&element.target, composites, emitted, out);
                }
            }
            emit_competence(competence, out);
        }
        Composite::Pattern(pattern) => {
            for element in &pattern.elements {
                emit_composite(element, composites, emitted, out);
            }
            emit_pattern(pattern, out);
        }
    }
}

fn emit_competence(competence: &CompetenceDesc, out: &mut String) {
    let _ = write!(out, "(C {}", competence.name);
    if let Some(goal) = &competence.goal {
        let _ = write!(out, "\n  (goal {})", trigger_text(goal));
    }
    let _ = write!(out, "\n  (elements");
    for level in &competence.elements {
        let _ = write!(out, "\n    (");
        for (index, element) in level.iter().enumerate() {
            if index > 0 {
                out.push(' ');
            }
            let _ = write!(
                out,
                "({} (trigger {}) {}",
                element.name,
                trigger_text(&element.trigger),
                element.target
            );
            if let Some(retries) = element.max_retries {
                let _ = write!(out, " {retries}");
            }
            out.push(')');
        }
        out.push(')');
    }
    out.push_str("))\n\n");
}

fn emit_pattern(pattern: &ActionPatternDesc, out: &mut String) {
    let _ = write!(out, "(AP {} ({}))\n\n", pattern.name, pattern.elements.join(" "));
}

fn emit_collection(desc: &PlanDescription, out: &mut String) {
    let collection = &desc.collection;
    let _ = write!(out, "({} {}", collection.kind, collection.name);
    if let Some(goal) = &collection.goal {
        let _ = write!(out, "\n  (goal {})", trigger_text(goal));
    }
    let _ = write!(out, "\n  (drives");
    for level in &collection.drives {
        let _ = write!(out, "\n    (");
        for (index, element) in level.iter().enumerate() {
            if index > 0 {
                out.push(' ');
            }
            let _ = write!(
                out,
                "({} (trigger {}) {}",
                element.name,
                trigger_text(&element.trigger),
                element.target
            );
            if let Some(freq) = element.max_freq {
                let _ = write!(out, " {freq}");
            }
            out.push(')');
        }
        out.push(')');
    }
    out.push_str("))\n");
}

fn trigger_text(trigger: &Trigger) -> String {
    let readings: Vec<String> = trigger
        .readings
        .iter()
        .map(|reading| match reading.value {
            Some(value) => format!(
                "({} {} {})",
                reading.sense,
                reading.predicate.symbol(),
                value_text(value)
            ),
            None => format!("({})", reading.sense),
        })
        .collect();
    format!("({})", readings.join(" "))
}

// Floats keep a decimal point so they re-parse as floats.
fn value_text(value: Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f:?}"),
    }
}
