//! Sense values and the comparison predicates used by triggers.
//!
//! Comparison is domain-aware: booleans, integers, and floats each compare in
//! their own domain. A mismatched domain, or an ordering predicate applied to
//! booleans, compares as `false` so a malformed trigger can never take down
//! the tick loop.

use serde::{Deserialize, Serialize};

/// Raw result of reading a sense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Truthiness used for sense-acts (readings without a comparison value).
    pub fn truthy(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
        }
    }
}

/// Comparison predicate for a trigger reading. Defaults to equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Predicate {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Predicate {
    pub fn symbol(self) -> &'static str {
        match self {
            Predicate::Eq => "==",
            Predicate::Ne => "!=",
            Predicate::Lt => "<",
            Predicate::Le => "<=",
            Predicate::Gt => ">",
            Predicate::Ge => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Predicate> {
        match symbol {
            "==" => Some(Predicate::Eq),
            "!=" => Some(Predicate::Ne),
            "<" => Some(Predicate::Lt),
            "<=" => Some(Predicate::Le),
            ">" => Some(Predicate::Gt),
            ">=" => Some(Predicate::Ge),
            _ => None,
        }
    }
}

/// Compare a raw sense reading against a target value.
///
/// Fails closed: unsupported predicate/domain combinations return `false`.
pub fn compare(raw: Value, predicate: Predicate, target: Value) -> bool {
    match (raw, target) {
        (Value::Bool(a), Value::Bool(b)) => match predicate {
            Predicate::Eq => a == b,
            Predicate::Ne => a != b,
            // Ordering on booleans is unsupported.
            _ => false,
        },
        (Value::Int(a), Value::Int(b)) => compare_ord(a.cmp(&b), predicate),
        (Value::Float(a), Value::Float(b)) => match a.partial_cmp(&b) {
            Some(ordering) => compare_ord(ordering, predicate),
            // NaN never compares true, not even with `!=`.
            None => false,
        },
        // Domain mismatch.
        _ => false,
    }
}

fn compare_ord(ordering: std::cmp::Ordering, predicate: Predicate) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match predicate {
        Predicate::Eq => ordering == Equal,
        Predicate::Ne => ordering != Equal,
        Predicate::Lt => ordering == Less,
        Predicate::Le => ordering != Greater,
        Predicate::Gt => ordering == Greater,
        Predicate::Ge => ordering != Less,
    }
}
