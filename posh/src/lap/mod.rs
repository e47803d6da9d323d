//! Reader and writer for the parenthesized plan notation.
//!
//! A plan file is a sequence of top-level forms: named competences (`C`),
//! action patterns (`AP`), and exactly one drive collection (`SDC` for the
//! stepped flavor, `RDC` for real-time):
//!
//! ```text
//! ; comments run to end of line
//! (C sustain
//!   (elements
//!     ((eat-now (trigger ((hungry) (energy < 10))) eat 3))
//!     ((forage (trigger ((hungry))) find-food))))
//!
//! (SDC life
//!   (goal ((dead)))
//!   (drives
//!     ((feed (trigger ((hungry))) sustain 10))
//!     ((idle (trigger ((bored))) wander))))
//! ```
//!
//! A trigger is a list of readings; a reading is a sense name with an
//! optional predicate and comparison value. The trailing number on a drive
//! element is its frequency bound, on a competence element its retry bound;
//! negative numbers disable the bound. [`write`] is the inverse of
//! [`parse`]: canonical layout, each named composite emitted exactly once
//! (definition before first use) and referenced by name thereafter.

mod parse;
mod write;

pub use parse::{parse, ParseError};
pub use write::write;
