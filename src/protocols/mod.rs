//! Protocol implementations.
//!
//! - `line`: newline-delimited echo

pub mod line;
