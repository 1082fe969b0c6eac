//! Status line rendering.
//!
//! Turns the field table into one lemonbar line. Formatting is pure
//! ([`format_line`]); [`LineRenderer`] adds the write-and-flush step.

pub mod line;

pub use line::{format_line, LineRenderer, SEPARATOR};
