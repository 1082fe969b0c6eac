//! Line formatting and output.

use crate::config::NORMAL_COLOR;
use crate::error::{Result, StatusError};
use crate::field::FieldTable;
use std::io::Write;

/// Markup placed between two adjacent present fields.
pub const SEPARATOR: &str = " %{F#777777}|%{F#DDDDDD} ";

const LEFT_ALIGN: &str = "%{l}";
const RIGHT_ALIGN: &str = "%{r}";

/// Format the table as one line (including the trailing newline).
///
/// Fields with index `<= cut` form the left-aligned section and the rest the
/// right-aligned one. A section with no present field is left out entirely.
pub fn format_line(table: &FieldTable, cut: usize) -> String {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (index, value) in table.present() {
        if index <= cut {
            left.push(value);
        } else {
            right.push(value);
        }
    }

    let mut line = String::new();
    if !left.is_empty() {
        line.push_str(NORMAL_COLOR);
        line.push_str(LEFT_ALIGN);
        line.push_str(&left.join(SEPARATOR));
    }
    if !right.is_empty() {
        line.push_str(NORMAL_COLOR);
        line.push_str(RIGHT_ALIGN);
        line.push_str(&right.join(SEPARATOR));
    }
    line.push('\n');
    line
}

/// Writes formatted lines to a sink, flushing after every line.
pub struct LineRenderer<W: Write> {
    out: W,
    cut: usize,
    lines_written: u64,
}

impl<W: Write> LineRenderer<W> {
    pub fn new(out: W, cut: usize) -> Self {
        Self {
            out,
            cut,
            lines_written: 0,
        }
    }

    /// Emit exactly one line for the current table.
    pub fn render(&mut self, table: &FieldTable) -> Result<()> {
        let line = format_line(table, self.cut);
        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|source| StatusError::Output { source })?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}
