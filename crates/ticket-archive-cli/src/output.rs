//! CLI output utilities: plain tables and JSON mode.
//!
//! Every command either prints pretty JSON (`--json`) or a human rendering.
//! Both go to the writer handed to the command so tests can capture them;
//! logs stay on stderr.

use std::io::{IsTerminal, Write};

use serde::Serialize;

use crate::CliResult;

/// Detect whether stdout is a TTY.
#[must_use]
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

// ── Simple table renderer ────────────────────────────────────────────────

/// Auto-sized text table.
pub struct CliTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CliTable {
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    /// Render to a `String`; `tty` adds a bold header and a rule.
    #[must_use]
    pub fn render_to_string(&self, tty: bool) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        let widths = self.column_widths();
        let mut out = String::new();

        let header_line = format_row(&self.headers, &widths);
        if tty {
            out.push_str("\x1b[1m");
            out.push_str(&header_line);
            out.push_str("\x1b[0m\n");
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            out.push_str(&rule.join("──"));
        } else {
            out.push_str(&header_line);
        }
        out.push('\n');

        for row in &self.rows {
            out.push_str(&format_row(row, &widths));
            out.push('\n');
        }
        out
    }
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let last = widths.len().saturating_sub(1);
    let parts: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map_or("", String::as_str);
            if i == last {
                // Last column: no padding
                cell.to_string()
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect();
    parts.join("  ")
}

// ── JSON or human output ─────────────────────────────────────────────────

/// Write `data` as pretty JSON when `json_mode`, otherwise run `render`.
pub fn json_or_text<T, F>(out: &mut dyn Write, json_mode: bool, data: &T, render: F) -> CliResult<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&mut dyn Write) -> CliResult<()>,
{
    if json_mode {
        serde_json::to_writer_pretty(&mut *out, data)?;
        writeln!(out)?;
        Ok(())
    } else {
        render(out)
    }
}
