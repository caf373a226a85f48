//! Line-level assertions over node logs.
//!
//! Only single-line entries are supported: every expected or forbidden entry
//! is matched as a substring of one line.

use super::types::DiagnosticError;

/// Lines shown before and after the line of interest in failure messages
const CONTEXT_LINES: usize = 3;

fn context_around(lines: &[&str], idx: usize) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let start = idx.saturating_sub(CONTEXT_LINES);
    let end = (idx + CONTEXT_LINES).min(lines.len() - 1);
    lines[start..=end].join("\n")
}

/// Check that every entry of `expected` appears, in order, on successive lines.
///
/// A line satisfies at most one entry. On failure the error names the first
/// missing entry and shows the lines around the last one found.
pub fn check_logs_in_order(text: &str, expected: &[&str]) -> Result<(), DiagnosticError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut next = 0;
    let mut last_found = 0;

    for (i, line) in lines.iter().enumerate() {
        if next == expected.len() {
            break;
        }
        if line.contains(expected[next]) {
            next += 1;
            last_found = i;
        }
    }

    if next == expected.len() {
        return Ok(());
    }

    Err(DiagnosticError::MissingLog {
        missing: expected[next].to_string(),
        context: context_around(&lines, last_found),
    })
}

/// Check that no line contains any entry of `forbidden`.
///
/// Fails on the first offending line, reporting its 1-based number.
pub fn check_logs_absent(text: &str, forbidden: &[&str]) -> Result<(), DiagnosticError> {
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if let Some(entry) = forbidden.iter().find(|f| line.contains(**f)) {
            return Err(DiagnosticError::ForbiddenLog {
                entry: entry.to_string(),
                line: i + 1,
                context: context_around(&lines, i),
            });
        }
    }

    Ok(())
}
