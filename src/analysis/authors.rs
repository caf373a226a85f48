//! Block-author listing for the recent blocks of a chain.
//!
//! The chain itself is reached through [`BlockAuthorSource`], implemented by
//! whatever RPC client the surrounding test uses. [`RecordedBlocks`] is a
//! file-backed source for replaying data captured from a previous run.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Read access to block numbers, authors and timestamps of one chain
pub trait BlockAuthorSource {
    /// Number of the current best block
    fn best_block_number(&self) -> Result<u64>;

    /// `(block number, author)` pairs for `start..=end`
    fn authors_in_range(&self, start: u64, end: u64) -> Result<Vec<(u64, String)>>;

    /// Timestamp of a block in milliseconds, when known
    fn block_timestamp_ms(&self, number: u64) -> Option<u64>;
}

/// Block range inspected for a chain whose best block is `current`.
///
/// 40 blocks once the chain has at least 10, otherwise 10, never starting
/// below block 1.
pub fn author_window(current: u64) -> (u64, u64) {
    let window = if current >= 10 { 40 } else { current + 1 };
    let window = window.clamp(10, 60);
    let start = (current + 1).saturating_sub(window).max(1);
    (start, current)
}

/// One listed block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRow {
    pub number: u64,
    pub author: String,
    /// Seconds since the previous block with a known timestamp; 0 when unknown
    pub delta_secs: u64,
}

/// Authors of a block range with per-author counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorReport {
    pub start: u64,
    pub end: u64,
    pub rows: Vec<AuthorRow>,
    /// Sorted by count, highest first; ties keep first-seen order
    pub counts: Vec<(String, usize)>,
}

impl AuthorReport {
    pub fn render_lines(&self, label: &str) -> Vec<String> {
        let mut lines = vec![format!(
            "[{}] Block authors for #{}..#{} ({} blocks):",
            label,
            self.start,
            self.end,
            self.rows.len()
        )];

        let num_width = self.rows.iter().map(|r| r.number).max().unwrap_or(0).to_string().len();
        let delta_width = self.rows.iter().map(|r| r.delta_secs).max().unwrap_or(0).to_string().len();

        for row in &self.rows {
            lines.push(format!(
                "#{:>nw$} (+{:>dw$}s): {}",
                row.number,
                row.delta_secs,
                row.author,
                nw = num_width,
                dw = delta_width
            ));
        }

        lines.push(format!("[{}] Authors summary:", label));
        if self.counts.is_empty() {
            lines.push("  (none)".to_string());
        } else {
            for (author, count) in &self.counts {
                lines.push(format!("  - {}: {}", author, count));
            }
        }

        lines
    }
}

/// List authors of the recent block window of `source`
pub fn summarize_authors(source: &dyn BlockAuthorSource) -> Result<AuthorReport> {
    let current = source.best_block_number()?;
    let (start, end) = author_window(current);
    let pairs = if start <= end {
        source.authors_in_range(start, end)?
    } else {
        Vec::new()
    };

    let mut rows = Vec::with_capacity(pairs.len());
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut prev_ts: Option<u64> = None;

    for (number, author) in pairs {
        let ts = source.block_timestamp_ms(number);
        let delta_secs = match (prev_ts, ts) {
            (Some(prev), Some(now)) => (now.saturating_sub(prev) as f64 / 1000.0).round() as u64,
            _ => 0,
        };
        if ts.is_some() {
            prev_ts = ts;
        }

        match counts.iter_mut().find(|(a, _)| *a == author) {
            Some((_, c)) => *c += 1,
            None => counts.push((author.clone(), 1)),
        }

        rows.push(AuthorRow {
            number,
            author,
            delta_secs,
        });
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));

    log::debug!("Listed {} block authors for #{}..#{}", rows.len(), start, end);

    Ok(AuthorReport {
        start,
        end,
        rows,
        counts,
    })
}

/// One recorded block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedBlock {
    pub number: u64,
    pub author: String,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

/// Blocks captured from a chain, loaded from a JSON array of [`RecordedBlock`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordedBlocks {
    pub blocks: Vec<RecordedBlock>,
}

impl RecordedBlocks {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read recorded blocks from {}", path.display()))?;
        let blocks = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recorded blocks JSON {}", path.display()))?;
        Ok(blocks)
    }
}

impl BlockAuthorSource for RecordedBlocks {
    fn best_block_number(&self) -> Result<u64> {
        Ok(self.blocks.iter().map(|b| b.number).max().unwrap_or(0))
    }

    fn authors_in_range(&self, start: u64, end: u64) -> Result<Vec<(u64, String)>> {
        let mut pairs: Vec<(u64, String)> = self
            .blocks
            .iter()
            .filter(|b| b.number >= start && b.number <= end)
            .map(|b| (b.number, b.author.clone()))
            .collect();
        pairs.sort_by_key(|(n, _)| *n);
        Ok(pairs)
    }

    fn block_timestamp_ms(&self, number: u64) -> Option<u64> {
        self.blocks
            .iter()
            .find(|b| b.number == number)
            .and_then(|b| b.timestamp_ms)
    }
}
