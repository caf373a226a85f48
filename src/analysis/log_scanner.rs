//! Log file discovery and loading.
//!
//! Node processes of a test cluster each write one log file into a shared
//! directory. Files can vanish or be unreadable while a run is in progress,
//! so both listing and loading skip problem entries instead of failing.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};

use super::types::{FileId, LogFile};

/// Default extension of node log files
pub const DEFAULT_LOG_EXTENSION: &str = "log";

/// List files in `dir` whose extension matches `extension` (case-insensitive).
///
/// Only a missing or unreadable `dir` itself is an error. Entries that
/// disappear mid-scan are skipped. The result is sorted by path.
pub fn list_log_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read log directory: {}", dir.display()))?;

    let wanted = extension.trim_start_matches('.');
    let mut files = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
        if !matches {
            continue;
        }

        // Entry may have been removed since read_dir listed it
        match entry.file_type() {
            Ok(ft) if ft.is_file() || ft.is_symlink() => files.push(path),
            Ok(_) => {}
            Err(e) => log::debug!("Skipping {}: {}", path.display(), e),
        }
    }

    files.sort();
    Ok(files)
}

/// Read one log file. Returns `None` (and logs a warning) when it cannot be read.
pub fn read_log_file(path: &Path) -> Option<LogFile> {
    match fs::read(path) {
        Ok(bytes) => Some(LogFile {
            id: FileId::new(path),
            // Node logs may contain invalid UTF-8 from emoji-heavy output being cut mid-write
            content: String::from_utf8_lossy(&bytes).into_owned(),
        }),
        Err(e) => {
            log::warn!("Failed to read log file {}: {}", path.display(), e);
            None
        }
    }
}

/// List and load every log file in `dir`, skipping unreadable ones
pub fn scan_log_dir(dir: &Path, extension: &str) -> Result<Vec<LogFile>> {
    let paths = list_log_files(dir, extension)?;
    log::info!("Found {} log files in {}", paths.len(), dir.display());

    let files: Vec<LogFile> = paths.iter().filter_map(|p| read_log_file(p)).collect();
    if files.len() < paths.len() {
        log::warn!("Skipped {} unreadable log files", paths.len() - files.len());
    }

    Ok(files)
}
