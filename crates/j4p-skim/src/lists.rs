//! Newline-delimited list files and comma-separated inline lists.

use std::path::Path;

use j4p_core::{Error, Result};

/// Parse list-file text: one entry per line, blank lines and `#` comments skipped.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a list file (input partitions or trigger names).
pub fn read_list_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read list file {}: {e}", path.display())))?;
    let entries = parse_list(&text);
    tracing::debug!(path = %path.display(), n = entries.len(), "list file read");
    Ok(entries)
}

/// Split `a,b,c`, trimming entries and dropping empty ones.
pub fn split_inline_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}
