use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;

/// Load glob patterns, one per line. A missing file means no exclusions.
pub fn load(path: &Path) -> Result<Vec<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no ignore file");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let patterns: Vec<String> = contents
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    tracing::debug!(path = %path.display(), count = patterns.len(), "loaded ignore patterns");
    Ok(patterns)
}

/// One archiver exclusion flag per pattern.
pub fn exclude_flags(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|pattern| format!("--exclude={}", pattern))
        .collect()
}
