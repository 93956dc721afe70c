pub mod compare;
pub mod enter;
pub mod evaluate;
pub mod init;
pub mod scales;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};

use evalgrade_core::record::ScoreRecord;

/// Read a JSON array of score records.
pub fn load_records(path: &Path) -> Result<Vec<ScoreRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records from {}", path.display()))?;
    let records: Vec<ScoreRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse records JSON: {}", path.display()))?;
    Ok(records)
}

/// Write score records as a pretty JSON array.
pub fn save_records(path: &Path, records: &[ScoreRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("failed to serialize records")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write records to {}", path.display()))?;
    Ok(())
}
