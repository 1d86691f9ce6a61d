use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::Record;

/// Reads the persisted time series.
///
/// A missing file is an empty series. Both a bare JSON array and an object
/// with a `rows` array are accepted; anything else is an error.
pub fn read_rows(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        info!("{} does not exist yet, starting empty", path.display());
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let rows = match json {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove("rows") {
            Some(rows @ Value::Array(_)) => rows,
            _ => return Err(anyhow!("{} has no `rows` array", path.display())),
        },
        _ => return Err(anyhow!("{} is neither an array nor an object", path.display())),
    };

    let rows: Vec<Record> = serde_json::from_value(rows)
        .with_context(|| format!("{} contains malformed records", path.display()))?;
    debug!("Loaded {} records from {}", rows.len(), path.display());
    Ok(rows)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces `path` with `data` via a synced sibling temp file and a rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = temp_path(path);
    let mut file =
        File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(data)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    drop(file);

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Pretty-printed JSON array with a trailing newline.
pub fn write_rows(path: &Path, rows: &[Record]) -> Result<()> {
    let mut body = serde_json::to_string_pretty(rows).context("Failed to serialize records")?;
    body.push('\n');
    atomic_write(path, body.as_bytes())?;
    debug!("Wrote {} records to {}", rows.len(), path.display());
    Ok(())
}
