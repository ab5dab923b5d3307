// Append-only JSONL logs, one per collection

use crate::error::PersistenceError;
use fs2::FileExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Append a batch of entries under an exclusive file lock.
///
/// The batch is written with a single `write_all` and fsync'd before
/// returning, so the whole batch becomes durable at once.
pub fn append_batch(path: &Path, entries: &[Value]) -> Result<(), PersistenceError> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut buf = String::new();
    for entry in entries {
        buf.push_str(&serde_json::to_string(entry)?);
        buf.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    file.write_all(buf.as_bytes())?;
    file.sync_all()?;
    // Lock is released when file is dropped

    debug!(file = ?path, count = entries.len(), "Appended JSONL batch");
    Ok(())
}

/// Tombstone entry marking `id` deleted as of `updated_at`
pub fn tombstone(id: &str, updated_at: i64) -> Value {
    serde_json::json!({
        "id": id,
        "deleted": true,
        "updated_at": updated_at,
    })
}

pub fn is_tombstone(entry: &Value) -> bool {
    entry.get("deleted").and_then(Value::as_bool).unwrap_or(false)
}

/// Read a log, returning the latest entry per id.
///
/// Entries without an `id` or with unparseable JSON are skipped with a
/// warning; I/O errors abort the read. On equal `updated_at` the later line
/// wins, matching append order.
pub fn read_latest(path: &Path) -> Result<HashMap<String, Value>, PersistenceError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut latest: HashMap<String, Value> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(file = ?path, line = line_num + 1, error = ?e, "Line is not valid UTF-8, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if line.trim().is_empty() {
            continue;
        }

        let entry: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = ?path, line = line_num + 1, error = ?e, "Failed to parse JSON, skipping");
                continue;
            }
        };

        let Some(id) = entry.get("id").and_then(Value::as_str).map(str::to_string) else {
            warn!(file = ?path, line = line_num + 1, "Entry has no id, skipping");
            continue;
        };
        let updated_at = entry.get("updated_at").and_then(Value::as_i64).unwrap_or(0);

        let newer = latest
            .get(&id)
            .and_then(|existing| existing.get("updated_at").and_then(Value::as_i64))
            .is_none_or(|existing| updated_at >= existing);
        if newer {
            latest.insert(id, entry);
        }
    }

    info!(file = ?path, count = latest.len(), "Loaded latest entries from JSONL");
    Ok(latest)
}

/// Modification time of a file in milliseconds since the epoch
pub fn file_mtime(path: &Path) -> Result<i64, PersistenceError> {
    let mtime = std::fs::metadata(path)?
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(mtime)
}

/// fsync an existing log file; missing files are fine
pub fn flush(path: &Path) -> Result<(), PersistenceError> {
    if path.exists() {
        OpenOptions::new().append(true).open(path)?.sync_all()?;
    }
    Ok(())
}
