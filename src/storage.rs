use crate::model::Task;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const TASKS_FILE_NAME: &str = "tasks.json";

/// Fixed store location: `tasks.json` in the user's home directory.
pub fn tasks_file_path() -> Result<PathBuf> {
    let dirs = UserDirs::new().context("locating home directory")?;
    Ok(dirs.home_dir().join(TASKS_FILE_NAME))
}

/// Reads the task file. Never fails: a missing file is an empty list, and a
/// corrupt one is retried leniently entry by entry before giving up. The
/// running session's in-memory list stays authoritative either way.
pub fn load_tasks(path: &Path) -> Vec<Task> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read tasks file, starting empty");
            return Vec::new();
        }
    };
    let text = decode_utf8(&bytes);
    match serde_json::from_str::<Vec<Task>>(&text) {
        Ok(tasks) => tasks
            .into_iter()
            .filter(|task| {
                if task.text.is_empty() {
                    warn!(path = %path.display(), "skipping stored task with empty text");
                    false
                } else {
                    true
                }
            })
            .collect(),
        Err(err) => {
            warn!(path = %path.display(), %err, "strict parse failed, retrying leniently");
            lenient_parse(&text, path)
        }
    }
}

/// Per-entry fallback: malformed records (missing text, unparseable
/// deadline) are skipped rather than failing the whole load.
fn lenient_parse(text: &str, path: &Path) -> Vec<Task> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), %err, "tasks file is not JSON, ignoring contents");
            return Vec::new();
        }
    };
    let Some(entries) = value.as_array() else {
        warn!(path = %path.display(), "tasks file is not a JSON array, ignoring contents");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Task>(entry.clone()) {
            Ok(task) if !task.text.is_empty() => Some(task),
            Ok(_) => {
                warn!(path = %path.display(), "skipping stored task with empty text");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping malformed task entry");
                None
            }
        })
        .collect()
}

/// Whole-file overwrite of the full active list. Output is deterministic, so
/// saving an unchanged list rewrites identical bytes.
pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<()> {
    let serialized = serde_json::to_string_pretty(tasks).context("serializing tasks")?;
    fs::write(path, serialized).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// Tolerates a UTF-8 byte-order mark left by other editors.
fn decode_utf8(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
