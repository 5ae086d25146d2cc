//! Append-only run log.
//!
//! Every upsert and every branch outcome is written here, independent of the
//! tracing subscriber the binary installs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use feedmill_shared::{FeedmillError, Result};

/// Sink for timestamped run log lines. Writing never fails the caller.
pub trait RunLog: Send + Sync {
    fn line(&self, message: &str);
}

/// Appends `[<RFC3339>] <message>` to `<dir>/ingest-<YYYY-MM-DD>.log`.
#[derive(Debug)]
pub struct FileRunLog {
    dir: PathBuf,
    // Serializes appends from concurrent branches so lines never interleave.
    lock: Mutex<()>,
}

impl FileRunLog {
    /// Create the log directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| FeedmillError::io(&dir, e))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append(&self, path: &Path, line: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{line}")
    }
}

impl RunLog for FileRunLog {
    fn line(&self, message: &str) {
        let now = Utc::now();
        let path = self
            .dir
            .join(format!("ingest-{}.log", now.format("%Y-%m-%d")));
        let line = format!("[{}] {message}", now.to_rfc3339_opts(SecondsFormat::Millis, true));

        info!(target: "feedmill::runlog", "{message}");
        if let Err(e) = self.append(&path, &line) {
            warn!(path = %path.display(), error = %e, "failed to write run log line");
        }
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct MemoryRunLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages written so far, without timestamps.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl RunLog for MemoryRunLog {
    fn line(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}
