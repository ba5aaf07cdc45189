//! Run log
//!
//! One timestamped, append-only log file per Run, plus an in-memory buffer of
//! the operator-visible lines served by the status endpoint. Every line is
//! mirrored to `tracing` at the matching severity, so the artifact and the
//! process log never disagree.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::models::errors::AppResult;
use crate::utils::constants::{LOG_FILE_PREFIX, LOG_FILE_TIMESTAMP};

/// One operator-visible output line
#[derive(Debug, Clone, Serialize)]
pub struct OutputLine {
    pub line: String,
    pub is_error: bool,
}

struct RunLogInner {
    path: PathBuf,
    file: Mutex<File>,
    lines: RwLock<Vec<OutputLine>>,
}

/// Cheaply cloneable handle to one Run's log
#[derive(Clone)]
pub struct RunLog {
    inner: Arc<RunLogInner>,
}

impl RunLog {
    /// Create the log directory if needed and open a fresh timestamped file
    pub fn create(log_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(log_dir)?;

        let timestamp = chrono::Local::now().format(LOG_FILE_TIMESTAMP);
        let path = log_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, timestamp));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            inner: Arc::new(RunLogInner {
                path,
                file: Mutex::new(file),
                lines: RwLock::new(Vec::new()),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn file_name(&self) -> String {
        self.inner
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Operator-visible line at info level
    pub fn info(&self, message: &str) {
        info!("{}", message);
        self.append("INFO", message);
        self.push_line(message, false);
    }

    /// Operator-visible line at warning level
    pub fn warn(&self, message: &str) {
        warn!("{}", message);
        self.append("WARNING", message);
        self.push_line(message, false);
    }

    /// Operator-visible line at error level
    pub fn error(&self, message: &str) {
        error!("{}", message);
        self.append("ERROR", message);
        self.push_line(message, true);
    }

    /// File-only line for payloads and response bodies; not shown in the
    /// status output
    pub fn debug(&self, message: &str) {
        debug!("{}", message);
        self.append("DEBUG", message);
    }

    /// Snapshot of the accumulated operator-visible lines
    pub fn lines(&self) -> Vec<OutputLine> {
        self.inner
            .lines
            .read()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn append(&self, level: &str, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if let Ok(mut file) = self.inner.file.lock() {
            // Log-write failures must not abort the Run
            let _ = writeln!(file, "{} - {} - {}", timestamp, level, message);
        }
    }

    fn push_line(&self, message: &str, is_error: bool) {
        if let Ok(mut lines) = self.inner.lines.write() {
            lines.push(OutputLine {
                line: message.to_string(),
                is_error,
            });
        }
    }
}
