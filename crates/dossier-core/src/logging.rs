//! Per-session protocol log.
//!
//! Every frame sent or received on a research connection is appended to
//! `{log_dir}/{session_id}.log` as `[timestamp] DIRECTION: payload`. With no
//! log directory configured the log is a no-op.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

/// Direction tag for a logged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    Event,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Sent => "SEND",
            Direction::Received => "RECV",
            Direction::Event => "EVENT",
        }
    }
}

/// Thread-safe handle to an append-only protocol log file.
#[derive(Debug, Clone, Default)]
pub struct ProtocolLog {
    file: Arc<Mutex<Option<File>>>,
}

impl ProtocolLog {
    /// Open (or create) `{log_dir}/{session_id}.log`.
    ///
    /// Failing to open the file disables the log rather than failing the
    /// session.
    pub fn open(log_dir: Option<&Path>, session_id: &str) -> Self {
        let file = log_dir.and_then(|dir| {
            std::fs::create_dir_all(dir).ok()?;
            let path = dir.join(format!("{session_id}.log"));
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => Some(file),
                Err(e) => {
                    log::warn!("Failed to open protocol log {}: {}", path.display(), e);
                    None
                }
            }
        });
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Append one timestamped line.
    pub fn line(&self, direction: Direction, data: &str) {
        let mut guard = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(ref mut file) = *guard {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let _ = writeln!(file, "[{}] {}: {}", ts, direction.as_str(), data);
            let _ = file.flush();
        }
    }
}
