//! Log/status channel
//!
//! An ordered, append-only stream of structured entries produced by the
//! bot loop and consumed by the control panel. Nothing in the core
//! depends on whether anything is listening: a send into a dropped
//! receiver is discarded, and every entry is mirrored to the `log`
//! macros either way.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Local};
use serde::Serialize;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERR"),
        }
    }
}

/// One structured entry on the status stream
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    /// Cycle number the entry belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u64>,
    /// Resolved event name, when one is involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Match score, when one is involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
            cycle: None,
            event: None,
            score: None,
        }
    }

    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Render as a single display line
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.message
        );
        if let Some(event) = &self.event {
            line.push_str(&format!(" event={event}"));
        }
        if let Some(score) = self.score {
            line.push_str(&format!(" score={score:.2}"));
        }
        if let Some(cycle) = self.cycle {
            line.push_str(&format!(" cycle={cycle}"));
        }
        line
    }

    /// Structured form for consumers that want fields, not lines
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Sending half of the status stream; cheap to clone into the loop
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: Sender<LogEntry>,
    verbose: bool,
}

impl LogSink {
    /// Create a connected sink/receiver pair
    pub fn channel() -> (LogSink, LogReceiver) {
        let (tx, rx) = mpsc::channel();
        (
            LogSink { tx, verbose: false },
            LogReceiver { rx },
        )
    }

    /// A sink nobody listens to; entries still reach the `log` macros
    pub fn disconnected() -> LogSink {
        Self::channel().0
    }

    /// Forward debug-level entries to the channel as well
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Emit an entry; never blocks, never fails
    pub fn emit(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Debug => log::debug!("{}", entry.format_line()),
            LogLevel::Info => log::info!("{}", entry.format_line()),
            LogLevel::Warn => log::warn!("{}", entry.format_line()),
            LogLevel::Error => log::error!("{}", entry.format_line()),
        }
        if entry.level == LogLevel::Debug && !self.verbose {
            return;
        }
        let _ = self.tx.send(entry);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogEntry::new(LogLevel::Debug, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogEntry::new(LogLevel::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogEntry::new(LogLevel::Warn, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogEntry::new(LogLevel::Error, message));
    }
}

/// Receiving half of the status stream
pub struct LogReceiver {
    rx: Receiver<LogEntry>,
}

impl LogReceiver {
    /// Drain everything currently queued, preserving order
    pub fn try_drain(&self) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        while let Ok(entry) = self.rx.try_recv() {
            entries.push(entry);
        }
        entries
    }

    /// Block up to `timeout` for the next entry
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<LogEntry> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Write entries to `maze_log_YYYYmmdd_HHMMSS.txt` under `dir`.
///
/// Returns the path of the written file.
pub fn export_entries(entries: &[LogEntry], dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    let filename = format!("maze_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.as_ref().join(filename);

    let mut out = String::with_capacity(entries.len() * 64);
    for entry in entries {
        out.push_str(&entry.format_line());
        out.push('\n');
    }
    fs::write(&path, out)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_preserves_order() {
        let (sink, rx) = LogSink::channel();
        sink.info("first");
        sink.warn("second");
        sink.error("third");

        let entries = rx.try_drain();
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(entries[1].level, LogLevel::Warn);
    }

    #[test]
    fn test_debug_entries_gated_by_verbose() {
        let (sink, rx) = LogSink::channel();
        sink.debug("hidden");
        assert!(rx.try_drain().is_empty());

        let sink = sink.with_verbose(true);
        sink.debug("visible");
        assert_eq!(rx.try_drain().len(), 1);
    }

    #[test]
    fn test_disconnected_sink_never_panics() {
        let sink = LogSink::disconnected();
        sink.info("nobody listening");
        sink.error("still fine");
    }

    #[test]
    fn test_entry_formatting_and_fields() {
        let entry = LogEntry::new(LogLevel::Info, "resolved")
            .with_event("event_boss")
            .with_score(0.93)
            .with_cycle(12);
        let line = entry.format_line();
        assert!(line.contains("[INFO] resolved"));
        assert!(line.contains("event=event_boss"));
        assert!(line.contains("score=0.93"));
        assert!(line.contains("cycle=12"));

        let json = entry.to_json();
        assert!(json.contains("\"event\":\"event_boss\""));
        assert!(json.contains("\"cycle\":12"));
    }

    #[test]
    fn test_export_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            LogEntry::new(LogLevel::Info, "cycle start"),
            LogEntry::new(LogLevel::Warn, "no event").with_cycle(3),
        ];

        let path = export_entries(&entries, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("maze_log_"));
        assert!(name.ends_with(".txt"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("cycle start"));
        assert!(contents.contains("no event"));
        assert_eq!(contents.lines().count(), 2);
    }
}
