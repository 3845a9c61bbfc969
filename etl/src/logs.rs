//! Pipeline progress logging.
//!
//! Every entry is printed to stdout and sent on a broadcast channel. A
//! [`LogCapture`] taken before a run collects what the run reported, so
//! the CLI can add warning and error totals to its run summary.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Entries buffered per subscriber before the oldest are overwritten.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth under the current step
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), indent: 0 }
    }

    pub fn indented(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    fn render(&self) -> String {
        format!("{}{} {}", "   ".repeat(usize::from(self.indent)), self.level.marker(), self.message)
    }
}

pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::default);

pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl LogBroadcaster {
    pub fn emit(&self, entry: LogEntry) {
        println!("{}", entry.render());
        // Without a capture there is no receiver; the entry is only printed
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

// =============================================================================
// Capture
// =============================================================================

/// What a subscriber saw between [`LogCapture::on`] and [`LogCapture::finish`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogTally {
    pub info: usize,
    pub success: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Entries overwritten before they were read
    pub missed: u64,
}

impl LogTally {
    fn record(&mut self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => self.info += 1,
            LogLevel::Success => self.success += 1,
            LogLevel::Warning => self.warnings.push(entry.message),
            LogLevel::Error => self.errors.push(entry.message),
        }
    }
}

/// Subscription collecting every entry emitted while it is alive.
pub struct LogCapture {
    receiver: broadcast::Receiver<LogEntry>,
}

impl LogCapture {
    /// Capture from the process-wide broadcaster.
    pub fn start() -> Self {
        Self::on(&LOG_BROADCASTER)
    }

    pub fn on(broadcaster: &LogBroadcaster) -> Self {
        Self { receiver: broadcaster.subscribe() }
    }

    /// Drain the entries received so far.
    pub fn finish(mut self) -> LogTally {
        let mut tally = LogTally::default();
        loop {
            match self.receiver.try_recv() {
                Ok(entry) => tally.record(entry),
                Err(TryRecvError::Lagged(n)) => tally.missed += n,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        tally
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.emit(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.emit(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.emit(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.emit(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.emit(LogEntry::new(LogLevel::Info, msg).indented(indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.emit(LogEntry::new(LogLevel::Warning, msg).indented(indent));
}
