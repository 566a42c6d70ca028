//! Diagnostic sink
//!
//! The provider and the configuration normalizer never reach for a global
//! logger: they report through a [`Diagnostics`] handed to them at
//! construction. [`TracingDiagnostics`] forwards to `tracing`, and
//! [`CapturedDiagnostics`] keeps messages in memory for assertions.

use parking_lot::Mutex;

/// Write-only sink for non-fatal notices.
pub trait Diagnostics: Send + Sync {
    fn warn(&self, message: &str);
    fn debug(&self, message: &str);
    fn trace(&self, message: &str);
}

/// Forwards notices to the `tracing` subscriber of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "warden", "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "warden", "{}", message);
    }

    fn trace(&self, message: &str) {
        tracing::trace!(target: "warden", "{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Debug,
    Trace,
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct CapturedDiagnostics {
    records: Mutex<Vec<(Level, String)>>,
}

impl CapturedDiagnostics {
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, message)| message.clone())
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

impl Diagnostics for CapturedDiagnostics {
    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn trace(&self, message: &str) {
        self.push(Level::Trace, message);
    }
}
