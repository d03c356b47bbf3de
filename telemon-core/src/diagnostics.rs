//! Bounded log of recent diagnostic entries for the status panel.

use crate::series::{RingBuffer, SampleOrder};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Warn => "warn",
            DiagnosticLevel::Error => "error",
        }
    }
}

/// A single diagnostic line.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEntry {
    pub at: SystemTime,
    pub level: DiagnosticLevel,
    pub message: String,
}

/// Recent connection and ingestion events, oldest evicted first.
#[derive(Debug)]
pub struct Diagnostics {
    entries: RingBuffer<DiagnosticEntry>,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Self { entries: RingBuffer::new(capacity) }
    }

    pub fn record(&self, level: DiagnosticLevel, message: impl Into<String>) {
        self.entries.push(DiagnosticEntry { at: SystemTime::now(), level, message: message.into() });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Error, message);
    }

    /// The `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Arc<DiagnosticEntry>> {
        self.entries.recent(n, SampleOrder::OldestFirst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
