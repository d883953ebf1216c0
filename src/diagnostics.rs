// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Structured diagnostics, replacing the per-module-logger/global-state
//! pattern flagged in the original design notes with an explicit sink the
//! driver calls once per stage outcome.

use std::fmt;

/// Which pipeline stage an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Frame,
    Crypto,
    Decompress,
    Tlv,
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Frame => "frame",
            Stage::Crypto => "crypto",
            Stage::Decompress => "decompress",
            Stage::Tlv => "tlv",
            Stage::Config => "config",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One structured diagnostic event, `{block_id, stage, severity, reason}`
/// per the original design notes.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub block_id: Option<u16>,
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(block_id: Option<u16>, stage: Stage, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            block_id,
            stage,
            severity,
            message: message.into(),
        }
    }
}

/// A narrow sink for diagnostic events. The core depends only on this
/// trait, never on a concrete logging backend.
pub trait DiagnosticsSink {
    fn emit(&mut self, event: DiagnosticEvent);
}

/// Collects every event in memory, in arrival order. Useful for tests and
/// for callers that want to inspect diagnostics after the run completes.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Vec<DiagnosticEvent>,
}

impl DiagnosticsSink for CollectingSink {
    fn emit(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }
}

/// Prints each event to stderr as it arrives, in the same plain
/// `eprintln!`-based style the teacher's CLI uses for its own completion
/// messages — no external logging crate.
#[derive(Default)]
pub struct PrintSink;

impl DiagnosticsSink for PrintSink {
    fn emit(&mut self, event: DiagnosticEvent) {
        let block = event
            .block_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        eprintln!(
            "[{:?}] block={} stage={} {}",
            event.severity, block, event.stage, event.message
        );
    }
}

/// Discards every event. The default for callers that don't care.
#[derive(Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn emit(&mut self, _event: DiagnosticEvent) {}
}
