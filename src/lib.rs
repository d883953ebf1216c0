// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Decoder for Shoot-By-Wire encrypted telemetry capture files: a
//! concatenation of AES-256-GCM-sealed, optionally LZ4-compressed blocks,
//! each unsealing to a TLV record stream.
//!
//! The pipeline is Frame Reader → Crypto Unsealer → Decompressor → TLV
//! Scanner → Record Aggregator, driven sequentially by [`driver::Driver`].
//! Every stage's failure is captured as data (`BlockOutcome::Skipped`)
//! rather than aborting the run; only configuration problems and a
//! `key_likely_wrong` escalation are fatal.

pub mod aggregator;
pub mod config;
pub mod crypto;
pub mod decompress;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod format;
pub mod frame;
pub mod tlv;

pub use aggregator::{Anomaly, BlockLedger, BlockOutcome, LedgerEntry, Provenanced, RecordAggregator, RunSummary};
pub use config::{CompressionOverride, Config, Limits};
pub use crypto::CryptoUnsealer;
pub use diagnostics::{CollectingSink, DiagnosticEvent, DiagnosticsSink, NullSink, PrintSink, Severity, Stage};
pub use driver::Driver;
pub use error::{ConfigError, CryptoError, DecodeError, DecompressError, FrameError};
pub use format::BlockHeader;
pub use frame::{EndOfStream, Frame, FrameReader};
pub use tlv::{
    DecodedRecord, Health, Imu, MalformedReason, ScanResult, Session, TailSkip, Temperature, Timestamp, TypedValue,
};
