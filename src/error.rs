// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Error hierarchy for the SBW telemetry decoder.
//!
//! Stage-level failures (`FrameError`, `CryptoError`, `DecompressError`) are
//! never propagated as hard errors out of the driver for a single block —
//! they are captured as data in a `BlockOutcome::Skipped`. They implement
//! `std::error::Error` anyway so their `Display` text can be reused as the
//! skip reason without duplicating message text.

use thiserror::Error;

/// Fatal, pre-run configuration problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("crypto.key must decode to exactly 32 bytes, got {0}")]
    KeyLengthInvalid(usize),

    #[error("crypto.key must not be all-zero or a constant-byte pattern")]
    KeyWeak,

    #[error("crypto.key is not valid hex or base64: {0}")]
    KeyEncodingInvalid(String),

    #[error("failed to read or parse configuration: {0}")]
    Unreadable(String),

    #[error("crypto.algorithm must be \"AES-GCM\", got {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("crypto.tag_length must be 16, got {0}")]
    TagLengthInvalid(u8),

    #[error("crypto.nonce_length must be 12, got {0}")]
    NonceLengthInvalid(u8),

    #[error("{field} out of range: {value}")]
    LimitOutOfRange { field: &'static str, value: u64 },
}

/// Frame Reader failures (§4.1). Always terminal: the reader stops the
/// stream rather than attempting re-synchronization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("header truncated")]
    TruncatedHeader,

    #[error("payload truncated: need {need} bytes, {available} available")]
    TruncatedPayload { need: u64, available: u64 },

    #[error("compressed_size {0} exceeds max_block_size {1}")]
    PayloadTooLarge(u32, u32),

    #[error("nonce_size must be nonzero")]
    NonceSizeZero,
}

/// Crypto Unsealer failures (§4.2). Per-block skip unless escalated by the
/// driver into `DecodeError::KeyLikelyWrong`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("authentication tag mismatch or tampered ciphertext")]
    WrongKeyOrTampered,

    #[error("nonce_size {0} != 12")]
    NonceLengthInvalid(u8),
}

/// Decompressor failures (§4.3). Per-block skip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    #[error("heatshrink decompression is not implemented")]
    UnsupportedAlgorithm,

    #[error("unknown compression algorithm nibble {0:#x}")]
    UnknownAlgorithm(u8),

    #[error("corrupt compressed stream: {0}")]
    CorruptStream(String),
}

/// Top-level fatal error surfaced by the CLI/driver boundary. Per-block and
/// per-record failures never reach this type; only configuration, I/O, and
/// the `key_likely_wrong` bail-out do.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "aborting: {failures} consecutive crypto failures before any block succeeded (threshold {threshold}); key is likely wrong"
    )]
    KeyLikelyWrong { failures: u32, threshold: u32 },
}
