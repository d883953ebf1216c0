// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Run configuration — an explicit, flat record replacing dot-notation
//! nested configuration access, loaded once before the driver starts. §6.

use std::path::Path;

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::crypto::DEFAULT_KEY_FAILURE_THRESHOLD;
use crate::error::ConfigError;
use crate::format::DEFAULT_MAX_BLOCK_SIZE;

const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// On-disk JSON shape. Every field optional except `crypto.key`; defaults
/// are filled in by `Config::from_raw`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    crypto: RawCrypto,
    #[serde(default)]
    compression: Option<RawCompression>,
    #[serde(default)]
    limits: Option<RawLimits>,
}

#[derive(Debug, Deserialize)]
struct RawCrypto {
    key: String,
    #[serde(default)]
    algorithm: Option<String>,
    #[serde(default)]
    tag_length: Option<u8>,
    #[serde(default)]
    nonce_length: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RawCompression {
    #[serde(default)]
    algorithm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    #[serde(default)]
    max_file_size: Option<u64>,
    #[serde(default)]
    max_block_size: Option<u32>,
    #[serde(default)]
    key_failure_threshold: Option<u32>,
}

/// Overrides the block header's compression-algorithm nibble when set
/// explicitly in configuration, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOverride {
    None,
    Lz4,
    Heatshrink,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_block_size: u32,
    pub key_failure_threshold: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            key_failure_threshold: DEFAULT_KEY_FAILURE_THRESHOLD,
        }
    }
}

/// The run's resolved configuration: a flat record, not a nested dict with
/// dot-notation lookups.
pub struct Config {
    pub key: Zeroizing<[u8; 32]>,
    pub compression_override: Option<CompressionOverride>,
    pub limits: Limits,
    /// Top-level keys present in the source document that this loader does
    /// not recognize. Surfaced so the caller can emit a warning diagnostic
    /// per key instead of failing the load.
    pub unknown_keys: Vec<String>,
}

impl Config {
    /// Loads and validates configuration from a JSON file at `path`. JSON is
    /// the only supported format; the source documentation's mention of
    /// YAML is not implemented here (Design Decision, SPEC_FULL §6).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        let unknown_keys = unknown_top_level_keys(&value);
        let raw: RawConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        Self::from_raw(raw, unknown_keys)
    }

    fn from_raw(raw: RawConfig, unknown_keys: Vec<String>) -> Result<Self, ConfigError> {
        if let Some(algorithm) = &raw.crypto.algorithm {
            if algorithm != "AES-GCM" {
                return Err(ConfigError::UnsupportedAlgorithm(algorithm.clone()));
            }
        }
        if let Some(tag_length) = raw.crypto.tag_length {
            if tag_length != 16 {
                return Err(ConfigError::TagLengthInvalid(tag_length));
            }
        }
        if let Some(nonce_length) = raw.crypto.nonce_length {
            if nonce_length != 12 {
                return Err(ConfigError::NonceLengthInvalid(nonce_length));
            }
        }

        let key = decode_key(&raw.crypto.key)?;

        let compression_override = raw
            .compression
            .and_then(|c| c.algorithm)
            .map(|algorithm| match algorithm.as_str() {
                "none" => Ok(CompressionOverride::None),
                "lz4" => Ok(CompressionOverride::Lz4),
                "heatshrink" => Ok(CompressionOverride::Heatshrink),
                other => Err(ConfigError::UnsupportedAlgorithm(other.to_string())),
            })
            .transpose()?;

        let mut limits = Limits::default();
        if let Some(raw_limits) = raw.limits {
            if let Some(v) = raw_limits.max_file_size {
                if v == 0 {
                    return Err(ConfigError::LimitOutOfRange {
                        field: "limits.max_file_size",
                        value: v,
                    });
                }
                limits.max_file_size = v;
            }
            if let Some(v) = raw_limits.max_block_size {
                if v == 0 {
                    return Err(ConfigError::LimitOutOfRange {
                        field: "limits.max_block_size",
                        value: v as u64,
                    });
                }
                limits.max_block_size = v;
            }
            if let Some(v) = raw_limits.key_failure_threshold {
                if v == 0 {
                    return Err(ConfigError::LimitOutOfRange {
                        field: "limits.key_failure_threshold",
                        value: v as u64,
                    });
                }
                limits.key_failure_threshold = v;
            }
        }

        Ok(Config {
            key,
            compression_override,
            limits,
            unknown_keys,
        })
    }
}

/// Decodes `crypto.key` as hex first, falling back to base64 — both encode
/// the same 32 raw bytes, and the source documentation does not mandate one
/// over the other.
fn decode_key(encoded: &str) -> Result<Zeroizing<[u8; 32]>, ConfigError> {
    use base64::Engine;

    let bytes = hex::decode(encoded).ok().or_else(|| {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .ok()
    });

    let bytes = bytes.ok_or_else(|| ConfigError::KeyEncodingInvalid(encoded.to_string()))?;

    if bytes.len() != 32 {
        return Err(ConfigError::KeyLengthInvalid(bytes.len()));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(Zeroizing::new(key))
}

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["crypto", "compression", "limits"];

fn unknown_top_level_keys(value: &serde_json::Value) -> Vec<String> {
    let serde_json::Value::Object(map) = value else {
        return Vec::new();
    };
    map.keys()
        .filter(|k| !KNOWN_TOP_LEVEL_KEYS.contains(&k.as_str()))
        .cloned()
        .collect()
}
