// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Crypto Unsealer (EN-1.0) — AES-256-GCM authenticated decryption of a
//! sealed block payload. §4.2.

use aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use zeroize::Zeroizing;

use crate::error::{ConfigError, CryptoError};
use crate::format::NONCE_LEN;

/// Default tag-mismatch threshold before the driver aborts with
/// `key_likely_wrong` (§4.2 edge-case policy).
pub const DEFAULT_KEY_FAILURE_THRESHOLD: u32 = 16;

/// Holds the run's 32-byte AES-256-GCM key and the cipher built from it.
/// EN-1.0 uses empty associated data unconditionally.
pub struct CryptoUnsealer {
    cipher: Aes256Gcm,
    _key: Zeroizing<[u8; 32]>,
    tag_mismatches_before_success: u32,
}

impl CryptoUnsealer {
    /// Validates and constructs the unsealer. The key must be exactly 32
    /// bytes and must not be all-zero or a constant-byte pattern — both are
    /// almost certainly placeholder/test values, not real key material.
    pub fn new(key: [u8; 32]) -> Result<Self, ConfigError> {
        if key.iter().all(|&b| b == key[0]) {
            return Err(ConfigError::KeyWeak);
        }
        let key = Zeroizing::new(key);
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|_| ConfigError::KeyLengthInvalid(key.len()))?;
        Ok(Self {
            cipher,
            _key: key,
            tag_mismatches_before_success: 0,
        })
    }

    /// Authenticates and decrypts a sealed payload. Returns exactly
    /// `ciphertext.len()` plaintext-candidate bytes on success — never
    /// partial data on failure.
    pub fn unseal(
        &mut self,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::NonceLengthInvalid(nonce.len() as u8));
        }

        let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        match self.cipher.decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: &sealed,
                aad: &[],
            },
        ) {
            Ok(plaintext) => {
                self.tag_mismatches_before_success = 0;
                Ok(plaintext)
            }
            Err(_) => {
                self.tag_mismatches_before_success =
                    self.tag_mismatches_before_success.saturating_add(1);
                Err(CryptoError::WrongKeyOrTampered)
            }
        }
    }

    /// Consecutive tag-mismatch failures observed since the last success
    /// (or since construction). The driver compares this against the
    /// configured `key_failure_threshold` to decide on `key_likely_wrong`.
    pub fn consecutive_failures(&self) -> u32 {
        self.tag_mismatches_before_success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte_pattern: fn(usize) -> u8) -> [u8; 32] {
        let mut k = [0u8; 32];
        for (i, b) in k.iter_mut().enumerate() {
            *b = byte_pattern(i);
        }
        k
    }

    fn good_key() -> [u8; 32] {
        key(|i| (0x11 + i as u32 * 7) as u8)
    }

    fn seal(key: [u8; 32], plaintext: &[u8]) -> ([u8; 12], Vec<u8>, Vec<u8>) {
        use rand::RngCore;
        let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &[],
                },
            )
            .unwrap();
        let tag = sealed.split_off(sealed.len() - 16);
        (nonce, sealed, tag)
    }

    #[test]
    fn rejects_all_zero_key() {
        assert_eq!(CryptoUnsealer::new([0u8; 32]).unwrap_err(), ConfigError::KeyWeak);
    }

    #[test]
    fn rejects_constant_byte_key() {
        assert_eq!(
            CryptoUnsealer::new([0xAB; 32]).unwrap_err(),
            ConfigError::KeyWeak
        );
    }

    #[test]
    fn round_trips_a_sealed_payload() {
        let k = good_key();
        let (nonce, ciphertext, tag) = seal(k, b"hello telemetry");
        let mut unsealer = CryptoUnsealer::new(k).unwrap();
        let pt = unsealer.unseal(&nonce, &ciphertext, &tag).unwrap();
        assert_eq!(pt, b"hello telemetry");
        assert_eq!(unsealer.consecutive_failures(), 0);
    }

    #[test]
    fn bit_flip_in_tag_fails_closed() {
        let k = good_key();
        let (nonce, ciphertext, mut tag) = seal(k, b"hello telemetry");
        tag[15] ^= 0x01;
        let mut unsealer = CryptoUnsealer::new(k).unwrap();
        let err = unsealer.unseal(&nonce, &ciphertext, &tag).unwrap_err();
        assert_eq!(err, CryptoError::WrongKeyOrTampered);
        assert_eq!(unsealer.consecutive_failures(), 1);
    }

    #[test]
    fn bit_flip_in_ciphertext_fails_closed() {
        let k = good_key();
        let (nonce, mut ciphertext, tag) = seal(k, b"hello telemetry");
        ciphertext[0] ^= 0x01;
        let mut unsealer = CryptoUnsealer::new(k).unwrap();
        assert_eq!(
            unsealer.unseal(&nonce, &ciphertext, &tag).unwrap_err(),
            CryptoError::WrongKeyOrTampered
        );
    }

    #[test]
    fn wrong_nonce_length_is_rejected_before_decrypt() {
        let k = good_key();
        let (_, ciphertext, tag) = seal(k, b"x");
        let mut unsealer = CryptoUnsealer::new(k).unwrap();
        let err = unsealer.unseal(&[0u8; 8], &ciphertext, &tag).unwrap_err();
        assert_eq!(err, CryptoError::NonceLengthInvalid(8));
    }

    #[test]
    fn failure_counter_resets_on_success() {
        let k = good_key();
        let (nonce, ciphertext, tag) = seal(k, b"x");
        let mut unsealer = CryptoUnsealer::new(k).unwrap();
        let mut bad_tag = tag.clone();
        bad_tag[0] ^= 1;
        let _ = unsealer.unseal(&nonce, &ciphertext, &bad_tag);
        let _ = unsealer.unseal(&nonce, &ciphertext, &bad_tag);
        assert_eq!(unsealer.consecutive_failures(), 2);
        unsealer.unseal(&nonce, &ciphertext, &tag).unwrap();
        assert_eq!(unsealer.consecutive_failures(), 0);
    }
}
