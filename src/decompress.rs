// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Decompressor — inflates a plaintext-candidate block according to the
//! algorithm selected by the header's flags low nibble. §4.3.

use std::io::Read;

use crate::error::DecompressError;
use crate::format::{COMPRESSION_HEATSHRINK, COMPRESSION_LZ4, COMPRESSION_NONE};

/// Result of a successful decompression: the inflated bytes, plus whether
/// their length matched the frame's declared `raw_size` (a warning, not a
/// failure, per §4.3's size check).
pub struct Decompressed {
    pub bytes: Vec<u8>,
    pub size_matches_raw_size: bool,
}

/// Dispatches on the low nibble of `flags` and inflates `plaintext_candidate`.
pub fn decompress(
    plaintext_candidate: &[u8],
    flags: u8,
    raw_size: u32,
) -> Result<Decompressed, DecompressError> {
    let nibble = flags & 0x0F;
    let bytes = match nibble {
        COMPRESSION_NONE => plaintext_candidate.to_vec(),
        COMPRESSION_LZ4 => decompress_lz4_frame(plaintext_candidate)?,
        COMPRESSION_HEATSHRINK => return Err(DecompressError::UnsupportedAlgorithm),
        other => return Err(DecompressError::UnknownAlgorithm(other)),
    };

    Ok(Decompressed {
        size_matches_raw_size: bytes.len() as u64 == raw_size as u64,
        bytes,
    })
}

fn decompress_lz4_frame(compressed: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut decoder = lz4_flex::frame::FrameDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DecompressError::CorruptStream(e.to_string()))?;
    Ok(out)
}
