// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Frame Reader (LG-1.0) — slices the input byte stream into well-formed
//! block frames. §4.1.

use std::io::Read;

use crate::error::FrameError;
use crate::format::{BlockHeader, HEADER_LEN, TAG_LEN};

/// A single block frame: header plus the sealed payload bytes
/// (`nonce || ciphertext || tag`) and the absolute byte offset the header
/// started at.
#[derive(Debug)]
pub struct Frame {
    pub header: BlockHeader,
    pub sealed_payload: Vec<u8>,
    pub absolute_offset: u64,
}

impl Frame {
    /// `nonce`/`ciphertext`/`tag` slices of the sealed payload.
    pub fn split(&self) -> (&[u8], &[u8], &[u8]) {
        let nonce_len = self.header.nonce_size as usize;
        let ct_len = self.header.compressed_size as usize;
        let (nonce, rest) = self.sealed_payload.split_at(nonce_len);
        let (ciphertext, tag) = rest.split_at(ct_len);
        debug_assert_eq!(tag.len(), TAG_LEN);
        (nonce, ciphertext, tag)
    }

    /// Total bytes this frame occupies on the wire: the 12-byte header plus
    /// the sealed payload (`nonce || ciphertext || tag`). This is what the
    /// bounded-consumption invariant (§8) counts against, not just the
    /// sealed payload length.
    pub fn total_len(&self) -> u64 {
        HEADER_LEN as u64 + self.sealed_payload.len() as u64
    }
}

/// Why the Frame Reader stopped producing frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOfStream {
    /// All bytes were consumed as well-formed frames.
    Clean,
    /// Stopped because the remaining bytes could not form another frame.
    /// `block_id` is known whenever a full 12-byte header was read, even if
    /// that header turned out to be invalid or unaffordable; `bytes_consumed`
    /// is how much of the stream this terminal attempt read before giving up,
    /// feeding a single ledger entry for the block that never completed.
    Skipped {
        error: FrameError,
        block_id: Option<u16>,
        bytes_consumed: u64,
    },
}

/// Lazily slices a byte source into frames. Non-restartable: once `next_frame`
/// returns `Ok(None)` or an error the reader will not yield further frames.
pub struct FrameReader<R> {
    reader: R,
    cursor: u64,
    max_block_size: u32,
    finished: Option<EndOfStream>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R, max_block_size: u32) -> Self {
        Self {
            reader,
            cursor: 0,
            max_block_size,
            finished: None,
        }
    }

    /// The reason the stream ended, once it has. `None` while frames are
    /// still being produced.
    pub fn end_of_stream(&self) -> Option<&EndOfStream> {
        self.finished.as_ref()
    }

    /// Total bytes consumed so far (bounded-consumption invariant, §8).
    pub fn bytes_consumed(&self) -> u64 {
        self.cursor
    }

    /// Pull the next frame, or `None` once the stream has ended (cleanly or
    /// via a terminal skip — check `end_of_stream` to distinguish).
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.finished.is_some() {
            return None;
        }

        let mut header_bytes = [0u8; HEADER_LEN];
        let header_got = read_as_much_as_possible(&mut self.reader, &mut header_bytes);
        if header_got == 0 {
            self.finished = Some(EndOfStream::Clean);
            return None;
        }
        if header_got < HEADER_LEN {
            self.finished = Some(EndOfStream::Skipped {
                error: FrameError::TruncatedHeader,
                block_id: None,
                bytes_consumed: header_got as u64,
            });
            return None;
        }

        // Even if the header turns out to be invalid, `block_id` sits at a
        // fixed offset we can read regardless, so the terminal ledger entry
        // still carries provenance.
        let raw_block_id = u16::from_le_bytes([header_bytes[10], header_bytes[11]]);

        let header = match BlockHeader::from_bytes(&header_bytes) {
            Ok(h) => h,
            Err(e) => {
                self.finished = Some(EndOfStream::Skipped {
                    error: e,
                    block_id: Some(raw_block_id),
                    bytes_consumed: HEADER_LEN as u64,
                });
                return None;
            }
        };

        if header.compressed_size > self.max_block_size {
            self.finished = Some(EndOfStream::Skipped {
                error: FrameError::PayloadTooLarge(header.compressed_size, self.max_block_size),
                block_id: Some(header.block_id),
                bytes_consumed: HEADER_LEN as u64,
            });
            return None;
        }

        let need = header.sealed_payload_len();
        let mut sealed_payload = vec![0u8; need as usize];
        let got = read_as_much_as_possible(&mut self.reader, &mut sealed_payload);
        if (got as u64) < need {
            self.finished = Some(EndOfStream::Skipped {
                error: FrameError::TruncatedPayload {
                    need,
                    available: got as u64,
                },
                block_id: Some(header.block_id),
                bytes_consumed: HEADER_LEN as u64 + got as u64,
            });
            return None;
        }

        let absolute_offset = self.cursor;
        self.cursor += HEADER_LEN as u64 + need;

        Some(Frame {
            header,
            sealed_payload,
            absolute_offset,
        })
    }
}

fn read_as_much_as_possible<R: Read>(r: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    filled
}
