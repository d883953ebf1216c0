// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Driver — wires Frame Reader → Crypto Unsealer → Decompressor → TLV
//! Scanner → Record Aggregator into the run's sequential pipeline. §4.5/§5.

use std::io::Read;

use crate::aggregator::RecordAggregator;
use crate::config::{CompressionOverride, Limits};
use crate::crypto::CryptoUnsealer;
use crate::decompress::decompress;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink, Severity, Stage};
use crate::error::DecodeError;
use crate::frame::{EndOfStream, FrameReader};
use crate::tlv::scan_block;

/// Drives one capture file end to end. Holds no state across runs; build a
/// fresh `Driver` per file.
pub struct Driver {
    unsealer: CryptoUnsealer,
    compression_override: Option<CompressionOverride>,
    limits: Limits,
}

impl Driver {
    pub fn new(
        unsealer: CryptoUnsealer,
        compression_override: Option<CompressionOverride>,
        limits: Limits,
    ) -> Self {
        Self {
            unsealer,
            compression_override,
            limits,
        }
    }

    /// Runs the pipeline over `reader`, appending every decoded record into
    /// `aggregator` and emitting one `DiagnosticEvent` per stage outcome to
    /// `sink`. Polls `cancellation` between blocks; returns as soon as it
    /// reports `true`, having committed every block processed so far.
    ///
    /// Bails out with `DecodeError::KeyLikelyWrong` if the unsealer racks up
    /// `limits.key_failure_threshold` consecutive tag mismatches without an
    /// intervening success — the threshold decision lives here, not on the
    /// unsealer, which only counts.
    pub fn run<R: Read>(
        &mut self,
        reader: R,
        aggregator: &mut RecordAggregator,
        sink: &mut dyn DiagnosticsSink,
        cancellation: &dyn Fn() -> bool,
    ) -> Result<(), DecodeError> {
        let mut frames = FrameReader::new(reader, self.limits.max_block_size);

        while let Some(frame) = frames.next_frame() {
            if cancellation() {
                break;
            }
            self.process_frame(frame, aggregator, sink)?;
        }

        if let Some(EndOfStream::Skipped {
            error,
            block_id,
            bytes_consumed,
        }) = frames.end_of_stream()
        {
            sink.emit(DiagnosticEvent::new(
                *block_id,
                Stage::Frame,
                Severity::Warning,
                error.to_string(),
            ));
            aggregator.record_skip(*block_id, Stage::Frame, error.to_string(), *bytes_consumed);
        }

        Ok(())
    }

    fn process_frame(
        &mut self,
        frame: crate::frame::Frame,
        aggregator: &mut RecordAggregator,
        sink: &mut dyn DiagnosticsSink,
    ) -> Result<(), DecodeError> {
        let block_id = frame.header.block_id;
        let (nonce, ciphertext, tag) = frame.split();

        let plaintext_candidate = match self.unsealer.unseal(nonce, ciphertext, tag) {
            Ok(bytes) => bytes,
            Err(err) => {
                sink.emit(DiagnosticEvent::new(
                    Some(block_id),
                    Stage::Crypto,
                    Severity::Error,
                    err.to_string(),
                ));
                aggregator.record_skip(Some(block_id), Stage::Crypto, err.to_string(), frame.total_len());

                let failures = self.unsealer.consecutive_failures();
                if failures >= self.limits.key_failure_threshold {
                    return Err(DecodeError::KeyLikelyWrong {
                        failures,
                        threshold: self.limits.key_failure_threshold,
                    });
                }
                return Ok(());
            }
        };

        if frame.header.reserved_bits_set() {
            sink.emit(DiagnosticEvent::new(
                Some(block_id),
                Stage::Frame,
                Severity::Warning,
                "reserved flag bits set".to_string(),
            ));
        }

        let flags = self.effective_flags(frame.header.flags);
        let decompressed = match decompress(&plaintext_candidate, flags, frame.header.raw_size) {
            Ok(d) => d,
            Err(err) => {
                sink.emit(DiagnosticEvent::new(
                    Some(block_id),
                    Stage::Decompress,
                    Severity::Error,
                    err.to_string(),
                ));
                aggregator.record_skip(Some(block_id), Stage::Decompress, err.to_string(), frame.total_len());
                return Ok(());
            }
        };

        if !decompressed.size_matches_raw_size {
            sink.emit(DiagnosticEvent::new(
                Some(block_id),
                Stage::Decompress,
                Severity::Warning,
                format!(
                    "decompressed size {} does not match declared raw_size {}",
                    decompressed.bytes.len(),
                    frame.header.raw_size
                ),
            ));
        }

        let scan = scan_block(&decompressed.bytes);
        if let Some(tail_skip) = &scan.tail_skip {
            sink.emit(DiagnosticEvent::new(
                Some(block_id),
                Stage::Tlv,
                Severity::Warning,
                format!("{tail_skip:?}"),
            ));
        }

        aggregator.record_block(block_id, frame.total_len(), scan.records);
        Ok(())
    }

    fn effective_flags(&self, header_flags: u8) -> u8 {
        match self.compression_override {
            None => header_flags,
            Some(CompressionOverride::None) => header_flags & 0xF0,
            Some(CompressionOverride::Lz4) => (header_flags & 0xF0) | 0x1,
            Some(CompressionOverride::Heatshrink) => (header_flags & 0xF0) | 0x2,
        }
    }
}
