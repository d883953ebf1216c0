// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Record Aggregator — collects per-block results into per-type ordered
//! sequences plus a block ledger and aggregate summary. §4.5.

use serde::Serialize;

use crate::diagnostics::Stage;
use crate::tlv::{DecodedRecord, Health, Imu, Session, Temperature, TypedValue};

/// A decoded record plus its provenance, as exposed to exporters.
#[derive(Debug, Clone, Serialize)]
pub struct Provenanced<T> {
    pub block_id: u16,
    pub record_index: usize,
    pub timestamp: Option<u64>,
    pub value: T,
}

/// One `RawRecord` or `MalformedRecord`, kept so exporters can log but not
/// lose them; serialized as an untyped string for the raw/malformed payload
/// so exporters don't need to know the schema failure details to log it.
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub block_id: u16,
    pub record_index: usize,
    pub record_type: u8,
    pub description: String,
}

/// How a single block's attempt through the pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Ok { records_produced: usize },
    Skipped { stage: Stage, reason: String },
}

/// One entry in the `BlockLedger`. `block_id` is `None` only for a Frame
/// Reader terminal skip that never got far enough to read a full header
/// (e.g. `truncated_header`) — every other outcome carries it, since the
/// 12-byte header's `block_id` field is readable even when the rest of the
/// header fails validation.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub block_id: Option<u16>,
    pub outcome: BlockOutcome,
    pub records_produced: usize,
    pub bytes_consumed: u64,
}

/// Ordered per-block outcomes, for diagnostics and downstream reporting.
#[derive(Debug, Clone, Default)]
pub struct BlockLedger {
    pub entries: Vec<LedgerEntry>,
}

impl BlockLedger {
    pub fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn ok_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, BlockOutcome::Ok { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.entries.len() - self.ok_count()
    }
}

/// Collects decoded records across all blocks into per-type ordered
/// sequences, preserving block order and within-block cursor order.
#[derive(Debug, Default)]
pub struct RecordAggregator {
    pub imu: Vec<Provenanced<Imu>>,
    pub temperature: Vec<Provenanced<Temperature>>,
    pub health: Vec<Provenanced<Health>>,
    pub session: Vec<Provenanced<Session>>,
    pub anomalies: Vec<Anomaly>,
    pub ledger: BlockLedger,
    first_timestamp: Option<u64>,
    last_timestamp: Option<u64>,
}

impl RecordAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every record from one successfully-scanned block, in cursor
    /// order, then records the block's ledger entry.
    pub fn record_block(&mut self, block_id: u16, bytes_consumed: u64, decoded: Vec<DecodedRecord>) {
        let records_produced = decoded.len();
        for record in decoded {
            self.record_one(block_id, record);
        }
        self.ledger.push(LedgerEntry {
            block_id: Some(block_id),
            outcome: BlockOutcome::Ok { records_produced },
            records_produced,
            bytes_consumed,
        });
    }

    fn record_one(&mut self, block_id: u16, record: DecodedRecord) {
        if let Some(ts) = record.timestamp {
            self.first_timestamp.get_or_insert(ts);
            self.last_timestamp = Some(ts);
        }

        match record.value {
            TypedValue::Imu(v) => self.imu.push(Provenanced {
                block_id,
                record_index: record.record_index,
                timestamp: record.timestamp,
                value: v,
            }),
            TypedValue::Temperature(v) => self.temperature.push(Provenanced {
                block_id,
                record_index: record.record_index,
                timestamp: record.timestamp,
                value: v,
            }),
            TypedValue::Health(v) => self.health.push(Provenanced {
                block_id,
                record_index: record.record_index,
                timestamp: record.timestamp,
                value: v,
            }),
            TypedValue::Session(v) => self.session.push(Provenanced {
                block_id,
                record_index: record.record_index,
                timestamp: record.timestamp,
                value: v,
            }),
            TypedValue::Timestamp(v) => {
                self.first_timestamp.get_or_insert(v.0);
                self.last_timestamp = Some(v.0);
            }
            TypedValue::Raw { record_type, .. } => self.anomalies.push(Anomaly {
                block_id,
                record_index: record.record_index,
                record_type,
                description: format!("unknown TLV type {record_type:#04x}"),
            }),
            TypedValue::Malformed {
                record_type,
                length,
                reason,
            } => self.anomalies.push(Anomaly {
                block_id,
                record_index: record.record_index,
                record_type,
                description: format!("malformed TLV type {record_type:#04x} length {length}: {reason:?}"),
            }),
        }
    }

    /// Records a block that failed before it could be scanned (frame,
    /// crypto, or decompress stage). `block_id` is `None` for a frame-stage
    /// terminal skip that never got far enough to read a header.
    pub fn record_skip(&mut self, block_id: Option<u16>, stage: Stage, reason: String, bytes_consumed: u64) {
        self.ledger.push(LedgerEntry {
            block_id,
            outcome: BlockOutcome::Skipped { stage, reason },
            records_produced: 0,
            bytes_consumed,
        });
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.first_timestamp
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Aggregate summary: totals per outcome, totals per record type,
    /// first/last timestamp seen.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            blocks_seen: self.ledger.entries.len(),
            blocks_ok: self.ledger.ok_count(),
            blocks_skipped: self.ledger.skipped_count(),
            imu_count: self.imu.len(),
            temperature_count: self.temperature.len(),
            health_count: self.health.len(),
            session_count: self.session.len(),
            anomaly_count: self.anomalies.len(),
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_timestamp,
        }
    }
}

/// The CLI-facing rollup built from the ledger and per-type sequences.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub blocks_seen: usize,
    pub blocks_ok: usize,
    pub blocks_skipped: usize,
    pub imu_count: usize,
    pub temperature_count: usize,
    pub health_count: usize,
    pub session_count: usize,
    pub anomaly_count: usize,
    pub first_timestamp: Option<u64>,
    pub last_timestamp: Option<u64>,
}
