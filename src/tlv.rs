// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! TLV Scanner (TL-1.0) — cursor-driven walk over an inflated block's bytes,
//! emitting typed records. §4.4.

use crate::format::{
    LEN_HEALTH, LEN_IMU, LEN_TEMPERATURE, LEN_TIMESTAMP, MIN_LEN_SESSION, TYPE_HEALTH, TYPE_IMU,
    TYPE_SESSION, TYPE_TEMPERATURE, TYPE_TIMESTAMP,
};

/// 6-axis IMU sample: acceleration in m/s², angular rate in rad/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imu {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

/// Single-sensor temperature reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature {
    pub celsius: f32,
    pub sensor_id: u32,
}

/// Device health telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub battery_voltage: f32,
    pub cpu_temperature: f32,
    pub memory_usage: u32,
    pub error_code: u32,
}

/// Session metadata. `reserved` is preserved verbatim, never interpreted
/// (§9 Open Question: trailing bytes are undefined but not discarded).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: [u8; 16],
    pub firmware_version: u32,
    pub reserved: Vec<u8>,
}

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(pub u64);

/// The decoded payload of a TLV record.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Imu(Imu),
    Temperature(Temperature),
    Health(Health),
    Session(Session),
    Timestamp(Timestamp),
    /// An unrecognized type tag, kept so exporters can log but not lose it.
    Raw { record_type: u8, payload: Vec<u8> },
    /// A recognized type tag whose payload failed the schema's length check.
    Malformed {
        record_type: u8,
        length: u16,
        reason: MalformedReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    WrongLength { expected: u16, got: u16 },
    TooShort { minimum: u16, got: u16 },
}

/// A single decoded record plus its provenance within the block.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub record_index: usize,
    pub timestamp: Option<u64>,
    pub value: TypedValue,
}

/// Why the scanner stopped before reaching the end of the block cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailSkip {
    TruncatedHeader,
    LengthOverrun { record_type: u8, length: u16 },
}

/// The outcome of scanning one inflated block.
pub struct ScanResult {
    pub records: Vec<DecodedRecord>,
    pub tail_skip: Option<TailSkip>,
}

/// Walks `bytes` from the start, decoding TLV records until it runs out of
/// bytes or hits a length that overruns the buffer. A malformed record (bad
/// length for a *known* type) does not stop the scan — only a tail overrun
/// does, and even then everything decoded so far is kept (§4.4 TLV locality).
pub fn scan_block(bytes: &[u8]) -> ScanResult {
    let mut records = Vec::new();
    let mut cursor = 0usize;
    let mut current_timestamp: Option<u64> = None;
    let mut tail_skip = None;

    loop {
        let remaining = bytes.len() - cursor;
        if remaining == 0 {
            break;
        }
        if remaining < 3 {
            tail_skip = Some(TailSkip::TruncatedHeader);
            break;
        }

        let record_type = bytes[cursor];
        let length = u16::from_le_bytes([bytes[cursor + 1], bytes[cursor + 2]]);

        if length as usize > remaining - 3 {
            tail_skip = Some(TailSkip::LengthOverrun {
                record_type,
                length,
            });
            break;
        }

        let payload = &bytes[cursor + 3..cursor + 3 + length as usize];
        let value = decode_payload(record_type, length, payload);

        if let TypedValue::Timestamp(Timestamp(us)) = &value {
            current_timestamp = Some(*us);
        }

        records.push(DecodedRecord {
            record_index: records.len(),
            timestamp: current_timestamp,
            value,
        });

        cursor += 3 + length as usize;
    }

    ScanResult { records, tail_skip }
}

fn decode_payload(record_type: u8, length: u16, payload: &[u8]) -> TypedValue {
    match record_type {
        TYPE_IMU => {
            if length != LEN_IMU {
                return malformed(record_type, length, LEN_IMU);
            }
            TypedValue::Imu(Imu {
                accel: [
                    f32_at(payload, 0),
                    f32_at(payload, 4),
                    f32_at(payload, 8),
                ],
                gyro: [
                    f32_at(payload, 12),
                    f32_at(payload, 16),
                    f32_at(payload, 20),
                ],
            })
        }
        TYPE_TEMPERATURE => {
            if length != LEN_TEMPERATURE {
                return malformed(record_type, length, LEN_TEMPERATURE);
            }
            TypedValue::Temperature(Temperature {
                celsius: f32_at(payload, 0),
                sensor_id: u32_at(payload, 4),
            })
        }
        TYPE_HEALTH => {
            if length != LEN_HEALTH {
                return malformed(record_type, length, LEN_HEALTH);
            }
            TypedValue::Health(Health {
                battery_voltage: f32_at(payload, 0),
                cpu_temperature: f32_at(payload, 4),
                memory_usage: u32_at(payload, 8),
                error_code: u32_at(payload, 12),
            })
        }
        TYPE_SESSION => {
            if length < MIN_LEN_SESSION {
                return TypedValue::Malformed {
                    record_type,
                    length,
                    reason: MalformedReason::TooShort {
                        minimum: MIN_LEN_SESSION,
                        got: length,
                    },
                };
            }
            let mut session_id = [0u8; 16];
            session_id.copy_from_slice(&payload[0..16]);
            TypedValue::Session(Session {
                session_id,
                firmware_version: u32_at(payload, 16),
                reserved: payload[20..].to_vec(),
            })
        }
        TYPE_TIMESTAMP => {
            if length != LEN_TIMESTAMP {
                return malformed(record_type, length, LEN_TIMESTAMP);
            }
            TypedValue::Timestamp(Timestamp(u64_at(payload, 0)))
        }
        other => TypedValue::Raw {
            record_type: other,
            payload: payload.to_vec(),
        },
    }
}

fn malformed(record_type: u8, length: u16, expected: u16) -> TypedValue {
    TypedValue::Malformed {
        record_type,
        length,
        reason: MalformedReason::WrongLength {
            expected,
            got: length,
        },
    }
}

fn f32_at(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(record_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![record_type];
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn imu_payload(accel: [f32; 3], gyro: [f32; 3]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in accel.iter().chain(gyro.iter()) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn empty_block_yields_nothing() {
        let result = scan_block(&[]);
        assert!(result.records.is_empty());
        assert!(result.tail_skip.is_none());
    }

    #[test]
    fn single_imu_record() {
        let payload = imu_payload([1.0, 2.0, 3.0], [0.1, 0.2, 0.3]);
        let bytes = tlv(0x01, &payload);
        let result = scan_block(&bytes);
        assert_eq!(result.records.len(), 1);
        assert!(result.tail_skip.is_none());
        match &result.records[0].value {
            TypedValue::Imu(imu) => {
                assert_eq!(imu.accel, [1.0, 2.0, 3.0]);
                assert_eq!(imu.gyro, [0.1, 0.2, 0.3]);
            }
            other => panic!("expected Imu, got {other:?}"),
        }
        assert_eq!(result.records[0].timestamp, None);
    }

    #[test]
    fn timestamp_then_health_inherits_context() {
        let mut bytes = tlv(0x05, &1_700_000_000_000_000u64.to_le_bytes());
        let mut health_payload = Vec::new();
        health_payload.extend_from_slice(&3.7f32.to_le_bytes());
        health_payload.extend_from_slice(&45.5f32.to_le_bytes());
        health_payload.extend_from_slice(&1_048_576u32.to_le_bytes());
        health_payload.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend(tlv(0x03, &health_payload));

        let result = scan_block(&bytes);
        assert_eq!(result.records.len(), 2);
        assert!(matches!(result.records[0].value, TypedValue::Timestamp(Timestamp(1_700_000_000_000_000))));
        match &result.records[1].value {
            TypedValue::Health(h) => {
                assert_eq!(h.battery_voltage, 3.7);
                assert_eq!(h.cpu_temperature, 45.5);
                assert_eq!(h.memory_usage, 1_048_576);
                assert_eq!(h.error_code, 0);
            }
            other => panic!("expected Health, got {other:?}"),
        }
        assert_eq!(result.records[1].timestamp, Some(1_700_000_000_000_000));
    }

    #[test]
    fn malformed_record_does_not_stop_the_scan() {
        let imu_bytes = tlv(0x01, &imu_payload([0.0; 3], [0.0; 3]));
        let bad_temp = tlv(0x02, &[0u8; 7]); // wrong length for Temperature
        let ts_bytes = tlv(0x05, &42u64.to_le_bytes());

        let mut bytes = imu_bytes;
        bytes.extend(bad_temp);
        bytes.extend(ts_bytes);

        let result = scan_block(&bytes);
        assert_eq!(result.records.len(), 3);
        assert!(matches!(result.records[0].value, TypedValue::Imu(_)));
        assert!(matches!(
            result.records[1].value,
            TypedValue::Malformed {
                record_type: 0x02,
                length: 7,
                ..
            }
        ));
        assert!(matches!(result.records[2].value, TypedValue::Timestamp(_)));
        assert!(result.tail_skip.is_none());
    }

    #[test]
    fn unknown_type_is_kept_as_raw() {
        let bytes = tlv(0xEE, b"payload");
        let result = scan_block(&bytes);
        assert_eq!(result.records.len(), 1);
        match &result.records[0].value {
            TypedValue::Raw { record_type, payload } => {
                assert_eq!(*record_type, 0xEE);
                assert_eq!(payload, b"payload");
            }
            other => panic!("expected Raw, got {other:?}"),
        }
    }

    #[test]
    fn length_overrun_discards_remainder_but_keeps_earlier_records() {
        let imu_bytes = tlv(0x01, &imu_payload([0.0; 3], [0.0; 3]));
        let mut bytes = imu_bytes;
        bytes.push(0x02); // type
        bytes.extend_from_slice(&100u16.to_le_bytes()); // length overruns
        bytes.extend_from_slice(&[0u8; 3]); // far fewer bytes than declared

        let result = scan_block(&bytes);
        assert_eq!(result.records.len(), 1);
        assert!(matches!(result.records[0].value, TypedValue::Imu(_)));
        assert_eq!(
            result.tail_skip,
            Some(TailSkip::LengthOverrun {
                record_type: 0x02,
                length: 100
            })
        );
    }

    #[test]
    fn truncated_trailing_header_is_a_tail_skip() {
        let mut bytes = tlv(0x01, &imu_payload([0.0; 3], [0.0; 3]));
        bytes.push(0x02); // one stray byte, not enough for a 3-byte header

        let result = scan_block(&bytes);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.tail_skip, Some(TailSkip::TruncatedHeader));
    }

    #[test]
    fn session_preserves_reserved_trailing_bytes() {
        let mut payload = vec![0xAAu8; 16]; // session_id
        payload.extend_from_slice(&7u32.to_le_bytes()); // firmware_version
        payload.extend_from_slice(&[1, 2, 3, 4]); // reserved
        let bytes = tlv(0x04, &payload);
        let result = scan_block(&bytes);
        match &result.records[0].value {
            TypedValue::Session(s) => {
                assert_eq!(s.session_id, [0xAA; 16]);
                assert_eq!(s.firmware_version, 7);
                assert_eq!(s.reserved, vec![1, 2, 3, 4]);
            }
            other => panic!("expected Session, got {other:?}"),
        }
    }

    #[test]
    fn session_too_short_is_malformed() {
        let bytes = tlv(0x04, &[0u8; 10]);
        let result = scan_block(&bytes);
        assert!(matches!(
            result.records[0].value,
            TypedValue::Malformed {
                record_type: 0x04,
                reason: MalformedReason::TooShort { minimum: 20, got: 10 },
                ..
            }
        ));
    }
}
