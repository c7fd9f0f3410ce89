use bytes::{Buf, BufMut};
use nanomodem_modem::{GnssLocation, SignalQuality};

use crate::error::{CodecError, Result};
use crate::DISCRIMINATOR;

/// Encoded heartbeat size: discriminator (1) + time (4) + lat (4) + lon (4)
/// + signal (1) + SNR (1).
pub const HEARTBEAT_LEN: usize = 15;

/// Coordinates travel as degrees × 60000 (1/1000 minute, about 1.85 m).
pub const COORDINATE_SCALE: f64 = 60_000.0;

/// Live values sampled for one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heartbeat {
    pub timestamp: u32,
    pub location: GnssLocation,
    pub signal_quality: SignalQuality,
    pub snr: f64,
}

impl Heartbeat {
    pub fn encode(&self) -> [u8; HEARTBEAT_LEN] {
        encode_heartbeat(
            self.timestamp,
            self.location,
            self.signal_quality,
            self.snr,
        )
    }
}

/// Encode a heartbeat MO payload.
///
/// Wire format (big-endian):
/// ```text
/// ┌──────┬───────────┬────────────┬────────────┬────────┬──────────┐
/// │ 0xFF │ time (u32)│ lat (i32)  │ lon (i32)  │ signal │ SNR (u8) │
/// │      │ unix secs │ deg×60000  │ deg×60000  │ (u8)   │ rounded  │
/// └──────┴───────────┴────────────┴────────────┴────────┴──────────┘
/// ```
pub fn encode_heartbeat(
    timestamp: u32,
    location: GnssLocation,
    signal_quality: SignalQuality,
    snr: f64,
) -> [u8; HEARTBEAT_LEN] {
    let mut out = [0u8; HEARTBEAT_LEN];
    let mut dst = &mut out[..];
    dst.put_u8(DISCRIMINATOR);
    dst.put_u32(timestamp);
    dst.put_i32(encode_coordinate(location.latitude));
    dst.put_i32(encode_coordinate(location.longitude));
    dst.put_u8(signal_quality.value());
    dst.put_u8(encode_snr(snr));
    out
}

/// Scale degrees to the wire integer, truncating toward zero.
pub fn encode_coordinate(degrees: f64) -> i32 {
    // `as` saturates and maps NaN to 0.
    (degrees * COORDINATE_SCALE) as i32
}

/// Round SNR half-to-even and clamp to one unsigned byte.
pub fn encode_snr(snr: f64) -> u8 {
    snr.round_ties_even().clamp(0.0, f64::from(u8::MAX)) as u8
}

/// Fields of an encoded heartbeat, as seen by the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatFields {
    pub timestamp: u32,
    pub latitude: i32,
    pub longitude: i32,
    pub signal_quality: u8,
    pub snr: u8,
}

impl HeartbeatFields {
    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / COORDINATE_SCALE
    }

    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / COORDINATE_SCALE
    }
}

/// Parse an encoded heartbeat.
pub fn decode_heartbeat(payload: &[u8]) -> Result<HeartbeatFields> {
    if payload.len() < HEARTBEAT_LEN {
        return Err(CodecError::Truncated {
            len: payload.len(),
            need: HEARTBEAT_LEN,
        });
    }
    let mut src = payload;
    if src.get_u8() != DISCRIMINATOR {
        return Err(CodecError::InvalidMarker);
    }
    Ok(HeartbeatFields {
        timestamp: src.get_u32(),
        latitude: src.get_i32(),
        longitude: src.get_i32(),
        signal_quality: src.get_u8(),
        snr: src.get_u8(),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encodes_known_layout() {
        let payload = encode_heartbeat(
            0x6512_3456,
            GnssLocation::new(45.5, -75.25),
            SignalQuality::Good,
            41.6,
        );
        assert_eq!(
            payload,
            [
                0xFF, // discriminator
                0x65, 0x12, 0x34, 0x56, // time
                0x00, 0x29, 0xA8, 0x10, // 45.5 * 60000 = 2730000
                0xFF, 0xBB, 0x1B, 0x48, // -75.25 * 60000 = -4515000
                0x04, // signal
                0x2A, // round(41.6) = 42
            ]
        );
    }

    #[test]
    fn coordinates_truncate_toward_zero() {
        // 1.5 / 60000 degrees: the fraction is dropped on both signs.
        let tiny = 1.5 / COORDINATE_SCALE;
        assert_eq!(encode_coordinate(tiny), 1);
        assert_eq!(encode_coordinate(-tiny), -1);
        assert_eq!(encode_coordinate(0.0), 0);
        assert_eq!(encode_coordinate(f64::NAN), 0);
    }

    #[test]
    fn snr_rounds_half_to_even() {
        assert_eq!(encode_snr(40.5), 40);
        assert_eq!(encode_snr(41.5), 42);
        assert_eq!(encode_snr(41.49), 41);
        assert_eq!(encode_snr(-3.0), 0);
        assert_eq!(encode_snr(300.0), 255);
    }

    #[test]
    fn unknown_location_encodes_as_origin() {
        let fields = decode_heartbeat(&Heartbeat {
            timestamp: 1,
            location: GnssLocation::default(),
            signal_quality: SignalQuality::None,
            snr: 0.0,
        }
        .encode())
        .unwrap();
        assert_eq!((fields.latitude, fields.longitude), (0, 0));
    }

    #[test]
    fn decode_rejects_short_or_foreign_payloads() {
        assert!(matches!(
            decode_heartbeat(&[0xFF; 14]),
            Err(CodecError::Truncated { len: 14, need: 15 })
        ));
        let mut payload = encode_heartbeat(1, GnssLocation::default(), SignalQuality::Mid, 30.0);
        payload[0] = 0x10;
        assert!(matches!(
            decode_heartbeat(&payload),
            Err(CodecError::InvalidMarker)
        ));
    }

    fn signal_quality() -> impl Strategy<Value = SignalQuality> {
        (0u8..=5).prop_map(|v| SignalQuality::from_value(v).unwrap_or_default())
    }

    proptest! {
        #[test]
        fn heartbeat_is_fixed_size_and_recovers_position(
            timestamp in any::<u32>(),
            lat in -90.0f64..=90.0,
            lon in -180.0f64..=180.0,
            quality in signal_quality(),
            snr in 0.0f64..=60.0,
        ) {
            let payload = encode_heartbeat(timestamp, GnssLocation::new(lat, lon), quality, snr);
            prop_assert_eq!(payload.len(), HEARTBEAT_LEN);
            prop_assert_eq!(payload[0], 255);

            let fields = decode_heartbeat(&payload).unwrap();
            prop_assert_eq!(fields.timestamp, timestamp);
            prop_assert!((fields.latitude_degrees() - lat).abs() <= 1.0 / COORDINATE_SCALE + 1e-9);
            prop_assert!((fields.longitude_degrees() - lon).abs() <= 1.0 / COORDINATE_SCALE + 1e-9);
            prop_assert_eq!(fields.signal_quality, quality.value());
        }
    }
}
