use tracing::{info, warn};

use crate::error::ReconfigureError;
use crate::DISCRIMINATOR;

/// Shortest accepted heartbeat interval, in seconds.
pub const MIN_INTERVAL: u32 = 1;

/// Longest accepted heartbeat interval (one day), in seconds.
pub const MAX_INTERVAL: u32 = 86_400;

/// Parse a heartbeat reconfiguration MT payload: `[255][u32 interval]`.
///
/// Up to four bytes after the discriminator are read big-endian; a shorter
/// tail is read as a shorter big-endian number and anything past byte 4 is
/// ignored.
pub fn parse_reconfigure(payload: &[u8]) -> Result<u32, ReconfigureError> {
    if payload.len() < 2 {
        return Err(ReconfigureError::TooShort(payload.len()));
    }
    if payload[0] != DISCRIMINATOR {
        return Err(ReconfigureError::WrongDiscriminator(payload[0]));
    }
    let end = payload.len().min(5);
    let interval = payload[1..end]
        .iter()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));
    if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
        return Err(ReconfigureError::OutOfRange(interval));
    }
    Ok(interval)
}

/// Apply a reconfiguration request to the current interval.
///
/// Rejected requests leave `previous` untouched; the rejection is only
/// logged.
pub fn decode_reconfigure(payload: &[u8], previous: u32) -> u32 {
    match parse_reconfigure(payload) {
        Ok(interval) => {
            info!(interval, previous, "remote request changed heartbeat interval");
            interval
        }
        Err(err) => {
            warn!(error = %err, previous, "ignoring heartbeat reconfiguration");
            previous
        }
    }
}

/// Build a reconfiguration payload (ground-side helper).
pub fn encode_reconfigure(interval: u32) -> [u8; 5] {
    let [a, b, c, d] = interval.to_be_bytes();
    [DISCRIMINATOR, a, b, c, d]
}
