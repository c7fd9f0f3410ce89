use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Opaque identifier the modem assigns to a queued message.
pub type MessageId = u32;

/// A GNSS position in signed decimal degrees.
///
/// `Default` is the "unknown" location (0, 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GnssLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GnssLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for GnssLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

/// Coarse link quality, ordered from no signal to strong.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalQuality {
    #[default]
    None = 0,
    Weak = 1,
    Low = 2,
    Mid = 3,
    Good = 4,
    Strong = 5,
}

impl SignalQuality {
    /// Ordinal value carried on the wire.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Quality for an ordinal value, if defined.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Weak),
            2 => Some(Self::Low),
            3 => Some(Self::Mid),
            4 => Some(Self::Good),
            5 => Some(Self::Strong),
            _ => None,
        }
    }

    /// Signal bars for display, e.g. `"|||  "`.
    pub fn bars(self) -> String {
        let filled = self.value() as usize;
        format!("{}{}", "|".repeat(filled), " ".repeat(5 - filled))
    }
}

/// Satellite network variant the modem is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkProtocol {
    Idp,
    Ogx,
}

impl NetworkProtocol {
    /// Largest data slice per chunk the network accepts in one MO message.
    pub fn default_chunk_size(self) -> usize {
        match self {
            NetworkProtocol::Idp => 6144,
            NetworkProtocol::Ogx => 15360,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NetworkProtocol::Idp => "IDP",
            NetworkProtocol::Ogx => "OGX",
        }
    }
}

/// Network acquisition progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkState {
    #[default]
    Unknown,
    Searching,
    Acquiring,
    Registered,
}

/// Lifecycle of a queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageState {
    Pending,
    Submitted,
    CompleteSuccess,
    CompleteFailed,
}

impl MessageState {
    /// Whether the message reached a terminal state (success or failure).
    pub fn is_complete(self) -> bool {
        matches!(
            self,
            MessageState::CompleteSuccess | MessageState::CompleteFailed
        )
    }
}

/// Handle to a mobile-originated message in the modem's transmit queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoMessage {
    pub id: MessageId,
    pub size: usize,
    pub state: MessageState,
}

/// Queue entry for a mobile-terminated message not yet retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtMessageStub {
    pub id: MessageId,
    pub size: usize,
}

/// A retrieved mobile-terminated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtMessage {
    pub id: MessageId,
    pub size: usize,
    pub payload: Bytes,
    pub state: MessageState,
}

impl MtMessage {
    /// Whether the message carries something worth interpreting.
    pub fn is_deliverable(&self) -> bool {
        self.size > 0 && self.id != 0 && !self.payload.is_empty()
    }

    /// Leading discriminator byte, if any.
    pub fn discriminator(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

/// Snapshot of acquisition and link status for periodic logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionSummary {
    pub network: NetworkProtocol,
    pub state: NetworkState,
    pub signal_quality: SignalQuality,
    pub snr: f64,
    pub tx_allowed: bool,
}

impl fmt::Display for AcquisitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "network={} state={:?} signal=[{}] snr={:.1} tx_allowed={}",
            self.network.name(),
            self.state,
            self.signal_quality.bars(),
            self.snr,
            self.tx_allowed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_quality_ordinals() {
        for value in 0..=5u8 {
            let quality = SignalQuality::from_value(value).expect("defined ordinal");
            assert_eq!(quality.value(), value);
        }
        assert_eq!(SignalQuality::from_value(6), None);
        assert!(SignalQuality::Strong > SignalQuality::Weak);
    }

    #[test]
    fn signal_bars_are_fixed_width() {
        assert_eq!(SignalQuality::None.bars(), "     ");
        assert_eq!(SignalQuality::Mid.bars(), "|||  ");
        assert_eq!(SignalQuality::Strong.bars(), "|||||");
    }

    #[test]
    fn terminal_states() {
        assert!(MessageState::CompleteSuccess.is_complete());
        assert!(MessageState::CompleteFailed.is_complete());
        assert!(!MessageState::Pending.is_complete());
        assert!(!MessageState::Submitted.is_complete());
    }

    #[test]
    fn unknown_location_is_origin() {
        assert_eq!(GnssLocation::default(), GnssLocation::new(0.0, 0.0));
    }

    #[test]
    fn deliverable_requires_id_size_and_payload() {
        let mut message = MtMessage {
            id: 7,
            size: 5,
            payload: Bytes::from_static(&[255, 0, 0, 0, 60]),
            state: MessageState::CompleteSuccess,
        };
        assert!(message.is_deliverable());
        assert_eq!(message.discriminator(), Some(255));

        message.id = 0;
        assert!(!message.is_deliverable());

        message.id = 7;
        message.payload = Bytes::new();
        assert!(!message.is_deliverable());
        assert_eq!(message.discriminator(), None);
    }

    #[test]
    fn chunk_size_follows_network() {
        assert_eq!(NetworkProtocol::Idp.default_chunk_size(), 6144);
        assert_eq!(NetworkProtocol::Ogx.default_chunk_size(), 15360);
    }
}
