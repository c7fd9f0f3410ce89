//! Modem event notifications.
//!
//! The modem reports activity through a bit-packed event register. Each
//! defined bit maps to one [`EventNotification`]; bits outside the table
//! are ignored when decoding, so a newer firmware that sets extra bits
//! never produces an error here.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

use crate::error::UrcParseError;

/// A single event category reported by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventNotification {
    GnssFixNew,
    MessageMtReceived,
    MessageMoComplete,
    NetworkRegistered,
    ModemResetComplete,
    JamCutStateChange,
    ModemResetPending,
    WakeupIntervalChange,
    UtcTimeSync,
    GnssFixTimeout,
    EventTraceCached,
    NetworkPingAcknowledged,
    NetinfoUpdate,
}

/// Bit position of every defined event, in register order.
const EVENT_TABLE: [(EventNotification, u32); 13] = [
    (EventNotification::GnssFixNew, 0),
    (EventNotification::MessageMtReceived, 1),
    (EventNotification::MessageMoComplete, 2),
    (EventNotification::NetworkRegistered, 3),
    (EventNotification::ModemResetComplete, 4),
    (EventNotification::JamCutStateChange, 5),
    (EventNotification::ModemResetPending, 6),
    (EventNotification::WakeupIntervalChange, 7),
    (EventNotification::UtcTimeSync, 8),
    (EventNotification::GnssFixTimeout, 9),
    (EventNotification::EventTraceCached, 10),
    (EventNotification::NetworkPingAcknowledged, 11),
    (EventNotification::NetinfoUpdate, 12),
];

/// All bits that correspond to a defined event.
pub const DEFINED_MASK: u32 = 0x1FFF;

impl EventNotification {
    /// Every defined event, in register order.
    pub const ALL: [EventNotification; 13] = [
        EventNotification::GnssFixNew,
        EventNotification::MessageMtReceived,
        EventNotification::MessageMoComplete,
        EventNotification::NetworkRegistered,
        EventNotification::ModemResetComplete,
        EventNotification::JamCutStateChange,
        EventNotification::ModemResetPending,
        EventNotification::WakeupIntervalChange,
        EventNotification::UtcTimeSync,
        EventNotification::GnssFixTimeout,
        EventNotification::EventTraceCached,
        EventNotification::NetworkPingAcknowledged,
        EventNotification::NetinfoUpdate,
    ];

    /// Register bit position of this event.
    pub fn bit_position(self) -> u32 {
        EVENT_TABLE
            .iter()
            .find(|(event, _)| *event == self)
            .map(|(_, bit)| *bit)
            .unwrap_or_default()
    }

    /// Single-bit mask of this event.
    pub fn bit(self) -> u32 {
        1 << self.bit_position()
    }

    /// Event at a register bit position, if defined.
    pub fn from_bit_position(bit: u32) -> Option<Self> {
        EVENT_TABLE
            .iter()
            .find(|(_, position)| *position == bit)
            .map(|(event, _)| *event)
    }

    /// Canonical upper-case name, as used in notifications and logs.
    pub fn name(self) -> &'static str {
        match self {
            EventNotification::GnssFixNew => "GNSS_FIX_NEW",
            EventNotification::MessageMtReceived => "MESSAGE_MT_RECEIVED",
            EventNotification::MessageMoComplete => "MESSAGE_MO_COMPLETE",
            EventNotification::NetworkRegistered => "NETWORK_REGISTERED",
            EventNotification::ModemResetComplete => "MODEM_RESET_COMPLETE",
            EventNotification::JamCutStateChange => "JAM_CUT_STATE_CHANGE",
            EventNotification::ModemResetPending => "MODEM_RESET_PENDING",
            EventNotification::WakeupIntervalChange => "WAKEUP_INTERVAL_CHANGE",
            EventNotification::UtcTimeSync => "UTC_TIME_SYNC",
            EventNotification::GnssFixTimeout => "GNSS_FIX_TIMEOUT",
            EventNotification::EventTraceCached => "EVENT_TRACE_CACHED",
            EventNotification::NetworkPingAcknowledged => "NETWORK_PING_ACKNOWLEDGED",
            EventNotification::NetinfoUpdate => "NETINFO_UPDATE",
        }
    }

    /// Look up an event by its canonical name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EventNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of events, stored as a mask restricted to [`DEFINED_MASK`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventSet(u32);

impl EventSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Decode a raw register value. Undefined bits are dropped.
    pub const fn from_mask(mask: u32) -> Self {
        Self(mask & DEFINED_MASK)
    }

    /// Raw register value for this set.
    pub const fn mask(self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, event: EventNotification) {
        self.0 |= event.bit();
    }

    pub fn remove(&mut self, event: EventNotification) {
        self.0 &= !event.bit();
    }

    pub fn contains(self, event: EventNotification) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Events in register order.
    pub fn iter(self) -> impl Iterator<Item = EventNotification> {
        EVENT_TABLE
            .into_iter()
            .filter(move |(_, bit)| self.0 & (1u32 << *bit) != 0)
            .map(|(event, _)| event)
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<EventNotification> for EventSet {
    fn from(event: EventNotification) -> Self {
        Self(event.bit())
    }
}

impl FromIterator<EventNotification> for EventSet {
    fn from_iter<I: IntoIterator<Item = EventNotification>>(iter: I) -> Self {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl Extend<EventNotification> for EventSet {
    fn extend<I: IntoIterator<Item = EventNotification>>(&mut self, iter: I) {
        for event in iter {
            self.insert(event);
        }
    }
}

impl BitOr for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: EventSet) -> EventSet {
        EventSet(self.0 | rhs.0)
    }
}

impl BitOr<EventNotification> for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: EventNotification) -> EventSet {
        EventSet(self.0 | rhs.bit())
    }
}

impl BitOr for EventNotification {
    type Output = EventSet;

    fn bitor(self, rhs: EventNotification) -> EventSet {
        EventSet(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<EventNotification> for EventSet {
    fn bitor_assign(&mut self, rhs: EventNotification) {
        self.insert(rhs);
    }
}

impl BitOrAssign for EventSet {
    fn bitor_assign(&mut self, rhs: EventSet) {
        self.0 |= rhs.0;
    }
}

/// Decode an event register value into the set of defined events.
pub fn decode_mask(mask: u32) -> EventSet {
    EventSet::from_mask(mask)
}

/// Encode a set of events into an event register value.
pub fn encode_mask(events: EventSet) -> u32 {
    events.mask()
}

/// Interpret a raw unsolicited notification.
///
/// Accepts `NAME`, `%TAG: NAME` or a numeric single-event mask
/// (`%TAG: 0x0004`, `%TAG: 4`). Returns `Ok(None)` for blank content or a
/// mask without defined bits, and `Err` when the content cannot be mapped to
/// exactly one event.
pub fn parse_urc(raw: &str) -> std::result::Result<Option<EventNotification>, UrcParseError> {
    let body = match raw.rsplit_once(':') {
        Some((_, body)) => body.trim(),
        None => raw.trim(),
    };
    if body.is_empty() {
        return Ok(None);
    }

    if let Some(mask) = parse_numeric(body) {
        let events = decode_mask(mask);
        return match events.len() {
            0 => Ok(None),
            1 => Ok(events.iter().next()),
            _ => Err(UrcParseError::Ambiguous(mask)),
        };
    }

    EventNotification::from_name(body)
        .map(Some)
        .ok_or_else(|| UrcParseError::Unrecognized(body.to_string()))
}

fn parse_numeric(body: &str) -> Option<u32> {
    if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16).ok();
    }
    body.parse().ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn table_positions_are_unique_and_contiguous() {
        for (index, event) in EventNotification::ALL.into_iter().enumerate() {
            assert_eq!(event.bit_position(), index as u32);
            assert_eq!(EventNotification::from_bit_position(index as u32), Some(event));
        }
        assert_eq!(EventNotification::from_bit_position(13), None);
        let all: EventSet = EventNotification::ALL.into_iter().collect();
        assert_eq!(all.mask(), DEFINED_MASK);
    }

    #[test]
    fn register_layout_matches_modem() {
        assert_eq!(EventNotification::MessageMtReceived.bit(), 0x0002);
        assert_eq!(EventNotification::MessageMoComplete.bit(), 0x0004);
        assert_eq!(EventNotification::NetworkRegistered.bit(), 0x0008);
        assert_eq!(EventNotification::WakeupIntervalChange.bit(), 0x0080);
        assert_eq!(EventNotification::EventTraceCached.bit(), 0x0400);
        assert_eq!(EventNotification::NetinfoUpdate.bit(), 0x1000);
    }

    #[test]
    fn undefined_bits_are_ignored() {
        let events = decode_mask(0xFFFF_E000 | EventNotification::MessageMoComplete.bit());
        assert_eq!(
            events.iter().collect::<Vec<_>>(),
            vec![EventNotification::MessageMoComplete]
        );
        assert!(decode_mask(0xFFFF_E000).is_empty());
    }

    #[test]
    fn names_round_trip() {
        for event in EventNotification::ALL {
            assert_eq!(EventNotification::from_name(event.name()), Some(event));
        }
        assert_eq!(
            EventNotification::from_name("message_mt_received"),
            Some(EventNotification::MessageMtReceived)
        );
        assert_eq!(EventNotification::from_name("NOT_AN_EVENT"), None);
    }

    #[test]
    fn parse_urc_by_name_and_mask() {
        assert_eq!(
            parse_urc("%EVNT: MESSAGE_MO_COMPLETE"),
            Ok(Some(EventNotification::MessageMoComplete))
        );
        assert_eq!(
            parse_urc("NETWORK_REGISTERED\r\n"),
            Ok(Some(EventNotification::NetworkRegistered))
        );
        assert_eq!(
            parse_urc("%EVNT: 0x0002"),
            Ok(Some(EventNotification::MessageMtReceived))
        );
        assert_eq!(parse_urc("%EVNT: 4"), Ok(Some(EventNotification::MessageMoComplete)));
    }

    #[test]
    fn parse_urc_distinguishes_no_event_from_failure() {
        assert_eq!(parse_urc(""), Ok(None));
        assert_eq!(parse_urc("%EVNT: "), Ok(None));
        assert_eq!(parse_urc("%EVNT: 0x8000"), Ok(None));
        assert_eq!(parse_urc("%EVNT: 6"), Err(UrcParseError::Ambiguous(6)));
        assert!(matches!(
            parse_urc("RING"),
            Err(UrcParseError::Unrecognized(body)) if body == "RING"
        ));
    }

    #[test]
    fn debug_lists_event_names() {
        let set = EventNotification::MessageMoComplete | EventNotification::MessageMtReceived;
        assert_eq!(
            format!("{set:?}"),
            "{MessageMtReceived, MessageMoComplete}"
        );
    }

    proptest! {
        #[test]
        fn mask_decoding_is_a_bijection_over_defined_bits(mask in 0u32..=DEFINED_MASK) {
            let set = decode_mask(mask);
            prop_assert_eq!(encode_mask(set), mask);
            prop_assert_eq!(decode_mask(encode_mask(set)), set);
        }

        #[test]
        fn undefined_bits_never_surface(mask in any::<u32>()) {
            let set = decode_mask(mask);
            prop_assert_eq!(set.mask() & !DEFINED_MASK, 0);
            prop_assert_eq!(set.len(), (mask & DEFINED_MASK).count_ones() as usize);
        }
    }
}
