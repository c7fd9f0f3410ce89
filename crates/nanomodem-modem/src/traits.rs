use crate::error::{Result, UrcParseError};
use crate::event::{self, EventNotification, EventSet};
use crate::registry::ModemModel;
use crate::types::{
    AcquisitionSummary, GnssLocation, MessageId, MoMessage, MtMessage, MtMessageStub,
    NetworkProtocol, SignalQuality,
};

/// The satellite modem role consumed by the client.
///
/// Vendor implementations hide command syntax, serial framing and protocol
/// differences behind this trait. Every command takes `&mut self`: the link
/// carries one outstanding command/response exchange at a time, and the
/// borrow checker keeps callers from overlapping them.
pub trait SatelliteModem {
    /// Open the link and bring the modem to a usable state.
    fn connect(&mut self) -> Result<()>;

    /// Release the link. Must be safe to call more than once.
    fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn get_model(&mut self) -> Result<ModemModel>;

    fn get_mobile_id(&mut self) -> Result<String>;

    fn get_firmware_version(&mut self) -> Result<String>;

    fn get_network(&mut self) -> Result<NetworkProtocol>;

    fn get_acquisition_summary(&mut self) -> Result<AcquisitionSummary>;

    /// Network-synchronised time in Unix seconds.
    fn get_system_time(&mut self) -> Result<u32>;

    /// Current GNSS fix, or `None` without one.
    fn get_location(&mut self) -> Result<Option<GnssLocation>>;

    fn get_signal_quality(&mut self) -> Result<SignalQuality>;

    fn get_snr(&mut self) -> Result<f64>;

    /// Select which events raise unsolicited notifications.
    ///
    /// Returns `false` when the modem refused the mask.
    fn set_event_mask(&mut self, events: EventSet) -> Result<bool>;

    /// Raw event register of events asserted since the last read.
    fn get_active_events_mask(&mut self) -> Result<u32>;

    /// Enable caching of network trace events (IDP only).
    fn enable_network_trace(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Pop the oldest unsolicited notification queued by the link reader.
    ///
    /// Never blocks.
    fn get_urc(&mut self) -> Option<String>;

    /// Interpret a raw unsolicited notification.
    fn parse_urc(&self, raw: &str) -> std::result::Result<Option<EventNotification>, UrcParseError> {
        event::parse_urc(raw)
    }

    fn is_transmit_allowed(&mut self) -> Result<bool>;

    /// Queue a mobile-originated message. `None` means the modem accepted the
    /// command but returned no handle.
    fn mo_message_send(&mut self, payload: &[u8]) -> Result<Option<MoMessage>>;

    fn get_mo_message_queue(&mut self) -> Result<Vec<MoMessage>>;

    fn mo_message_delete(&mut self, id: MessageId) -> Result<bool>;

    fn get_mt_message_queue(&mut self) -> Result<Vec<MtMessageStub>>;

    fn mt_message_recv(&mut self, stub: &MtMessageStub) -> Result<Option<MtMessage>>;

    fn mt_message_delete(&mut self, id: MessageId) -> Result<bool>;
}

/// A vendor implementation chosen at runtime.
pub type DynModem = Box<dyn SatelliteModem + Send>;

impl<M: SatelliteModem + ?Sized> SatelliteModem for Box<M> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn get_model(&mut self) -> Result<ModemModel> {
        (**self).get_model()
    }

    fn get_mobile_id(&mut self) -> Result<String> {
        (**self).get_mobile_id()
    }

    fn get_firmware_version(&mut self) -> Result<String> {
        (**self).get_firmware_version()
    }

    fn get_network(&mut self) -> Result<NetworkProtocol> {
        (**self).get_network()
    }

    fn get_acquisition_summary(&mut self) -> Result<AcquisitionSummary> {
        (**self).get_acquisition_summary()
    }

    fn get_system_time(&mut self) -> Result<u32> {
        (**self).get_system_time()
    }

    fn get_location(&mut self) -> Result<Option<GnssLocation>> {
        (**self).get_location()
    }

    fn get_signal_quality(&mut self) -> Result<SignalQuality> {
        (**self).get_signal_quality()
    }

    fn get_snr(&mut self) -> Result<f64> {
        (**self).get_snr()
    }

    fn set_event_mask(&mut self, events: EventSet) -> Result<bool> {
        (**self).set_event_mask(events)
    }

    fn get_active_events_mask(&mut self) -> Result<u32> {
        (**self).get_active_events_mask()
    }

    fn enable_network_trace(&mut self) -> Result<bool> {
        (**self).enable_network_trace()
    }

    fn get_urc(&mut self) -> Option<String> {
        (**self).get_urc()
    }

    fn parse_urc(&self, raw: &str) -> std::result::Result<Option<EventNotification>, UrcParseError> {
        (**self).parse_urc(raw)
    }

    fn is_transmit_allowed(&mut self) -> Result<bool> {
        (**self).is_transmit_allowed()
    }

    fn mo_message_send(&mut self, payload: &[u8]) -> Result<Option<MoMessage>> {
        (**self).mo_message_send(payload)
    }

    fn get_mo_message_queue(&mut self) -> Result<Vec<MoMessage>> {
        (**self).get_mo_message_queue()
    }

    fn mo_message_delete(&mut self, id: MessageId) -> Result<bool> {
        (**self).mo_message_delete(id)
    }

    fn get_mt_message_queue(&mut self) -> Result<Vec<MtMessageStub>> {
        (**self).get_mt_message_queue()
    }

    fn mt_message_recv(&mut self, stub: &MtMessageStub) -> Result<Option<MtMessage>> {
        (**self).mt_message_recv(stub)
    }

    fn mt_message_delete(&mut self, id: MessageId) -> Result<bool> {
        (**self).mt_message_delete(id)
    }
}
