//! Satellite IoT modem capability.
//!
//! The client never talks to a serial port directly. It drives a
//! [`SatelliteModem`] implementation that hides vendor command syntax and
//! framing, and consumes the data model and event vocabulary defined here.
//!
//! This is the lowest layer of nanomodem. Everything else builds on top of
//! the [`SatelliteModem`] trait.

pub mod error;
pub mod event;
pub mod registry;
pub mod simulated;
pub mod traits;
pub mod types;
pub mod urc;

pub use error::{ModemError, Result, UrcParseError};
pub use event::{decode_mask, encode_mask, parse_urc, EventNotification, EventSet, DEFINED_MASK};
pub use registry::{LinkSettings, ModemFactory, ModemModel, ModemRegistry};
pub use simulated::{SimFault, SimHandle, SimulatedConfig, SimulatedModem};
pub use traits::{DynModem, SatelliteModem};
pub use types::{
    AcquisitionSummary, GnssLocation, MessageId, MessageState, MoMessage, MtMessage,
    MtMessageStub, NetworkProtocol, NetworkState, SignalQuality,
};
pub use urc::UrcQueue;
