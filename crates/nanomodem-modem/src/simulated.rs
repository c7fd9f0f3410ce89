//! In-process modem for demos and deterministic tests.
//!
//! [`SimulatedModem`] keeps its queues in memory and answers every command
//! immediately. A cloneable [`SimHandle`] shares the same state so a test
//! can inject downlink messages, raise events, flip transmit permission or
//! fail the next command while the modem itself is owned by a client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{ModemError, Result};
use crate::event::{EventNotification, EventSet};
use crate::registry::ModemModel;
use crate::traits::SatelliteModem;
use crate::types::{
    AcquisitionSummary, GnssLocation, MessageId, MessageState, MoMessage, MtMessage,
    MtMessageStub, NetworkProtocol, NetworkState, SignalQuality,
};
use crate::urc::UrcQueue;

/// Behaviour of a [`SimulatedModem`].
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    pub network: NetworkProtocol,
    pub mobile_id: String,
    pub firmware_version: String,
    pub location: Option<GnssLocation>,
    pub signal_quality: SignalQuality,
    pub snr: f64,
    pub transmit_allowed: bool,
    /// Time after submission at which MO messages complete. `None` leaves
    /// completion to [`SimHandle::complete_mo`].
    pub mo_latency: Option<Duration>,
    /// Fixed value for `get_system_time`; wall clock when `None`.
    pub system_time: Option<u32>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            network: NetworkProtocol::Ogx,
            mobile_id: "01000000SKYEE3D".to_string(),
            firmware_version: "sim-1.0.0".to_string(),
            location: Some(GnssLocation::new(45.3421, -75.9147)),
            signal_quality: SignalQuality::Good,
            snr: 41.5,
            transmit_allowed: true,
            mo_latency: Some(Duration::ZERO),
            system_time: None,
        }
    }
}

/// Failure to raise on the next command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// The modem answers with an error result.
    CommandError,
    /// The modem does not answer.
    Timeout,
    /// The serial link drops.
    LinkLost,
}

#[derive(Debug)]
struct PendingMo {
    message: MoMessage,
    submitted: Instant,
}

#[derive(Debug)]
struct SimState {
    config: SimulatedConfig,
    connected: bool,
    connect_count: usize,
    disconnect_count: usize,
    fail_connect: bool,
    fault: Option<SimFault>,
    command_faults: Vec<(String, SimFault)>,
    event_mask: EventSet,
    active: EventSet,
    trace_enabled: bool,
    next_id: MessageId,
    mo_queue: Vec<PendingMo>,
    mt_queue: Vec<MtMessage>,
    sent: Vec<Bytes>,
    mo_deleted: Vec<MessageId>,
    mt_deleted: Vec<MessageId>,
    commands: usize,
    urcs: UrcQueue,
}

impl SimState {
    /// Bookkeeping shared by every command.
    fn command(&mut self, name: &str) -> Result<()> {
        if !self.connected {
            return Err(ModemError::NotConnected);
        }
        self.commands += 1;
        trace!(command = name, "simulated command");
        let armed = self
            .command_faults
            .iter()
            .position(|(command, _)| command == name)
            .map(|index| self.command_faults.remove(index).1);
        if let Some(fault) = self.fault.take().or(armed) {
            return Err(match fault {
                SimFault::CommandError => ModemError::Command {
                    command: name.to_string(),
                    reason: "ERROR".to_string(),
                },
                SimFault::Timeout => ModemError::Timeout {
                    command: name.to_string(),
                    timeout: Duration::from_secs(5),
                },
                SimFault::LinkLost => {
                    self.connected = false;
                    ModemError::Disconnected(format!("link lost during {name}"))
                }
            });
        }
        self.advance();
        Ok(())
    }

    /// Complete MO messages whose latency elapsed.
    fn advance(&mut self) {
        let Some(latency) = self.config.mo_latency else {
            return;
        };
        let due: Vec<MessageId> = self
            .mo_queue
            .iter()
            .filter(|pending| {
                !pending.message.state.is_complete() && pending.submitted.elapsed() >= latency
            })
            .map(|pending| pending.message.id)
            .collect();
        for id in due {
            self.finish_mo(id, true);
        }
    }

    fn finish_mo(&mut self, id: MessageId, success: bool) -> bool {
        let Some(pending) = self.mo_queue.iter_mut().find(|p| p.message.id == id) else {
            return false;
        };
        pending.message.state = if success {
            MessageState::CompleteSuccess
        } else {
            MessageState::CompleteFailed
        };
        self.raise(EventNotification::MessageMoComplete);
        true
    }

    fn raise(&mut self, event: EventNotification) {
        self.active.insert(event);
        if self.event_mask.contains(event) {
            self.urcs.push(format!("%EVNT: {}", event.name()));
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.next_id
    }

    fn system_time(&self) -> u32 {
        self.config.system_time.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
                .unwrap_or(0)
        })
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A modem that lives entirely in memory.
#[derive(Debug)]
pub struct SimulatedModem {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedModem {
    pub fn new(config: SimulatedConfig) -> Self {
        let state = SimState {
            config,
            connected: false,
            connect_count: 0,
            disconnect_count: 0,
            fail_connect: false,
            fault: None,
            command_faults: Vec::new(),
            event_mask: EventSet::empty(),
            active: EventSet::empty(),
            trace_enabled: false,
            next_id: 0,
            mo_queue: Vec::new(),
            mt_queue: Vec::new(),
            sent: Vec::new(),
            mo_deleted: Vec::new(),
            mt_deleted: Vec::new(),
            commands: 0,
            urcs: UrcQueue::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Shared handle for inspection and fault injection.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }
}

impl SatelliteModem for SimulatedModem {
    fn connect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connect_count += 1;
        if state.fail_connect {
            return Err(ModemError::Connect {
                port: "simulated".to_string(),
                reason: "no response to AT".to_string(),
            });
        }
        state.connected = true;
        debug!(mobile_id = %state.config.mobile_id, "simulated modem connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.disconnect_count += 1;
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn get_model(&mut self) -> Result<ModemModel> {
        self.state().command("ATI4")?;
        Ok(ModemModel::Simulated)
    }

    fn get_mobile_id(&mut self) -> Result<String> {
        let mut state = self.state();
        state.command("AT+GSN")?;
        Ok(state.config.mobile_id.clone())
    }

    fn get_firmware_version(&mut self) -> Result<String> {
        let mut state = self.state();
        state.command("AT+GMR")?;
        Ok(state.config.firmware_version.clone())
    }

    fn get_network(&mut self) -> Result<NetworkProtocol> {
        let mut state = self.state();
        state.command("ATS90")?;
        Ok(state.config.network)
    }

    fn get_acquisition_summary(&mut self) -> Result<AcquisitionSummary> {
        let mut state = self.state();
        state.command("ATS54")?;
        Ok(AcquisitionSummary {
            network: state.config.network,
            state: NetworkState::Registered,
            signal_quality: state.config.signal_quality,
            snr: state.config.snr,
            tx_allowed: state.config.transmit_allowed,
        })
    }

    fn get_system_time(&mut self) -> Result<u32> {
        let mut state = self.state();
        state.command("AT%UTC")?;
        Ok(state.system_time())
    }

    fn get_location(&mut self) -> Result<Option<GnssLocation>> {
        let mut state = self.state();
        state.command("AT%GPS")?;
        Ok(state.config.location)
    }

    fn get_signal_quality(&mut self) -> Result<SignalQuality> {
        let mut state = self.state();
        state.command("ATS57")?;
        Ok(state.config.signal_quality)
    }

    fn get_snr(&mut self) -> Result<f64> {
        let mut state = self.state();
        state.command("ATS57")?;
        Ok(state.config.snr)
    }

    fn set_event_mask(&mut self, events: EventSet) -> Result<bool> {
        let mut state = self.state();
        state.command("ATS88")?;
        state.event_mask = events;
        Ok(true)
    }

    fn get_active_events_mask(&mut self) -> Result<u32> {
        let mut state = self.state();
        state.command("ATS89")?;
        let mask = state.active.mask();
        state.active.clear();
        Ok(mask)
    }

    fn enable_network_trace(&mut self) -> Result<bool> {
        let mut state = self.state();
        state.command("AT%EVMON")?;
        state.trace_enabled = state.config.network == NetworkProtocol::Idp;
        Ok(state.trace_enabled)
    }

    fn get_urc(&mut self) -> Option<String> {
        self.state().urcs.pop()
    }

    fn is_transmit_allowed(&mut self) -> Result<bool> {
        let mut state = self.state();
        state.command("ATS54")?;
        Ok(state.config.transmit_allowed)
    }

    fn mo_message_send(&mut self, payload: &[u8]) -> Result<Option<MoMessage>> {
        let mut state = self.state();
        state.command("AT%MGRT")?;
        if !state.config.transmit_allowed {
            return Ok(None);
        }
        let id = state.allocate_id();
        let message = MoMessage {
            id,
            size: payload.len(),
            state: MessageState::Submitted,
        };
        state.sent.push(Bytes::copy_from_slice(payload));
        state.mo_queue.push(PendingMo {
            message: message.clone(),
            submitted: Instant::now(),
        });
        Ok(Some(message))
    }

    fn get_mo_message_queue(&mut self) -> Result<Vec<MoMessage>> {
        let mut state = self.state();
        state.command("AT%MGRS")?;
        Ok(state
            .mo_queue
            .iter()
            .map(|pending| pending.message.clone())
            .collect())
    }

    fn mo_message_delete(&mut self, id: MessageId) -> Result<bool> {
        let mut state = self.state();
        state.command("AT%MGRD")?;
        let before = state.mo_queue.len();
        state.mo_queue.retain(|pending| pending.message.id != id);
        let removed = state.mo_queue.len() != before;
        state.mo_deleted.push(id);
        Ok(removed)
    }

    fn get_mt_message_queue(&mut self) -> Result<Vec<MtMessageStub>> {
        let mut state = self.state();
        state.command("AT%MGFN")?;
        Ok(state
            .mt_queue
            .iter()
            .map(|message| MtMessageStub {
                id: message.id,
                size: message.size,
            })
            .collect())
    }

    fn mt_message_recv(&mut self, stub: &MtMessageStub) -> Result<Option<MtMessage>> {
        let mut state = self.state();
        state.command("AT%MGFG")?;
        Ok(state
            .mt_queue
            .iter()
            .find(|message| message.id == stub.id)
            .cloned())
    }

    fn mt_message_delete(&mut self, id: MessageId) -> Result<bool> {
        let mut state = self.state();
        state.command("AT%MGFM")?;
        let before = state.mt_queue.len();
        state.mt_queue.retain(|message| message.id != id);
        let removed = state.mt_queue.len() != before;
        state.mt_deleted.push(id);
        Ok(removed)
    }
}

/// Shared view of a [`SimulatedModem`]'s state.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    /// Queue a downlink message and raise `MESSAGE_MT_RECEIVED`.
    pub fn inject_mt(&self, payload: impl Into<Bytes>) -> MessageId {
        let mut state = self.state();
        let payload = payload.into();
        let id = state.allocate_id();
        state.mt_queue.push(MtMessage {
            id,
            size: payload.len(),
            payload,
            state: MessageState::CompleteSuccess,
        });
        state.raise(EventNotification::MessageMtReceived);
        id
    }

    /// Queue a downlink entry exactly as given, without raising an event.
    pub fn inject_raw_mt(&self, message: MtMessage) {
        self.state().mt_queue.push(message);
    }

    /// Queue an MO entry exactly as given, as if left over from a previous
    /// session.
    pub fn inject_mo(&self, message: MoMessage) {
        self.state().mo_queue.push(PendingMo {
            message,
            submitted: Instant::now(),
        });
    }

    /// Move an MO message to a terminal state and raise `MESSAGE_MO_COMPLETE`.
    pub fn complete_mo(&self, id: MessageId, success: bool) -> bool {
        self.state().finish_mo(id, success)
    }

    /// Assert an event in the register (and as a URC when subscribed).
    pub fn raise(&self, event: EventNotification) {
        self.state().raise(event);
    }

    /// Append a raw unsolicited notification.
    pub fn push_urc(&self, raw: impl Into<String>) {
        self.state().urcs.push(raw);
    }

    pub fn set_transmit_allowed(&self, allowed: bool) {
        self.state().config.transmit_allowed = allowed;
    }

    pub fn set_location(&self, location: Option<GnssLocation>) {
        self.state().config.location = location;
    }

    pub fn set_snr(&self, snr: f64) {
        self.state().config.snr = snr;
    }

    pub fn set_system_time(&self, time: u32) {
        self.state().config.system_time = Some(time);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    /// Fail the next command with `fault`.
    pub fn fail_next(&self, fault: SimFault) {
        self.state().fault = Some(fault);
    }

    /// Fail the next exchange of one command, e.g. `"ATS88"`.
    pub fn fail_command(&self, command: &str, fault: SimFault) {
        self.state()
            .command_faults
            .push((command.to_string(), fault));
    }

    /// Every payload accepted by `mo_message_send`, in order.
    pub fn sent_payloads(&self) -> Vec<Bytes> {
        self.state().sent.clone()
    }

    pub fn mo_queue(&self) -> Vec<MoMessage> {
        self.state()
            .mo_queue
            .iter()
            .map(|pending| pending.message.clone())
            .collect()
    }

    pub fn mt_queue_len(&self) -> usize {
        self.state().mt_queue.len()
    }

    /// Ids passed to `mo_message_delete`, in call order.
    pub fn mo_deleted(&self) -> Vec<MessageId> {
        self.state().mo_deleted.clone()
    }

    /// Ids passed to `mt_message_delete`, in call order.
    pub fn mt_deleted(&self) -> Vec<MessageId> {
        self.state().mt_deleted.clone()
    }

    pub fn event_mask(&self) -> EventSet {
        self.state().event_mask
    }

    pub fn trace_enabled(&self) -> bool {
        self.state().trace_enabled
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn connect_count(&self) -> usize {
        self.state().connect_count
    }

    pub fn disconnect_count(&self) -> usize {
        self.state().disconnect_count
    }

    /// Commands issued so far (excluding connect/disconnect and URC reads).
    pub fn command_count(&self) -> usize {
        self.state().commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> SimulatedModem {
        SimulatedModem::new(SimulatedConfig {
            mo_latency: None,
            ..SimulatedConfig::default()
        })
    }

    #[test]
    fn commands_require_connection() {
        let mut modem = manual();
        assert!(matches!(modem.get_snr(), Err(ModemError::NotConnected)));
        modem.connect().unwrap();
        assert_eq!(modem.get_snr().unwrap(), 41.5);
    }

    #[test]
    fn connect_failure_is_reported() {
        let mut modem = manual();
        modem.handle().set_fail_connect(true);
        let err = modem.connect().unwrap_err();
        assert!(matches!(err, ModemError::Connect { .. }));
        assert!(!modem.is_connected());
    }

    #[test]
    fn mo_lifecycle_with_manual_completion() {
        let mut modem = manual();
        let handle = modem.handle();
        modem.connect().unwrap();
        modem
            .set_event_mask(EventSet::from(EventNotification::MessageMoComplete))
            .unwrap();

        let sent = modem.mo_message_send(b"hello").unwrap().expect("handle");
        assert_eq!(sent.state, MessageState::Submitted);
        assert_eq!(modem.get_active_events_mask().unwrap(), 0);

        assert!(handle.complete_mo(sent.id, true));
        assert_eq!(modem.get_urc().as_deref(), Some("%EVNT: MESSAGE_MO_COMPLETE"));
        assert_eq!(
            modem.get_active_events_mask().unwrap(),
            EventNotification::MessageMoComplete.bit()
        );
        // register is cleared on read
        assert_eq!(modem.get_active_events_mask().unwrap(), 0);

        let queue = modem.get_mo_message_queue().unwrap();
        assert_eq!(queue[0].state, MessageState::CompleteSuccess);
        assert!(modem.mo_message_delete(sent.id).unwrap());
        assert!(modem.get_mo_message_queue().unwrap().is_empty());
        assert_eq!(handle.mo_deleted(), vec![sent.id]);
    }

    #[test]
    fn zero_latency_completes_on_next_command() {
        let mut modem = SimulatedModem::new(SimulatedConfig::default());
        modem.connect().unwrap();
        let sent = modem.mo_message_send(b"x").unwrap().expect("handle");
        let queue = modem.get_mo_message_queue().unwrap();
        assert_eq!(queue[0].id, sent.id);
        assert!(queue[0].state.is_complete());
    }

    #[test]
    fn urc_only_for_subscribed_events() {
        let mut modem = manual();
        let handle = modem.handle();
        modem.connect().unwrap();
        handle.inject_mt(vec![1u8, 2, 3]);
        assert!(modem.get_urc().is_none());

        modem
            .set_event_mask(EventSet::from(EventNotification::MessageMtReceived))
            .unwrap();
        handle.inject_mt(vec![4u8]);
        assert_eq!(modem.get_urc().as_deref(), Some("%EVNT: MESSAGE_MT_RECEIVED"));
    }

    #[test]
    fn mt_retrieval_and_delete() {
        let mut modem = manual();
        let handle = modem.handle();
        modem.connect().unwrap();
        let id = handle.inject_mt(vec![255u8, 0, 0, 0, 60]);

        let stubs = modem.get_mt_message_queue().unwrap();
        assert_eq!(stubs, vec![MtMessageStub { id, size: 5 }]);
        let message = modem.mt_message_recv(&stubs[0]).unwrap().expect("message");
        assert_eq!(message.payload.as_ref(), &[255, 0, 0, 0, 60]);
        assert!(modem.mt_message_delete(id).unwrap());
        assert_eq!(handle.mt_queue_len(), 0);
    }

    #[test]
    fn injected_fault_hits_next_command_only() {
        let mut modem = manual();
        let handle = modem.handle();
        modem.connect().unwrap();

        handle.fail_next(SimFault::CommandError);
        assert!(matches!(modem.get_snr(), Err(ModemError::Command { .. })));
        assert!(modem.get_snr().is_ok());

        handle.fail_next(SimFault::LinkLost);
        let err = modem.get_location().unwrap_err();
        assert!(err.is_fatal());
        assert!(!modem.is_connected());
    }

    #[test]
    fn command_fault_waits_for_its_command() {
        let mut modem = manual();
        let handle = modem.handle();
        modem.connect().unwrap();

        handle.fail_command("ATS88", SimFault::Timeout);
        assert!(modem.get_snr().is_ok());
        let err = modem.set_event_mask(EventSet::empty()).unwrap_err();
        assert!(matches!(err, ModemError::Timeout { .. }));
        assert!(modem.set_event_mask(EventSet::empty()).unwrap());
    }

    #[test]
    fn send_refused_while_transmit_disallowed() {
        let mut modem = manual();
        let handle = modem.handle();
        modem.connect().unwrap();
        handle.set_transmit_allowed(false);
        assert!(!modem.is_transmit_allowed().unwrap());
        assert!(modem.mo_message_send(b"blocked").unwrap().is_none());
        assert!(handle.sent_payloads().is_empty());
    }

    #[test]
    fn network_trace_only_on_idp() {
        let mut ogx = manual();
        ogx.connect().unwrap();
        assert!(!ogx.enable_network_trace().unwrap());

        let mut idp = SimulatedModem::new(SimulatedConfig {
            network: NetworkProtocol::Idp,
            ..SimulatedConfig::default()
        });
        idp.connect().unwrap();
        assert!(idp.enable_network_trace().unwrap());
        assert!(idp.handle().trace_enabled());
    }
}
