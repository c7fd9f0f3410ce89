//! The messaging control loop.
//!
//! One [`ControlLoop`] owns a modem and all scheduling state for a session.
//! Each [`ControlLoop::tick`] collects events (one unsolicited notification,
//! or an active mask poll as fallback), runs the periodic concerns, hands the
//! events to the reconciler and then forgets them.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nanomodem_codec::DISCRIMINATOR;
use nanomodem_modem::{
    decode_mask, AcquisitionSummary, EventNotification, EventSet, MtMessage, NetworkProtocol,
    SatelliteModem,
};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, TransferConfig};
use crate::error::{absorb, ClientError, Result};
use crate::heartbeat::{HeartbeatOutcome, HeartbeatScheduler};
use crate::reconciler::{MoCompletion, Reconciler};
use crate::transfer::{self, TransferReport};

/// Lifecycle of a [`ControlLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Connected,
    EventsRegistered,
    Running,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Disconnected => "disconnected",
            LoopState::Connected => "connected",
            LoopState::EventsRegistered => "events-registered",
            LoopState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Cooperative stop flag shared with a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Events dispatched this tick.
    pub events: EventSet,
    /// An unsolicited notification was dequeued.
    pub notified: bool,
    /// The active event mask was polled.
    pub polled: bool,
    pub summary: Option<AcquisitionSummary>,
    /// `None` when the evaluation failed with a recoverable error.
    pub heartbeat: Option<HeartbeatOutcome>,
    /// MT messages placed in the inbox.
    pub received: usize,
    /// A remote reconfiguration changed the heartbeat interval.
    pub reconfigured: bool,
    pub completed: Vec<MoCompletion>,
}

impl TickReport {
    /// Nothing arrived and nothing was sent.
    pub fn is_idle(&self) -> bool {
        self.events.is_empty()
            && !self.notified
            && !matches!(
                self.heartbeat,
                Some(HeartbeatOutcome::Submitted(_) | HeartbeatOutcome::SubmittedUntracked)
            )
    }
}

/// Events the loop subscribes to for a network variant.
///
/// IDP modems cache network trace events; other networks report network
/// info updates instead.
pub fn events_of_interest(network: Option<NetworkProtocol>) -> EventSet {
    let mut events: EventSet = [
        EventNotification::NetworkRegistered,
        EventNotification::MessageMoComplete,
        EventNotification::MessageMtReceived,
        EventNotification::WakeupIntervalChange,
    ]
    .into_iter()
    .collect();
    match network {
        Some(NetworkProtocol::Idp) => events.insert(EventNotification::EventTraceCached),
        _ => events.insert(EventNotification::NetinfoUpdate),
    }
    events
}

/// Per-session scheduling state, rebuilt on every connect.
#[derive(Debug)]
struct Session {
    events: EventSet,
    network: Option<NetworkProtocol>,
    last_mask_poll: Option<Duration>,
    last_summary: Option<Duration>,
    heartbeat: HeartbeatScheduler,
    reconciler: Reconciler,
    inbox: VecDeque<MtMessage>,
    ticks: u64,
}

impl Session {
    fn new(config: &ClientConfig) -> Self {
        Self {
            events: EventSet::empty(),
            network: None,
            last_mask_poll: None,
            last_summary: None,
            heartbeat: HeartbeatScheduler::new(config.heartbeat_interval),
            reconciler: Reconciler::new(),
            inbox: VecDeque::new(),
            ticks: 0,
        }
    }
}

fn elapsed(last: Option<Duration>, now: Duration, interval: Duration) -> bool {
    last.is_none_or(|last| now.saturating_sub(last) >= interval)
}

/// Drives one modem through connect, event registration and the running
/// tick loop.
///
/// All modem commands are issued from this struct, one at a time. Dropping
/// the loop disconnects the modem, so the link is released even when a tick
/// unwinds.
pub struct ControlLoop<M: SatelliteModem, C = SystemClock> {
    modem: M,
    clock: C,
    config: ClientConfig,
    transfer: TransferConfig,
    state: LoopState,
    session: Session,
}

impl<M: SatelliteModem> ControlLoop<M> {
    /// Create a loop on the system clock.
    pub fn new(modem: M, config: ClientConfig) -> Self {
        Self::with_clock(modem, SystemClock::new(), config)
    }
}

impl<M: SatelliteModem, C: Clock> ControlLoop<M, C> {
    pub fn with_clock(modem: M, clock: C, config: ClientConfig) -> Self {
        let session = Session::new(&config);
        Self {
            modem,
            clock,
            config,
            transfer: TransferConfig::default(),
            state: LoopState::Disconnected,
            session,
        }
    }

    /// Override large-transfer settings.
    pub fn with_transfer_config(mut self, config: TransferConfig) -> Self {
        self.transfer = config;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn modem(&self) -> &M {
        &self.modem
    }

    pub fn modem_mut(&mut self) -> &mut M {
        &mut self.modem
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler {
        &self.session.heartbeat
    }

    /// Network variant read during registration, if it could be read.
    pub fn network(&self) -> Option<NetworkProtocol> {
        self.session.network
    }

    /// Events waiting for the next dispatch.
    pub fn pending_events(&self) -> EventSet {
        self.session.events
    }

    pub fn ticks(&self) -> u64 {
        self.session.ticks
    }

    /// Drain MT messages received since the last call.
    pub fn take_received(&mut self) -> Vec<MtMessage> {
        self.session.inbox.drain(..).collect()
    }

    fn expect_state(&self, operation: &'static str, expected: LoopState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ClientError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Connect the modem. Failure is fatal.
    pub fn connect(&mut self) -> Result<()> {
        self.expect_state("connect", LoopState::Disconnected)?;
        self.modem.connect()?;
        self.session = Session::new(&self.config);
        self.state = LoopState::Connected;
        info!("modem connected");
        Ok(())
    }

    /// Subscribe to the events of interest.
    ///
    /// A refused or failed registration is logged and the loop carries on,
    /// relying on active mask polling.
    pub fn register_events(&mut self) -> Result<EventSet> {
        self.expect_state("register_events", LoopState::Connected)?;

        let network = absorb(self.modem.get_network(), "get_network")?;
        self.session.network = network;
        if network == Some(NetworkProtocol::Idp) {
            match absorb(self.modem.enable_network_trace(), "enable_network_trace")? {
                Some(true) => debug!("network trace monitoring enabled"),
                _ => warn!("could not enable network trace monitoring"),
            }
        }

        let events = events_of_interest(network);
        match absorb(self.modem.set_event_mask(events), "set_event_mask")? {
            Some(true) => info!(?events, "registered events of interest"),
            _ => warn!(?events, "event registration failed, falling back to polling"),
        }

        let mobile_id = absorb(self.modem.get_mobile_id(), "get_mobile_id")?;
        let firmware = absorb(self.modem.get_firmware_version(), "get_firmware_version")?;
        info!(
            mobile_id = mobile_id.as_deref().unwrap_or("unknown"),
            firmware = firmware.as_deref().unwrap_or("unknown"),
            network = network.map(NetworkProtocol::name).unwrap_or("unknown"),
            "session started"
        );

        self.state = LoopState::EventsRegistered;
        Ok(events)
    }

    /// Enter the running state.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state("start", LoopState::EventsRegistered)?;
        if self.config.seed_queue_events {
            self.session
                .events
                .insert(EventNotification::MessageMoComplete);
            self.session
                .events
                .insert(EventNotification::MessageMtReceived);
        }
        self.state = LoopState::Running;
        Ok(())
    }

    /// Run one iteration of the loop.
    ///
    /// Recoverable modem errors are logged and skipped. Only fatal errors are
    /// returned; the caller is expected to [`shutdown`](Self::shutdown).
    pub fn tick(&mut self) -> Result<TickReport> {
        self.expect_state("tick", LoopState::Running)?;
        let now = self.clock.now();
        let mut report = TickReport::default();

        let mut notified_event = false;
        if let Some(raw) = self.modem.get_urc() {
            report.notified = true;
            match self.modem.parse_urc(&raw) {
                Ok(Some(event)) => {
                    debug!(%event, "unsolicited notification");
                    self.session.events.insert(event);
                    notified_event = true;
                }
                Ok(None) => debug!(raw = %raw, "notification carried no event"),
                Err(err) => debug!(raw = %raw, error = %err, "dropping unparseable notification"),
            }
        }

        if !notified_event
            && elapsed(
                self.session.last_mask_poll,
                now,
                self.config.mask_poll_interval,
            )
        {
            self.session.last_mask_poll = Some(now);
            report.polled = true;
            if let Some(mask) = absorb(self.modem.get_active_events_mask(), "get_active_events_mask")?
            {
                let active = decode_mask(mask);
                if !active.is_empty() {
                    debug!(?active, "active events");
                }
                self.session.events |= active;
            }
        }

        if elapsed(self.session.last_summary, now, self.config.summary_interval) {
            self.session.last_summary = Some(now);
            if let Some(summary) =
                absorb(self.modem.get_acquisition_summary(), "get_acquisition_summary")?
            {
                info!(%summary, "acquisition summary");
                report.summary = Some(summary);
            }
        }

        let outcome = absorb(
            self.session.heartbeat.evaluate(&mut self.modem, now),
            "heartbeat",
        )?;
        if let Some(HeartbeatOutcome::Submitted(handle)) = &outcome {
            self.session.reconciler.track(handle, now);
        }
        report.heartbeat = outcome;

        let events = self.session.events;
        for event in events.iter() {
            self.dispatch(event, now, &mut report)?;
        }
        report.events = events;
        self.session.events.clear();
        self.session.ticks += 1;
        Ok(report)
    }

    fn dispatch(
        &mut self,
        event: EventNotification,
        now: Duration,
        report: &mut TickReport,
    ) -> Result<()> {
        match event {
            EventNotification::MessageMtReceived => {
                let messages = absorb(
                    self.session.reconciler.reconcile_mt(&mut self.modem),
                    "reconcile_mt",
                )?
                .unwrap_or_default();
                for message in messages {
                    if message.discriminator() == Some(DISCRIMINATOR) {
                        if self.session.heartbeat.apply_reconfigure(&message.payload) {
                            report.reconfigured = true;
                        }
                    } else {
                        report.received += 1;
                        self.session.inbox.push_back(message);
                    }
                }
            }
            EventNotification::MessageMoComplete => {
                let completed = absorb(
                    self.session.reconciler.reconcile_mo(&mut self.modem, now),
                    "reconcile_mo",
                )?
                .unwrap_or_default();
                report.completed.extend(completed);
            }
            EventNotification::NetworkRegistered => info!("registered on network"),
            EventNotification::WakeupIntervalChange => info!("wakeup interval changed"),
            EventNotification::EventTraceCached | EventNotification::NetinfoUpdate => {
                debug!(%event, "network information updated")
            }
            other => debug!(event = %other, "ignoring event"),
        }
        Ok(())
    }

    /// Connect, register and tick until `stop` is raised or a fatal error
    /// occurs.
    ///
    /// The modem is disconnected on every exit path.
    ///
    /// Ticks run back to back unless [`ClientConfig::idle_pause`] is set, in
    /// which case the loop sleeps that long after each tick with nothing to
    /// do. The default config sets a short pause.
    pub fn run(&mut self, stop: &StopSignal) -> Result<()> {
        let result = self.run_until(stop);
        if let Err(err) = &result {
            warn!(error = %err, state = %self.state, "control loop terminated");
        }
        self.shutdown();
        result
    }

    fn run_until(&mut self, stop: &StopSignal) -> Result<()> {
        if self.state == LoopState::Disconnected {
            self.connect()?;
        }
        if self.state == LoopState::Connected {
            self.register_events()?;
        }
        if self.state == LoopState::EventsRegistered {
            self.start()?;
        }

        while !stop.is_stopped() {
            let report = self.tick()?;
            if report.is_idle() {
                if let Some(pause) = self.config.idle_pause {
                    self.clock.sleep(pause);
                }
            }
        }
        info!(ticks = self.session.ticks, "stop requested");
        Ok(())
    }

    /// Send a large payload in acknowledged chunks.
    ///
    /// Blocks the loop until the transfer completes, fails or `stop` is
    /// raised. Events read from the modem while waiting are queued for the
    /// next tick.
    pub fn send_large(
        &mut self,
        data: impl Into<Bytes>,
        stop: &StopSignal,
    ) -> Result<TransferReport> {
        if self.state == LoopState::Disconnected {
            return Err(ClientError::InvalidState {
                operation: "send_large",
                state: self.state,
            });
        }
        let mut config = self.transfer.clone();
        if config.chunk_size.is_none() {
            config.chunk_size = self
                .session
                .network
                .map(NetworkProtocol::default_chunk_size);
        }
        transfer::send_large_observed(
            &mut self.modem,
            &self.clock,
            data,
            &config,
            stop,
            &mut self.session.events,
        )
    }
}

impl<M: SatelliteModem, C> ControlLoop<M, C> {
    /// Disconnect the modem, best effort. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::Disconnected && !self.modem.is_connected() {
            return;
        }
        if let Err(err) = self.modem.disconnect() {
            warn!(error = %err, "modem disconnect failed");
        }
        info!(
            ticks = self.session.ticks,
            heartbeats = self.session.heartbeat.count(),
            "modem disconnected"
        );
        self.state = LoopState::Disconnected;
    }
}

impl<M: SatelliteModem, C> Drop for ControlLoop<M, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<M: SatelliteModem, C> fmt::Debug for ControlLoop<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlLoop")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("ticks", &self.session.ticks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use nanomodem_modem::{
        MessageState, MoMessage, SimFault, SimHandle, SimulatedConfig, SimulatedModem,
    };

    use super::*;
    use crate::clock::ManualClock;

    fn sim(config: SimulatedConfig) -> (SimulatedModem, SimHandle) {
        let modem = SimulatedModem::new(config);
        let handle = modem.handle();
        (modem, handle)
    }

    fn running(
        modem: SimulatedModem,
        config: ClientConfig,
    ) -> (ControlLoop<SimulatedModem, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut control = ControlLoop::with_clock(modem, clock.clone(), config);
        control.connect().unwrap();
        control.register_events().unwrap();
        control.start().unwrap();
        (control, clock)
    }

    #[test]
    fn remote_reconfiguration_enables_heartbeats() {
        let (modem, handle) = sim(SimulatedConfig {
            system_time: Some(1_700_000_000),
            ..SimulatedConfig::default()
        });
        let (mut control, clock) = running(modem, ClientConfig::default());
        assert_eq!(control.heartbeat().interval(), 0);

        handle.inject_mt(vec![255u8, 0, 0, 0, 60]);
        let report = control.tick().unwrap();
        assert!(report.reconfigured);
        assert_eq!(report.received, 0);
        assert_eq!(control.heartbeat().interval(), 60);
        assert_eq!(report.heartbeat, Some(HeartbeatOutcome::NotDue));

        for _ in 0..180 {
            control.tick().unwrap();
            clock.advance(Duration::from_secs(1));
        }

        // Sent at 0s, 60s and 120s.
        assert_eq!(control.heartbeat().submitted(), 3);
        let heartbeats: Vec<_> = handle
            .sent_payloads()
            .into_iter()
            .filter(|payload| payload.len() == 15 && payload[0] == 255)
            .collect();
        assert_eq!(heartbeats.len(), 3);
        assert!(control.take_received().is_empty());
    }

    #[test]
    fn heartbeat_completions_are_retired() {
        let (modem, handle) = sim(SimulatedConfig {
            mo_latency: None,
            ..SimulatedConfig::default()
        });
        let config = ClientConfig {
            heartbeat_interval: 60,
            ..ClientConfig::default()
        };
        let (mut control, clock) = running(modem, config);

        let first = control.tick().unwrap();
        let Some(HeartbeatOutcome::Submitted(sent)) = first.heartbeat else {
            panic!("expected a submitted heartbeat, got {:?}", first.heartbeat);
        };
        assert!(first.completed.is_empty());

        clock.advance(Duration::from_secs(1));
        handle.complete_mo(sent.id, true);
        let second = control.tick().unwrap();
        assert_eq!(
            second.completed,
            vec![MoCompletion {
                id: sent.id,
                state: MessageState::CompleteSuccess,
                latency: Some(Duration::from_secs(1)),
            }]
        );
        assert!(handle.mo_queue().is_empty());
    }

    #[test]
    fn first_tick_drains_leftover_queues() {
        let (modem, handle) = sim(SimulatedConfig {
            mo_latency: None,
            ..SimulatedConfig::default()
        });
        handle.inject_mo(MoMessage {
            id: 7,
            size: 15,
            state: MessageState::CompleteFailed,
        });
        let (mut control, _clock) = running(modem, ClientConfig::default());
        assert!(control
            .pending_events()
            .contains(EventNotification::MessageMoComplete));

        let report = control.tick().unwrap();
        assert_eq!(report.completed.len(), 1);
        assert_eq!(handle.mo_deleted(), vec![7]);
        assert!(control.pending_events().is_empty());
    }

    #[test]
    fn received_messages_land_in_inbox() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let (mut control, _clock) = running(modem, ClientConfig::default());

        let id = handle.inject_mt(b"hello".to_vec());
        let report = control.tick().unwrap();
        assert_eq!(report.received, 1);

        let inbox = control.take_received();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, id);
        assert_eq!(inbox[0].payload.as_ref(), b"hello");
        assert!(control.take_received().is_empty());
        assert_eq!(handle.mt_deleted(), vec![id]);
    }

    #[test]
    fn mask_is_polled_at_a_bounded_rate() {
        let (modem, _handle) = sim(SimulatedConfig::default());
        let config = ClientConfig {
            seed_queue_events: false,
            ..ClientConfig::default()
        };
        let (mut control, clock) = running(modem, config);

        let mut polls = Vec::new();
        for second in 0..12u64 {
            if control.tick().unwrap().polled {
                polls.push(second);
            }
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(polls, vec![0, 5, 10]);
    }

    #[test]
    fn notification_replaces_mask_poll() {
        let (modem, handle) = sim(SimulatedConfig {
            mo_latency: None,
            ..SimulatedConfig::default()
        });
        let (mut control, _clock) = running(modem, ClientConfig::default());

        handle.inject_mt(b"x".to_vec());
        let report = control.tick().unwrap();
        assert!(report.notified);
        assert!(!report.polled);
        assert!(report.events.contains(EventNotification::MessageMtReceived));
    }

    #[test]
    fn unparseable_notifications_are_dropped() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let (mut control, _clock) = running(modem, ClientConfig::default());

        handle.push_urc("%EVNT: SOLAR_FLARE");
        let report = control.tick().unwrap();
        assert!(report.notified);
        assert!(report.polled);

        handle.push_urc("%EVNT: 0x0006");
        assert!(control.tick().is_ok());
    }

    #[test]
    fn registration_failure_falls_back_to_polling() {
        let (modem, handle) = sim(SimulatedConfig {
            mo_latency: None,
            ..SimulatedConfig::default()
        });
        handle.fail_command("ATS88", SimFault::CommandError);
        let config = ClientConfig {
            seed_queue_events: false,
            ..ClientConfig::default()
        };
        let (mut control, _clock) = running(modem, config);
        assert_eq!(control.state(), LoopState::Running);
        assert!(handle.event_mask().is_empty());

        handle.inject_mt(b"polled".to_vec());
        let report = control.tick().unwrap();
        assert!(!report.notified);
        assert!(report.polled);
        assert_eq!(control.take_received().len(), 1);
    }

    #[test]
    fn idp_registers_trace_events() {
        let (modem, handle) = sim(SimulatedConfig {
            network: NetworkProtocol::Idp,
            ..SimulatedConfig::default()
        });
        let (control, _clock) = running(modem, ClientConfig::default());

        assert_eq!(control.network(), Some(NetworkProtocol::Idp));
        assert!(handle.trace_enabled());
        let mask = handle.event_mask();
        assert!(mask.contains(EventNotification::EventTraceCached));
        assert!(!mask.contains(EventNotification::NetinfoUpdate));
    }

    #[test]
    fn ogx_registers_netinfo_events() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let (_control, _clock) = running(modem, ClientConfig::default());

        assert!(!handle.trace_enabled());
        assert_eq!(
            handle.event_mask(),
            events_of_interest(Some(NetworkProtocol::Ogx))
        );
        assert!(handle
            .event_mask()
            .contains(EventNotification::NetinfoUpdate));
    }

    #[test]
    fn recoverable_errors_do_not_end_the_tick() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let (mut control, _clock) = running(modem, ClientConfig::default());

        handle.fail_next(SimFault::Timeout);
        assert!(control.tick().is_ok());
        assert_eq!(control.ticks(), 1);
    }

    #[test]
    fn fatal_error_ends_tick() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let (mut control, _clock) = running(modem, ClientConfig::default());

        handle.fail_next(SimFault::LinkLost);
        let err = control.tick().unwrap_err();
        assert!(err.is_fatal());

        control.shutdown();
        assert_eq!(control.state(), LoopState::Disconnected);
        assert_eq!(handle.disconnect_count(), 1);
    }

    #[test]
    fn run_disconnects_after_fatal_error() {
        let (modem, handle) = sim(SimulatedConfig::default());
        handle.fail_command("ATS90", SimFault::LinkLost);
        let mut control = ControlLoop::with_clock(modem, ManualClock::new(), ClientConfig::default());

        let err = control.run(&StopSignal::new()).unwrap_err();
        assert!(matches!(err, ClientError::Modem(_)));
        assert_eq!(control.state(), LoopState::Disconnected);
        assert_eq!(handle.disconnect_count(), 1);
    }

    #[test]
    fn run_honours_stop_signal() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let mut control = ControlLoop::with_clock(modem, ManualClock::new(), ClientConfig::default());
        let stop = StopSignal::new();
        stop.stop();

        control.run(&stop).unwrap();
        assert_eq!(control.ticks(), 0);
        assert_eq!(handle.connect_count(), 1);
        assert_eq!(handle.disconnect_count(), 1);
        assert!(!handle.is_connected());
    }

    #[test]
    fn connect_failure_is_fatal() {
        let (modem, handle) = sim(SimulatedConfig::default());
        handle.set_fail_connect(true);
        let mut control = ControlLoop::with_clock(modem, ManualClock::new(), ClientConfig::default());

        let err = control.run(&StopSignal::new()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(control.state(), LoopState::Disconnected);
    }

    #[test]
    fn tick_requires_running_state() {
        let (modem, _handle) = sim(SimulatedConfig::default());
        let mut control = ControlLoop::with_clock(modem, ManualClock::new(), ClientConfig::default());
        let err = control.tick().unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidState {
                operation: "tick",
                state: LoopState::Disconnected
            }
        ));
    }

    #[test]
    fn large_transfer_uses_session_network() {
        let (modem, handle) = sim(SimulatedConfig {
            network: NetworkProtocol::Idp,
            ..SimulatedConfig::default()
        });
        let (mut control, _clock) = running(modem, ClientConfig::default());

        let report = control
            .send_large(vec![0xAAu8; 13_000], &StopSignal::new())
            .unwrap();
        assert_eq!(report.chunk_size, 6144);
        assert_eq!(report.chunks, 3);
        let counters: Vec<u8> = handle.sent_payloads().iter().map(|f| f[2]).collect();
        assert_eq!(counters, vec![2, 1, 0]);
    }

    #[test]
    fn events_seen_during_transfer_reach_the_next_tick() {
        let (modem, handle) = sim(SimulatedConfig::default());
        handle.fail_command("ATS88", SimFault::CommandError);
        let config = ClientConfig {
            seed_queue_events: false,
            ..ClientConfig::default()
        };
        let (mut control, _clock) = running(modem, config);
        assert!(handle.event_mask().is_empty());

        handle.inject_mt(vec![255u8, 0, 0, 0, 60]);
        let report = control
            .send_large(vec![0x55u8; 30], &StopSignal::new())
            .unwrap();
        assert_eq!(report.chunks, 1);
        assert!(control
            .pending_events()
            .contains(EventNotification::MessageMtReceived));

        let report = control.tick().unwrap();
        assert!(report.reconfigured);
        assert_eq!(control.heartbeat().interval(), 60);
        assert_eq!(handle.mt_queue_len(), 0);
    }

    /// Clock whose second reading panics, standing in for a capability that
    /// panics mid-tick.
    struct PanickingClock {
        reads: std::cell::Cell<u32>,
    }

    impl Clock for PanickingClock {
        fn now(&self) -> Duration {
            let reads = self.reads.get() + 1;
            self.reads.set(reads);
            assert!(reads < 2, "clock failure");
            Duration::ZERO
        }

        fn sleep(&self, _duration: Duration) {}
    }

    #[test]
    fn panicking_tick_still_disconnects() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let clock = PanickingClock {
            reads: std::cell::Cell::new(0),
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut control = ControlLoop::with_clock(modem, clock, ClientConfig::default());
            control.run(&StopSignal::new())
        }));

        assert!(outcome.is_err());
        assert_eq!(handle.connect_count(), 1);
        assert_eq!(handle.disconnect_count(), 1);
        assert!(!handle.is_connected());
    }

    #[test]
    fn dropping_the_loop_disconnects_once() {
        let (modem, handle) = sim(SimulatedConfig::default());
        let (mut control, _clock) = running(modem, ClientConfig::default());
        control.shutdown();
        drop(control);
        assert_eq!(handle.disconnect_count(), 1);

        let (modem, handle) = sim(SimulatedConfig::default());
        let (control, _clock) = running(modem, ClientConfig::default());
        drop(control);
        assert_eq!(handle.disconnect_count(), 1);
    }
}
