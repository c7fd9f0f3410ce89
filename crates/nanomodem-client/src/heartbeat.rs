use std::time::Duration;

use nanomodem_codec::{decode_reconfigure, Heartbeat, HEARTBEAT_LEN};
use nanomodem_modem::{MoMessage, ModemError, SatelliteModem};
use tracing::{debug, info, warn};

/// What a heartbeat evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Disabled, or the interval has not elapsed.
    NotDue,
    /// Due, but the modem refused to transmit; the cycle is lost.
    Skipped,
    /// Submitted and the modem returned a handle to track.
    Submitted(MoMessage),
    /// Submitted but the modem returned no handle.
    SubmittedUntracked,
}

/// Decides when to send a heartbeat and applies remote interval changes.
#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    interval: u32,
    last_attempt: Option<Duration>,
    count: u64,
    submitted: u64,
}

impl HeartbeatScheduler {
    /// Create a scheduler. An interval of 0 disables heartbeats.
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            last_attempt: None,
            count: 0,
            submitted: 0,
        }
    }

    /// Current interval in seconds (0 = disabled).
    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval;
    }

    /// Heartbeats triggered so far, sent or skipped.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Heartbeats actually handed to the modem.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// When the last heartbeat was attempted.
    pub fn last_attempt(&self) -> Option<Duration> {
        self.last_attempt
    }

    /// Whether a heartbeat is due at `now`.
    pub fn is_due(&self, now: Duration) -> bool {
        if self.interval == 0 {
            return false;
        }
        let interval = Duration::from_secs(u64::from(self.interval));
        self.last_attempt
            .is_none_or(|last| now.saturating_sub(last) >= interval)
    }

    /// Send a heartbeat if one is due.
    ///
    /// The attempt time advances even when transmission is disallowed, so a
    /// blocked period never produces a burst of catch-up heartbeats.
    pub fn evaluate<M>(
        &mut self,
        modem: &mut M,
        now: Duration,
    ) -> Result<HeartbeatOutcome, ModemError>
    where
        M: SatelliteModem + ?Sized,
    {
        if !self.is_due(now) {
            return Ok(HeartbeatOutcome::NotDue);
        }
        self.count += 1;
        self.last_attempt = Some(now);
        info!(count = self.count, "heartbeat triggered");

        if !modem.is_transmit_allowed()? {
            warn!(count = self.count, "cannot transmit, skipping heartbeat");
            return Ok(HeartbeatOutcome::Skipped);
        }

        let payload = build_heartbeat(modem)?;
        let outcome = match modem.mo_message_send(&payload)? {
            Some(handle) => {
                info!(id = handle.id, "queued heartbeat MO message");
                HeartbeatOutcome::Submitted(handle)
            }
            None => {
                debug!("heartbeat submitted without a message handle");
                HeartbeatOutcome::SubmittedUntracked
            }
        };
        self.submitted += 1;
        info!(
            hours = f64::from(self.interval) / 3600.0,
            "next heartbeat scheduled"
        );
        Ok(outcome)
    }

    /// Apply a reconfiguration payload. Returns whether the interval changed.
    ///
    /// The new interval is used from the next evaluation on.
    pub fn apply_reconfigure(&mut self, payload: &[u8]) -> bool {
        let previous = self.interval;
        self.interval = decode_reconfigure(payload, previous);
        self.interval != previous
    }
}

/// Sample live values from the modem and encode a heartbeat.
pub fn build_heartbeat<M>(modem: &mut M) -> Result<[u8; HEARTBEAT_LEN], ModemError>
where
    M: SatelliteModem + ?Sized,
{
    let timestamp = modem.get_system_time()?;
    debug!("getting location for heartbeat");
    let location = modem.get_location()?.unwrap_or_default();
    let heartbeat = Heartbeat {
        timestamp,
        location,
        signal_quality: modem.get_signal_quality()?,
        snr: modem.get_snr()?,
    };
    Ok(heartbeat.encode())
}
