use std::time::Duration;

/// How often the active event mask is polled when no notification arrived.
pub const DEFAULT_MASK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How often the acquisition summary is logged.
pub const DEFAULT_SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

/// Pause after a tick that found nothing to do.
pub const DEFAULT_IDLE_PAUSE: Duration = Duration::from_millis(50);

/// Pause between completion checks while a chunk is in flight.
pub const DEFAULT_WAIT_STEP: Duration = Duration::from_secs(1);

/// Control loop behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Heartbeat interval in seconds. 0 disables heartbeats until a remote
    /// reconfiguration sets one.
    pub heartbeat_interval: u32,
    /// Minimum time between active event mask polls.
    pub mask_poll_interval: Duration,
    /// Minimum time between acquisition summaries.
    pub summary_interval: Duration,
    /// Treat MO-complete and MT-received as pending on the first tick, so
    /// queues left over from an earlier session are drained.
    pub seed_queue_events: bool,
    /// Pause after a tick that found nothing to do. `None` runs ticks back to
    /// back and keeps a core busy.
    pub idle_pause: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 0,
            mask_poll_interval: DEFAULT_MASK_POLL_INTERVAL,
            summary_interval: DEFAULT_SUMMARY_INTERVAL,
            seed_queue_events: true,
            idle_pause: Some(DEFAULT_IDLE_PAUSE),
        }
    }
}

/// Large-transfer behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Data bytes per chunk. `None` uses the attached network's default.
    pub chunk_size: Option<usize>,
    /// Minimum time between completion polls of the event mask.
    pub completion_poll_interval: Duration,
    /// Sleep between completion checks.
    pub wait_step: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            completion_poll_interval: DEFAULT_MASK_POLL_INTERVAL,
            wait_step: DEFAULT_WAIT_STEP,
        }
    }
}
