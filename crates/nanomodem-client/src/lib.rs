//! Event-driven messaging client for satellite IoT modems.
//!
//! This is the "just works" layer. Hand a [`ControlLoop`] a modem and it
//! registers for events, retires completed messages, sends heartbeats,
//! applies remote interval changes and moves large payloads in acknowledged
//! chunks.
//!
//! Everything runs on the caller's thread. The loop only sleeps for
//! [`ClientConfig::idle_pause`] after a tick with nothing to do; only a large
//! transfer blocks while waiting for a chunk to complete.

pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod heartbeat;
pub mod reconciler;
pub mod transfer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ClientConfig, TransferConfig, DEFAULT_IDLE_PAUSE, DEFAULT_MASK_POLL_INTERVAL,
    DEFAULT_SUMMARY_INTERVAL, DEFAULT_WAIT_STEP,
};
pub use control::{events_of_interest, ControlLoop, LoopState, StopSignal, TickReport};
pub use error::{ClientError, Result};
pub use heartbeat::{build_heartbeat, HeartbeatOutcome, HeartbeatScheduler};
pub use reconciler::{MoCompletion, Reconciler};
pub use transfer::{send_large, TransferReport};
