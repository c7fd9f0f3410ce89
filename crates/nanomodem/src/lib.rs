//! Messaging client for satellite IoT modems.
//!
//! nanomodem keeps a modem's message queues clean, sends periodic position
//! heartbeats, accepts remote interval changes and moves payloads larger
//! than one message in acknowledged chunks.
//!
//! # Crate Structure
//!
//! - [`modem`]: Modem capability trait, event model, vendor registry and a simulated modem
//! - [`codec`]: Byte-exact heartbeat, reconfiguration and chunk payloads
//! - [`client`]: Control loop, heartbeat scheduler, queue reconciler and large transfers (behind `client` feature)

/// Re-export modem types.
pub mod modem {
    pub use nanomodem_modem::*;
}

/// Re-export codec types.
pub mod codec {
    pub use nanomodem_codec::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use nanomodem_client::*;
}
