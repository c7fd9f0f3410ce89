use std::time::Duration;

/// Errors reported by a modem capability.
#[derive(Debug, thiserror::Error)]
pub enum ModemError {
    /// Failed to open or attach to the modem.
    #[error("failed to connect to modem on {port}: {reason}")]
    Connect { port: String, reason: String },

    /// An I/O error occurred on the physical link.
    #[error("modem I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The modem did not answer a command in time.
    #[error("command {command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The modem answered a command with an error result.
    #[error("command {command} failed: {reason}")]
    Command { command: String, reason: String },

    /// The link went away mid-session.
    #[error("modem disconnected: {0}")]
    Disconnected(String),

    /// A command was issued before `connect()`.
    #[error("modem not connected")]
    NotConnected,

    /// No vendor implementation is registered for the requested model.
    #[error("no implementation registered for model {0}")]
    UnknownModel(String),
}

impl ModemError {
    /// Whether the session can no longer continue after this error.
    ///
    /// Broken links end the session. A single failed or timed-out command
    /// does not.
    pub fn is_fatal(&self) -> bool {
        match self {
            ModemError::Connect { .. }
            | ModemError::Io(_)
            | ModemError::Disconnected(_)
            | ModemError::NotConnected
            | ModemError::UnknownModel(_) => true,
            ModemError::Timeout { .. } | ModemError::Command { .. } => false,
        }
    }
}

/// A raw unsolicited notification that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrcParseError {
    /// The notification names an event this client does not know.
    #[error("unrecognized event notification: {0:?}")]
    Unrecognized(String),

    /// A numeric notification carried zero or several event bits.
    #[error("notification mask {0:#06x} does not name exactly one event")]
    Ambiguous(u32),
}

pub type Result<T> = std::result::Result<T, ModemError>;
