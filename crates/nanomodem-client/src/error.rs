use nanomodem_codec::CodecError;
use nanomodem_modem::{MessageId, ModemError};
use tracing::warn;

use crate::control::LoopState;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Modem capability error.
    #[error("modem error: {0}")]
    Modem(#[from] ModemError),

    /// Payload framing error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The modem currently refuses to transmit.
    #[error("transmission currently not allowed")]
    TransmitNotAllowed,

    /// The modem accepted a chunk but returned no message handle.
    #[error("modem returned no handle for chunk {chunk}")]
    SubmitRejected { chunk: usize },

    /// A chunk reached the failed terminal state.
    #[error("chunk {chunk} (message {id}) failed to transmit")]
    ChunkFailed { chunk: usize, id: MessageId },

    /// Stopped by an external signal.
    #[error("cancelled")]
    Cancelled,

    /// Operation not valid in the current loop state.
    #[error("invalid state for {operation}: {state:?}")]
    InvalidState {
        operation: &'static str,
        state: LoopState,
    },
}

impl ClientError {
    /// Whether the session must end.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Modem(err) => err.is_fatal(),
            ClientError::Cancelled => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Log and swallow a recoverable modem error; pass fatal ones through.
pub(crate) fn absorb<T>(
    result: std::result::Result<T, ModemError>,
    context: &'static str,
) -> std::result::Result<Option<T>, ModemError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(error = %err, context, "modem command failed, continuing");
            Ok(None)
        }
    }
}
