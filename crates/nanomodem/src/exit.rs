use std::fmt;
use std::io;

use nanomodem_client::ClientError;
use nanomodem_codec::CodecError;
use nanomodem_modem::ModemError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const CANCELLED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn modem_error(context: &str, err: ModemError) -> CliError {
    match err {
        ModemError::Io(source) => io_error(context, source),
        ModemError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ModemError::UnknownModel(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ModemError::Command { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::InvalidChunkSize => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Modem(err) => modem_error(context, err),
        ClientError::Codec(err) => codec_error(context, err),
        ClientError::Cancelled => CliError::new(CANCELLED, format!("{context}: {err}")),
        ClientError::InvalidState { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn oversized_transfer_is_invalid_data() {
        let err = client_error(
            "send failed",
            ClientError::Codec(CodecError::CapacityExceeded {
                chunks: 256,
                max: 255,
            }),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("send failed: "));
    }

    #[test]
    fn modem_errors_map_by_kind() {
        let timeout = ModemError::Timeout {
            command: "ATS89".into(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(modem_error("poll", timeout).code, TIMEOUT);
        assert_eq!(
            modem_error("create", ModemError::UnknownModel("x".into())).code,
            USAGE
        );
        assert_eq!(
            modem_error("run", ModemError::Disconnected("eof".into())).code,
            TRANSPORT_ERROR
        );
        assert_eq!(client_error("send", ClientError::Cancelled).code, CANCELLED);
    }
}
