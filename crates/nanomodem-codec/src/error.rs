/// Errors that can occur while framing or parsing payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The transfer would need more chunks than the 1-byte counter can express.
    #[error("transfer needs {chunks} chunks (max {max}); use a larger chunk size")]
    CapacityExceeded { chunks: usize, max: usize },

    /// Chunk size must be at least one byte.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    /// A chunk frame does not start with the 0xFFFF marker.
    #[error("invalid chunk marker (expected 0xFFFF)")]
    InvalidMarker,

    /// The buffer is shorter than the fixed layout requires.
    #[error("payload truncated ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },
}

/// Why a reconfiguration request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReconfigureError {
    /// Fewer than two bytes: nothing after the discriminator.
    #[error("reconfiguration payload too short ({0} bytes)")]
    TooShort(usize),

    /// The leading byte is not the reconfiguration discriminator.
    #[error("unexpected discriminator {0}")]
    WrongDiscriminator(u8),

    /// The requested interval lies outside 1..=86400 seconds.
    #[error("unsupported interval {0} s")]
    OutOfRange(u32),
}

pub type Result<T> = std::result::Result<T, CodecError>;
