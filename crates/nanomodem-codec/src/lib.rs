//! Byte-exact payload codecs for satellite IoT messaging.
//!
//! Every payload owned by the client starts with a discriminator byte:
//! - Heartbeat MO payload: 15 bytes, `[255][u32 time][i32 lat][i32 lon][u8 signal][u8 snr]`
//! - Reconfiguration MT payload: `[255][u32 interval]`
//! - Large-transfer chunk frame: `[0xFF 0xFF][u8 remaining][data...]`
//!
//! All integers are big-endian. Everything here is pure: no I/O, no state.

pub mod chunk;
pub mod error;
pub mod heartbeat;
pub mod reconfigure;

pub use chunk::{
    chunk, chunk_count, Chunk, ChunkHeader, Chunks, CHUNK_HEADER_SIZE, CHUNK_MARKER, MAX_CHUNKS,
};
pub use error::{CodecError, ReconfigureError, Result};
pub use heartbeat::{
    decode_heartbeat, encode_coordinate, encode_heartbeat, encode_snr, Heartbeat,
    HeartbeatFields, COORDINATE_SCALE, HEARTBEAT_LEN,
};
pub use reconfigure::{
    decode_reconfigure, encode_reconfigure, parse_reconfigure, MAX_INTERVAL, MIN_INTERVAL,
};

/// Discriminator byte shared by heartbeat and reconfiguration payloads.
pub const DISCRIMINATOR: u8 = 255;
