use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Marker opening every chunk of a large transfer.
pub const CHUNK_MARKER: [u8; 2] = [0xFF, 0xFF];

/// Chunk header: marker (2) + remaining-chunk counter (1) = 3 bytes.
pub const CHUNK_HEADER_SIZE: usize = 3;

/// The remaining-chunk counter is one byte.
pub const MAX_CHUNKS: usize = 255;

/// Header of one chunk frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunks still to come after this one; 0 on the final chunk.
    pub remaining: u8,
}

impl ChunkHeader {
    /// Parse the header of a chunk frame, returning it with the data slice.
    pub fn decode(frame: &[u8]) -> Result<(Self, &[u8])> {
        if frame.len() < CHUNK_HEADER_SIZE {
            return Err(CodecError::Truncated {
                len: frame.len(),
                need: CHUNK_HEADER_SIZE,
            });
        }
        if frame[0..2] != CHUNK_MARKER {
            return Err(CodecError::InvalidMarker);
        }
        Ok((
            Self {
                remaining: frame[2],
            },
            &frame[CHUNK_HEADER_SIZE..],
        ))
    }

    pub fn is_final(&self) -> bool {
        self.remaining == 0
    }
}

/// One framed chunk, ready to submit as an MO message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position within the transfer.
    pub number: usize,
    pub header: ChunkHeader,
    /// Header and data, as sent.
    pub frame: Bytes,
}

impl Chunk {
    /// The data slice carried by this chunk.
    pub fn data(&self) -> &[u8] {
        &self.frame[CHUNK_HEADER_SIZE..]
    }
}

/// Number of chunks needed for `len` bytes at `max_size` bytes per chunk.
pub fn chunk_count(len: usize, max_size: usize) -> Result<usize> {
    if max_size == 0 {
        return Err(CodecError::InvalidChunkSize);
    }
    let chunks = len.div_ceil(max_size);
    if chunks > MAX_CHUNKS {
        return Err(CodecError::CapacityExceeded {
            chunks,
            max: MAX_CHUNKS,
        });
    }
    Ok(chunks)
}

/// Split `data` into framed chunks of at most `max_size` data bytes.
///
/// The chunk count is checked before anything is produced: a transfer that
/// would need more than 255 chunks fails with
/// [`CodecError::CapacityExceeded`].
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬────────────────────┐
/// │ 0xFF 0xFF    │ remaining    │ data (≤ max_size)  │
/// │ marker (2B)  │ (1B)         │                    │
/// └──────────────┴──────────────┴────────────────────┘
/// ```
pub fn chunk(data: impl Into<Bytes>, max_size: usize) -> Result<Chunks> {
    let data = data.into();
    let total = chunk_count(data.len(), max_size)?;
    Ok(Chunks {
        data,
        max_size,
        total,
        emitted: 0,
    })
}

/// Iterator over the framed chunks of one transfer.
#[derive(Debug, Clone)]
pub struct Chunks {
    data: Bytes,
    max_size: usize,
    total: usize,
    emitted: usize,
}

impl Chunks {
    /// Total chunks in the transfer.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Size of the unframed data.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.emitted >= self.total {
            return None;
        }
        let start = self.emitted * self.max_size;
        let end = (start + self.max_size).min(self.data.len());
        self.emitted += 1;
        // total <= MAX_CHUNKS, so the counter always fits.
        let remaining = (self.total - self.emitted) as u8;

        let mut frame = BytesMut::with_capacity(CHUNK_HEADER_SIZE + end - start);
        frame.put_slice(&CHUNK_MARKER);
        frame.put_u8(remaining);
        frame.put_slice(&self.data[start..end]);

        Some(Chunk {
            number: self.emitted,
            header: ChunkHeader { remaining },
            frame: frame.freeze(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.emitted;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunks {}
