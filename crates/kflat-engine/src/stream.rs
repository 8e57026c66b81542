//! Append-only output stream.

use crate::error::FlattenError;

/// One appended byte run and where it sits in the stream.
#[derive(Debug)]
pub struct StreamChunk {
    offset: u64,
    bytes: Box<[u8]>,
}

impl StreamChunk {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Chunks laid end to end form the data section of the image.
///
/// Offsets grow monotonically and are never reused. Chunks are immutable
/// once appended; pointer slots are patched in the assembled copy.
#[derive(Debug)]
pub struct BinaryStream {
    chunks: Vec<StreamChunk>,
    len: u64,
    limit: u64,
}

impl BinaryStream {
    /// Create an empty stream that refuses to grow past `limit` bytes.
    pub fn new(limit: u64) -> Self {
        Self {
            chunks: Vec::new(),
            len: 0,
            limit,
        }
    }

    /// Copy `data` to the end of the stream and return its offset.
    ///
    /// Empty data still takes a position (zero-length arrays and the like).
    pub fn append(&mut self, data: &[u8]) -> Result<u64, FlattenError> {
        let offset = self.len;
        let attempted = offset.saturating_add(data.len() as u64);
        if attempted > self.limit {
            return Err(FlattenError::SizeExceeded {
                limit: self.limit,
                attempted,
            });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(data.len())
            .map_err(|_| FlattenError::AllocationFailure { size: data.len() })?;
        bytes.extend_from_slice(data);
        self.chunks
            .try_reserve(1)
            .map_err(|_| FlattenError::AllocationFailure {
                size: size_of::<StreamChunk>(),
            })?;
        self.chunks.push(StreamChunk {
            offset,
            bytes: bytes.into_boxed_slice(),
        });
        self.len = attempted;
        Ok(offset)
    }

    /// Like [`append`](Self::append), first padding with zeros so the
    /// returned offset is a multiple of `align`.
    pub fn append_aligned(&mut self, data: &[u8], align: usize) -> Result<u64, FlattenError> {
        let align = align.max(1) as u64;
        let padding = self.len.next_multiple_of(align) - self.len;
        if padding > 0 {
            self.append(&vec![0; padding as usize])?;
        }
        self.append(data)
    }

    /// Total bytes appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn chunks(&self) -> &[StreamChunk] {
        &self.chunks
    }

    /// Concatenate all chunks onto `out`.
    pub fn write_into(&self, out: &mut Vec<u8>) -> Result<(), FlattenError> {
        let size = self.len as usize;
        out.try_reserve_exact(size)
            .map_err(|_| FlattenError::AllocationFailure { size })?;
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.bytes);
        }
        Ok(())
    }
}
