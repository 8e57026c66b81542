//! Errors that abort a flattening run.

use kflat_core::DescriptorError;
use kflat_image::ImageError;

use crate::memory::MemoryError;

/// Fatal run error. Any of these discards the partial image.
#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    #[error("allocation of {size} bytes failed")]
    AllocationFailure { size: usize },
    #[error("pointer slot at {slot:#x} has no fixup")]
    MissingFixupTarget { slot: u64 },
    #[error("size limit exceeded: {attempted} bytes, limit is {limit}")]
    SizeExceeded { limit: u64, attempted: u64 },
    #[error("node {node} ({size} bytes at {address:#x}) was never emitted")]
    UnresolvedCycleNode { node: u32, address: u64, size: usize },
    #[error("cannot read {len} bytes at {address:#x}")]
    InvalidRead { address: u64, len: usize },
    #[error("text at {address:#x} has no terminator within {limit} bytes")]
    UnterminatedString { address: u64, limit: usize },
    #[error("corrupt {kind} at {address:#x}: {reason}")]
    CorruptContainer {
        kind: &'static str,
        address: u64,
        reason: &'static str,
    },
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("image format limit: {0}")]
    FormatLimit(#[from] ImageError),
}

impl From<MemoryError> for FlattenError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Unmapped { address, len } => Self::InvalidRead { address, len },
            MemoryError::Exhausted { size } => Self::AllocationFailure { size },
        }
    }
}
