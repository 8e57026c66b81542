//! 64-byte aligned storage for images.
//!
//! Sections are 64-byte aligned inside an image, and relocation bases must be
//! 64-byte aligned so tag bits folded into low pointer bits survive. Both only
//! hold at runtime if the buffer itself starts at a 64-byte boundary, which
//! `Vec<u8>` does not guarantee.

use std::ops::{Deref, DerefMut};

use super::constants::SECTION_ALIGN;

/// Alignment of image buffers.
pub const ALIGN: usize = SECTION_ALIGN;

#[repr(C, align(64))]
#[derive(Clone, Copy)]
struct Block([u8; ALIGN]);

/// 64-byte aligned byte buffer.
///
/// Backed by `Vec<Block>`: Vec guarantees element alignment, so the bytes
/// start at a 64-byte boundary without a custom allocator.
#[derive(Clone)]
pub struct AlignedVec {
    blocks: Vec<Block>,
    len: usize,
}

impl AlignedVec {
    /// Zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            blocks: vec![Block([0; ALIGN]); len.div_ceil(ALIGN)],
            len,
        }
    }

    /// Copy bytes into aligned storage.
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        let mut vec = Self::zeroed(bytes.len());
        vec.as_mut_slice().copy_from_slice(bytes);
        vec
    }

    /// Read a file into aligned storage.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::copy_from_slice(&bytes))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first byte, as seen by pointers written into the buffer.
    pub fn address(&self) -> u64 {
        self.blocks.as_ptr() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.blocks.is_empty() {
            return &[];
        }
        debug_assert!(self.len <= self.blocks.len() * ALIGN);
        // SAFETY: Block is repr(C) over [u8; 64], the blocks are initialized,
        // and `len` never exceeds the block capacity.
        unsafe { std::slice::from_raw_parts(self.blocks.as_ptr() as *const u8, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.blocks.is_empty() {
            return &mut [];
        }
        debug_assert!(self.len <= self.blocks.len() * ALIGN);
        // SAFETY: as in `as_slice`, and `&mut self` makes the borrow unique.
        unsafe { std::slice::from_raw_parts_mut(self.blocks.as_mut_ptr() as *mut u8, self.len) }
    }
}

impl Deref for AlignedVec {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for AlignedVec {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl std::fmt::Debug for AlignedVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedVec")
            .field("len", &self.len)
            .field("aligned", &self.address().is_multiple_of(ALIGN as u64))
            .finish()
    }
}
