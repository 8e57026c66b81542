//! Image header (64 bytes).
//!
//! Offsets are computed from counts + SECTION_ALIGN (64 bytes).
//! Section order: Header → Data → Fixups → Roots → Names → Nodes

use super::constants::{
    FIXUP_ENTRY_SIZE, HEADER_SIZE, MAGIC, NODE_ENTRY_SIZE, ROOT_ENTRY_SIZE, SECTION_ALIGN,
    VERSION,
};

/// Header flags (bit field).
pub mod flags {
    /// At least one fixup carries tag bits.
    pub const TAGGED: u32 = 1 << 0;
}

/// Image header - first 64 bytes of every image.
///
/// Layout:
/// - 0-15: identity (magic, version, checksum, flags)
/// - 16-31: sizes (total_size, data_size)
/// - 32-47: counts (4 × u32), in section order
/// - 48-63: reserved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct Header {
    /// Magic bytes: b"KFLT"
    pub magic: [u8; 4],
    /// Format version (currently 1)
    pub version: u32,
    /// CRC32 checksum of everything after the header
    pub checksum: u32,
    /// Header flags (see `flags` module for bit definitions).
    pub flags: u32,

    /// Total image size in bytes
    pub total_size: u64,
    /// Size of the flattened data section in bytes.
    pub data_size: u64,

    pub node_count: u32,
    pub fixup_count: u32,
    pub root_count: u32,
    /// Size of the root-name blob in bytes.
    pub names_size: u32,

    // Bytes 48-63: Reserved (public for cross-crate struct initialization)
    pub _reserved: [u8; 16],
}

const _: () = assert!(std::mem::size_of::<Header>() == HEADER_SIZE);

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            checksum: 0,
            flags: 0,
            total_size: 0,
            data_size: 0,
            node_count: 0,
            fixup_count: 0,
            root_count: 0,
            names_size: 0,
            _reserved: [0; 16],
        }
    }
}

/// Computed section offsets derived from header counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionOffsets {
    pub data: u64,
    pub fixups: u64,
    pub roots: u64,
    pub names: u64,
    pub nodes: u64,
    /// End of the last section, padded. Equals `total_size` in a valid image.
    pub end: u64,
}

impl Header {
    /// Decode header from 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= HEADER_SIZE, "header too short");

        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&bytes[48..64]);

        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: read_u32(bytes, 4),
            checksum: read_u32(bytes, 8),
            flags: read_u32(bytes, 12),
            total_size: read_u64(bytes, 16),
            data_size: read_u64(bytes, 24),
            node_count: read_u32(bytes, 32),
            fixup_count: read_u32(bytes, 36),
            root_count: read_u32(bytes, 40),
            names_size: read_u32(bytes, 44),
            _reserved: reserved,
        }
    }

    /// Encode header to 64 bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.flags.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.total_size.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.data_size.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.node_count.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.fixup_count.to_le_bytes());
        bytes[40..44].copy_from_slice(&self.root_count.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.names_size.to_le_bytes());
        bytes[48..64].copy_from_slice(&self._reserved);
        bytes
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == VERSION
    }

    pub fn is_tagged(&self) -> bool {
        self.flags & flags::TAGGED != 0
    }

    pub fn set_tagged(&mut self, value: bool) {
        if value {
            self.flags |= flags::TAGGED;
        } else {
            self.flags &= !flags::TAGGED;
        }
    }

    /// Compute section offsets from counts and blob sizes.
    ///
    /// Saturates instead of overflowing so a corrupt header yields offsets
    /// past any real file size rather than a panic.
    pub fn compute_offsets(&self) -> SectionOffsets {
        let data = HEADER_SIZE as u64;
        let fixups = align_up(data.saturating_add(self.data_size));
        let roots = align_up(fixups.saturating_add(self.fixup_count as u64 * FIXUP_ENTRY_SIZE as u64));
        let names = align_up(roots.saturating_add(self.root_count as u64 * ROOT_ENTRY_SIZE as u64));
        let nodes = align_up(names.saturating_add(self.names_size as u64));
        let end = align_up(nodes.saturating_add(self.node_count as u64 * NODE_ENTRY_SIZE as u64));

        SectionOffsets {
            data,
            fixups,
            roots,
            names,
            nodes,
            end,
        }
    }
}

/// Round up to the next multiple of `SECTION_ALIGN`.
pub(crate) fn align_up(value: u64) -> u64 {
    let align = SECTION_ALIGN as u64;
    value.saturating_add(align - 1) & !(align - 1)
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
