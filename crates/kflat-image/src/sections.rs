//! Entry encodings for the fixup, root and node sections.

use super::constants::{FIXUP_ENTRY_SIZE, NODE_ENTRY_SIZE, NULL_TARGET};
use super::header::read_u64;

/// One resolved relocation: the pointer slot at `slot` refers to `target`.
///
/// Both offsets are relative to the start of the data section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fixup {
    pub slot: u64,
    /// `None` for a pointer that had no target.
    pub target: Option<u64>,
    /// Tag bits carried next to the address (e.g. rb-tree colour).
    pub tag: u64,
}

impl Fixup {
    pub fn new(slot: u64, target: Option<u64>, tag: u64) -> Self {
        Self { slot, target, tag }
    }

    /// Slot value when the data section is placed at `base`.
    pub fn encode(&self, base: u64, restore: fn(u64, u64) -> u64) -> u64 {
        match self.target {
            Some(target) => restore(base.wrapping_add(target), self.tag),
            None => restore(0, self.tag),
        }
    }

    pub fn to_bytes(&self) -> [u8; FIXUP_ENTRY_SIZE] {
        let mut bytes = [0u8; FIXUP_ENTRY_SIZE];
        bytes[0..8].copy_from_slice(&self.slot.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.target.unwrap_or(NULL_TARGET).to_le_bytes());
        bytes[16..24].copy_from_slice(&self.tag.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let target = read_u64(bytes, 8);
        Self {
            slot: read_u64(bytes, 0),
            target: (target != NULL_TARGET).then_some(target),
            tag: read_u64(bytes, 16),
        }
    }
}

/// Named entry point into the data section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Root<'a> {
    pub name: &'a str,
    /// Descriptor name of the object the root points at.
    pub type_name: &'a str,
    pub target: Option<u64>,
}

/// Placement of one flattened region inside the data section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeExtent {
    pub offset: u64,
    pub size: u64,
}

impl NodeExtent {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end()
    }

    pub fn to_bytes(&self) -> [u8; NODE_ENTRY_SIZE] {
        let mut bytes = [0u8; NODE_ENTRY_SIZE];
        bytes[0..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.size.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            offset: read_u64(bytes, 0),
            size: read_u64(bytes, 8),
        }
    }
}
