//! Loaded image with section views.
//!
//! The [`Image`] struct validates an image once on load; views decode
//! entries lazily from the underlying bytes.

use std::io;
use std::path::Path;

use super::aligned_vec::AlignedVec;
use super::constants::{
    FIXUP_ENTRY_SIZE, HEADER_SIZE, NODE_ENTRY_SIZE, NULL_TARGET, ROOT_ENTRY_SIZE,
    SECTION_ALIGN, VERSION,
};
use super::header::{Header, SectionOffsets, read_u32, read_u64};
use super::sections::{Fixup, NodeExtent, Root};

/// Image load, check and relocation error.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid magic: expected KFLT")]
    InvalidMagic,
    #[error("unsupported version: {0} (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("file too small: {0} bytes (minimum 64)")]
    FileTooSmall(usize),
    #[error("size mismatch: header says {header} bytes, got {actual}")]
    SizeMismatch { header: u64, actual: usize },
    #[error("sections end at {end}, past total size {total}")]
    Truncated { end: u64, total: u64 },
    #[error("checksum mismatch: header says {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("root {0}: name is outside the name blob or not UTF-8")]
    BadRootName(usize),
    #[error("fixup slot {slot:#x} lies outside the data section")]
    SlotOutOfBounds { slot: u64 },
    #[error("fixup at {slot:#x} targets {target:#x}, outside the data section")]
    TargetOutOfBounds { slot: u64, target: u64 },
    #[error("fixups are not strictly ordered by slot at entry {0}")]
    UnsortedFixups(usize),
    #[error("root `{name}` targets {target:#x}, outside the data section")]
    RootOutOfBounds { name: String, target: u64 },
    #[error("node {0} extends past the data section")]
    NodeOutOfBounds(usize),
    #[error("relocation base {0:#x} is not {SECTION_ALIGN}-byte aligned")]
    MisalignedBase(u64),
    #[error("{section} section too large: {count} entries")]
    TooLarge { section: &'static str, count: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Restore used by [`Image::relocate`]: tag bits ORed into the address.
fn restore_or(address: u64, tag: u64) -> u64 {
    address | tag
}

/// A validated kflat image.
#[derive(Debug)]
pub struct Image {
    storage: AlignedVec,
    header: Header,
    offsets: SectionOffsets,
}

impl Image {
    /// Load an image from bytes (copied into aligned storage).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        Self::from_storage(AlignedVec::copy_from_slice(bytes))
    }

    /// Load an image from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        Self::from_storage(AlignedVec::from_file(path)?)
    }

    fn from_storage(storage: AlignedVec) -> Result<Self, ImageError> {
        if storage.len() < HEADER_SIZE {
            return Err(ImageError::FileTooSmall(storage.len()));
        }

        let header = Header::from_bytes(&storage[..HEADER_SIZE]);
        if !header.validate_magic() {
            return Err(ImageError::InvalidMagic);
        }
        if !header.validate_version() {
            return Err(ImageError::UnsupportedVersion(header.version));
        }
        if header.total_size != storage.len() as u64 {
            return Err(ImageError::SizeMismatch {
                header: header.total_size,
                actual: storage.len(),
            });
        }

        let offsets = header.compute_offsets();
        if offsets.end > header.total_size {
            return Err(ImageError::Truncated {
                end: offsets.end,
                total: header.total_size,
            });
        }

        let actual = crc32fast::hash(&storage[HEADER_SIZE..]);
        if actual != header.checksum {
            return Err(ImageError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let image = Self {
            storage,
            header,
            offsets,
        };
        image.validate_root_names()?;
        Ok(image)
    }

    fn validate_root_names(&self) -> Result<(), ImageError> {
        let names = self.names_blob();
        for idx in 0..self.header.root_count as usize {
            let entry = &self.roots_bytes()[idx * ROOT_ENTRY_SIZE..];
            for (off, len) in [(0, 4), (8, 12)] {
                let start = read_u32(entry, off) as usize;
                let end = start + read_u32(entry, len) as usize;
                let valid = names
                    .get(start..end)
                    .is_some_and(|bytes| std::str::from_utf8(bytes).is_ok());
                if !valid {
                    return Err(ImageError::BadRootName(idx));
                }
            }
        }
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn offsets(&self) -> &SectionOffsets {
        &self.offsets
    }

    /// The whole image.
    pub fn bytes(&self) -> &[u8] {
        &self.storage
    }

    /// The flattened data section. All fixup offsets are relative to its start.
    pub fn data(&self) -> &[u8] {
        self.section(self.offsets.data, self.header.data_size)
    }

    pub fn fixups(&self) -> FixupsView<'_> {
        let count = self.header.fixup_count as usize;
        FixupsView {
            bytes: self.section(self.offsets.fixups, (count * FIXUP_ENTRY_SIZE) as u64),
            count,
        }
    }

    pub fn roots(&self) -> RootsView<'_> {
        RootsView {
            bytes: self.roots_bytes(),
            names: self.names_blob(),
            count: self.header.root_count as usize,
        }
    }

    pub fn nodes(&self) -> NodesView<'_> {
        let count = self.header.node_count as usize;
        NodesView {
            bytes: self.section(self.offsets.nodes, (count * NODE_ENTRY_SIZE) as u64),
            count,
        }
    }

    /// Fixup registered for the pointer slot at `slot`.
    pub fn fixup_at(&self, slot: u64) -> Option<Fixup> {
        self.fixups().find(slot)
    }

    /// First root with the given name.
    pub fn root(&self, name: &str) -> Option<Root<'_>> {
        self.roots().iter().find(|r| r.name == name)
    }

    /// Structural check of relocation metadata against the data section.
    ///
    /// Load already verified header and checksum; this catches images that
    /// were written inconsistently rather than corrupted in transit.
    pub fn check(&self) -> Result<(), ImageError> {
        let data_size = self.header.data_size;

        let mut prev: Option<u64> = None;
        for (idx, fixup) in self.fixups().iter().enumerate() {
            if prev.is_some_and(|p| p >= fixup.slot) {
                return Err(ImageError::UnsortedFixups(idx));
            }
            prev = Some(fixup.slot);

            if fixup.slot.checked_add(8).is_none_or(|end| end > data_size) {
                return Err(ImageError::SlotOutOfBounds { slot: fixup.slot });
            }
            if let Some(target) = fixup.target
                && target > data_size
            {
                return Err(ImageError::TargetOutOfBounds {
                    slot: fixup.slot,
                    target,
                });
            }
        }

        for root in self.roots().iter() {
            if let Some(target) = root.target
                && target > data_size
            {
                return Err(ImageError::RootOutOfBounds {
                    name: root.name.to_owned(),
                    target,
                });
            }
        }

        for (idx, node) in self.nodes().iter().enumerate() {
            if node.offset.checked_add(node.size).is_none_or(|end| end > data_size) {
                return Err(ImageError::NodeOutOfBounds(idx));
            }
        }
        Ok(())
    }

    /// Copy of the data section with pointer slots rebased to `base`.
    ///
    /// Tagged slots become `(base + target) | tag`, empty ones `tag`.
    pub fn relocate(&self, base: u64) -> Result<Vec<u8>, ImageError> {
        self.relocate_with(base, restore_or)
    }

    /// Like [`relocate`](Self::relocate) with a caller-supplied restore.
    pub fn relocate_with(
        &self,
        base: u64,
        restore: fn(u64, u64) -> u64,
    ) -> Result<Vec<u8>, ImageError> {
        let mut data = self.data().to_vec();
        self.patch(&mut data, base, restore)?;
        Ok(data)
    }

    /// Copy of the data section whose pointer slots hold real addresses of
    /// the returned buffer, ready to be read as native structures.
    pub fn unflatten(&self) -> Result<AlignedVec, ImageError> {
        let mut data = AlignedVec::copy_from_slice(self.data());
        let base = data.address();
        self.patch(&mut data, base, restore_or)?;
        Ok(data)
    }

    fn patch(
        &self,
        data: &mut [u8],
        base: u64,
        restore: fn(u64, u64) -> u64,
    ) -> Result<(), ImageError> {
        if !base.is_multiple_of(SECTION_ALIGN as u64) {
            return Err(ImageError::MisalignedBase(base));
        }
        for fixup in self.fixups().iter() {
            let start = fixup.slot as usize;
            let slot = data
                .get_mut(start..start + 8)
                .ok_or(ImageError::SlotOutOfBounds { slot: fixup.slot })?;
            slot.copy_from_slice(&fixup.encode(base, restore).to_le_bytes());
        }
        Ok(())
    }

    fn section(&self, offset: u64, len: u64) -> &[u8] {
        &self.storage[offset as usize..(offset + len) as usize]
    }

    fn roots_bytes(&self) -> &[u8] {
        let count = self.header.root_count as usize;
        self.section(self.offsets.roots, (count * ROOT_ENTRY_SIZE) as u64)
    }

    fn names_blob(&self) -> &[u8] {
        self.section(self.offsets.names, self.header.names_size as u64)
    }
}

/// View into the fixup table (sorted by slot).
#[derive(Clone, Copy)]
pub struct FixupsView<'a> {
    bytes: &'a [u8],
    count: usize,
}

impl<'a> FixupsView<'a> {
    pub fn get(&self, idx: usize) -> Fixup {
        assert!(idx < self.count, "fixup index out of bounds");
        Fixup::from_bytes(&self.bytes[idx * FIXUP_ENTRY_SIZE..])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Fixup> + 'a {
        (0..self.count).map(move |i| self.get(i))
    }

    /// Binary search by slot offset.
    pub fn find(&self, slot: u64) -> Option<Fixup> {
        let (mut lo, mut hi) = (0, self.count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.get(mid);
            match entry.slot.cmp(&slot) {
                std::cmp::Ordering::Equal => return Some(entry),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }
}

/// View into the root registry.
#[derive(Clone, Copy)]
pub struct RootsView<'a> {
    bytes: &'a [u8],
    names: &'a [u8],
    count: usize,
}

impl<'a> RootsView<'a> {
    pub fn get(&self, idx: usize) -> Root<'a> {
        assert!(idx < self.count, "root index out of bounds");
        let entry = &self.bytes[idx * ROOT_ENTRY_SIZE..];
        let target = read_u64(entry, 16);
        Root {
            name: self.name(read_u32(entry, 0), read_u32(entry, 4)),
            type_name: self.name(read_u32(entry, 8), read_u32(entry, 12)),
            target: (target != NULL_TARGET).then_some(target),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Root<'a>> + 'a {
        (0..self.count).map(move |i| self.get(i))
    }

    // Names were validated on load.
    fn name(&self, offset: u32, len: u32) -> &'a str {
        let start = offset as usize;
        let bytes = &self.names[start..start + len as usize];
        std::str::from_utf8(bytes).unwrap_or("")
    }
}

/// View into node extents (sorted by offset).
#[derive(Clone, Copy)]
pub struct NodesView<'a> {
    bytes: &'a [u8],
    count: usize,
}

impl<'a> NodesView<'a> {
    pub fn get(&self, idx: usize) -> NodeExtent {
        assert!(idx < self.count, "node index out of bounds");
        NodeExtent::from_bytes(&self.bytes[idx * NODE_ENTRY_SIZE..])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(self) -> impl Iterator<Item = NodeExtent> + 'a {
        (0..self.count).map(move |i| self.get(i))
    }

    /// Index and extent of the node whose bytes contain `offset`.
    pub fn containing(&self, offset: u64) -> Option<(usize, NodeExtent)> {
        // Last node starting at or before `offset`; empty nodes never contain it,
        // so step back over them.
        let mut idx = {
            let (mut lo, mut hi) = (0, self.count);
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if self.get(mid).offset <= offset {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            lo
        };
        while idx > 0 {
            idx -= 1;
            let node = self.get(idx);
            if node.contains(offset) {
                return Some((idx, node));
            }
            if node.size > 0 {
                return None;
            }
        }
        None
    }
}
