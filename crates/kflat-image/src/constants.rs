//! Image format constants.

/// Magic bytes identifying a kflat image.
pub const MAGIC: [u8; 4] = *b"KFLT";

/// Current image format version.
pub const VERSION: u32 = 1;

/// Section alignment in bytes. Also the required alignment of a relocation base.
pub const SECTION_ALIGN: usize = 64;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Target value of a fixup whose pointer had no target.
pub const NULL_TARGET: u64 = u64::MAX;

/// `slot u64, target u64, tag u64`.
pub const FIXUP_ENTRY_SIZE: usize = 24;

/// `name_off u32, name_len u32, type_off u32, type_len u32, target u64`.
pub const ROOT_ENTRY_SIZE: usize = 24;

/// `offset u64, size u64`.
pub const NODE_ENTRY_SIZE: usize = 16;
