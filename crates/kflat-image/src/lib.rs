//! Image format for flattened memory graphs.
//!
//! This crate contains:
//! - Format definitions (header, section layout, entry encodings)
//! - [`ImageWriter`] for assembling an image from resolved parts
//! - [`Image`] for loading, validating and relocating an image
//! - A human-readable [`dump`]

mod aligned_vec;
mod colors;
mod constants;
mod dump;
mod header;
mod image;
mod sections;
mod writer;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod aligned_vec_tests;
#[cfg(test)]
mod writer_tests;

pub use aligned_vec::AlignedVec;
pub use colors::Colors;
pub use constants::{
    FIXUP_ENTRY_SIZE, HEADER_SIZE, MAGIC, NODE_ENTRY_SIZE, NULL_TARGET, ROOT_ENTRY_SIZE,
    SECTION_ALIGN, VERSION,
};
pub use dump::dump;
pub use header::{Header, SectionOffsets, flags};
pub use image::{FixupsView, Image, ImageError, NodesView, RootsView};
pub use sections::{Fixup, NodeExtent, Root};
pub use writer::ImageWriter;
