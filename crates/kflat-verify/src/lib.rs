#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Inspection of kflat images through the descriptors that produced them.
//!
//! Nothing here mutates an image. Pointers are followed through the fixup
//! table, so queries work on an image as loaded, without relocating it.

mod cursor;
mod error;
mod inspector;

#[cfg(test)]
mod test_utils;


pub use cursor::Cursor;
pub use error::InspectError;
pub use inspector::Inspector;
