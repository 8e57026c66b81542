#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Type descriptors for kflat.
//!
//! A descriptor lists, for one structure type, the actions needed to flatten
//! an instance: which bytes are plain data, which sub-structures are embedded,
//! and which fields are pointers that must be followed and relocated.
//!
//! Both sides of a dump use the same descriptors:
//! - **Produce**: the engine walks live memory through them
//! - **Verify**: inspectors read a finished image through them

mod codec;
mod container;
mod error;
mod registry;


pub use codec::{PointerCodec, RestoreFn, StripFn};
pub use container::{Container, ContainerKind};
pub use error::DescriptorError;
pub use registry::{
    Count, Field, FieldKind, FieldsBuilder, PointerTarget, TypeDesc, TypeId, TypeRegistry,
};

/// Width of a pointer slot in flattened structures.
pub const POINTER_SIZE: usize = 8;
