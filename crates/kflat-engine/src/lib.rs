#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Flattening engine for kflat.
//!
//! A [`FlattenContext`] walks a pointer graph in some [`SourceMemory`],
//! guided by the descriptors of a [`TypeRegistry`](kflat_core::TypeRegistry),
//! and produces one self-contained image:
//!
//! - [`BinaryStream`]: flattened bytes, appended chunk by chunk
//! - [`NodeTable`]: one node per distinct `(address, size)` region
//! - [`FixupSet`]: every pointer slot and the node it refers to
//! - [`RootRegistry`]: named entry points
//!
//! [`Session`] wraps runs behind an enable/invoke/disable control plane.

mod config;
mod containers;
mod context;
mod emit;
mod error;
mod fixup;
mod memory;
mod node_table;
mod pointer;
mod roots;
mod session;
mod stream;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod containers_tests;
#[cfg(test)]
mod node_table_tests;
#[cfg(test)]
mod session_tests;
#[cfg(test)]
mod stream_tests;

pub use config::{FlattenConfig, InvalidPointerPolicy};
pub use context::FlattenContext;
pub use error::FlattenError;
pub use fixup::{FixupEntry, FixupSet, InsertOutcome, ResolvedFixup};
pub use memory::{LocalMemory, MemoryError, SIM_BASE, SimMemory, SourceMemory};
pub use node_table::{DeferredSlot, FlatNode, NodeId, NodeTable};
pub use pointer::PointerRef;
pub use roots::{RootEntry, RootRegistry};
pub use session::{CaptureTarget, DisableReport, EnableRequest, Session, SessionError};
pub use stream::{BinaryStream, StreamChunk};
