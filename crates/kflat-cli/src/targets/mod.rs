//! Built-in capture targets.
//!
//! Each target lays out a small structure graph in a simulated address
//! space (the produce side) and knows what a correct image of it looks like
//! (the verify side). The two sides share only the type descriptors.

mod chains;
mod containers;
mod overlap;
mod stringset;
mod structarray;


use std::fmt;
use std::rc::Rc;

use kflat_core::{DescriptorError, TypeId, TypeRegistry};
use kflat_engine::{
    CaptureTarget, FlattenContext, FlattenError, MemoryError, SimMemory, SourceMemory,
};
use kflat_image::Image;
use kflat_verify::{Cursor, InspectError, Inspector};

/// Failure to lay out a target.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// An image that does not match what its target captured.
#[derive(Debug, thiserror::Error)]
pub enum CheckFailure {
    #[error(transparent)]
    Inspect(#[from] InspectError),
    #[error("{what}: expected {expected}, found {found}")]
    Mismatch {
        what: String,
        expected: String,
        found: String,
    },
    #[error("{0} is null")]
    Null(String),
}

pub type VerifyFn = fn(&Inspector<'_>) -> Result<(), CheckFailure>;

struct RootSpec {
    name: &'static str,
    address: u64,
    ty: TypeId,
}

struct Inner {
    name: &'static str,
    description: &'static str,
    memory: SimMemory,
    types: TypeRegistry,
    roots: Vec<RootSpec>,
    verify: VerifyFn,
}

/// A built-in target. Cheap to clone.
#[derive(Clone)]
pub struct Fixture(Rc<Inner>);

impl Fixture {
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Check a captured image against what this target laid out.
    pub fn verify(&self, image: &Image) -> Result<(), CheckFailure> {
        (self.0.verify)(&Inspector::new(image, &self.0.types))
    }
}

impl CaptureTarget for Fixture {
    fn name(&self) -> &str {
        self.0.name
    }

    fn description(&self) -> &str {
        self.0.description
    }

    fn memory(&self) -> &dyn SourceMemory {
        &self.0.memory
    }

    fn types(&self) -> &TypeRegistry {
        &self.0.types
    }

    fn capture(&self, flat: &mut FlattenContext<'_>) -> Result<(), FlattenError> {
        for root in &self.0.roots {
            flat.flatten_root(root.name, root.address, root.ty)?;
        }
        Ok(())
    }
}

/// Produce side of a target under construction.
pub(crate) struct FixtureBuilder {
    name: &'static str,
    description: &'static str,
    pub mem: SimMemory,
    pub types: TypeRegistry,
    roots: Vec<RootSpec>,
}

impl FixtureBuilder {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            mem: SimMemory::new(),
            types: TypeRegistry::new(),
            roots: Vec::new(),
        }
    }

    /// Flatten the `ty` instance at `address` under `name`.
    pub fn root(&mut self, name: &'static str, address: u64, ty: TypeId) {
        self.roots.push(RootSpec { name, address, ty });
    }

    pub fn finish(self, verify: VerifyFn) -> Result<Fixture, TargetError> {
        self.types.validate()?;
        Ok(Fixture(Rc::new(Inner {
            name: self.name,
            description: self.description,
            memory: self.mem,
            types: self.types,
            roots: self.roots,
            verify,
        })))
    }
}

/// Every built-in target, in listing order.
pub fn builtin() -> Result<Vec<Fixture>, TargetError> {
    Ok(vec![
        chains::simple()?,
        chains::circle()?,
        chains::pointer()?,
        overlap::overlaplist()?,
        overlap::overlapptr()?,
        structarray::structarray()?,
        stringset::stringset()?,
        containers::list()?,
        containers::hlist()?,
        containers::llist()?,
        containers::rbnode()?,
        chains::padding()?,
    ])
}

pub(crate) fn expect<T: PartialEq + fmt::Debug>(
    what: impl fmt::Display,
    found: T,
    expected: T,
) -> Result<(), CheckFailure> {
    if found == expected {
        return Ok(());
    }
    Err(CheckFailure::Mismatch {
        what: what.to_string(),
        expected: format!("{expected:?}"),
        found: format!("{found:?}"),
    })
}

/// The object behind root `name`, which must not be null.
pub(crate) fn root<'a>(
    inspector: &Inspector<'a>,
    name: &str,
) -> Result<Cursor<'a>, CheckFailure> {
    inspector
        .root(name)?
        .ok_or_else(|| CheckFailure::Null(format!("root `{name}`")))
}

/// Follow pointer `field`, which must not be null.
pub(crate) fn follow<'a>(cursor: &Cursor<'a>, field: &str) -> Result<Cursor<'a>, CheckFailure> {
    cursor
        .deref(field)?
        .ok_or_else(|| CheckFailure::Null(format!("{}.{field}", cursor.type_name())))
}

/// Text behind `field`, which must not be null.
pub(crate) fn text<'a>(cursor: &Cursor<'a>, field: &str) -> Result<&'a str, CheckFailure> {
    cursor
        .text(field)?
        .ok_or_else(|| CheckFailure::Null(format!("{}.{field}", cursor.type_name())))
}
