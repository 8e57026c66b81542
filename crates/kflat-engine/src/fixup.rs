//! Relocation records for pointer slots.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use kflat_core::RestoreFn;
use kflat_image::Fixup;

use crate::error::FlattenError;
use crate::node_table::{NodeId, NodeTable};
use crate::pointer::PointerRef;

/// Relocation of one pointer slot.
#[derive(Clone, Copy, Debug)]
pub struct FixupEntry {
    /// Node whose bytes contain the slot.
    pub owner: NodeId,
    pub ptr: PointerRef,
    /// Joins the resolved target with the tag bits for the at-rest value.
    pub restore: RestoreFn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The slot was already registered; the first entry is kept.
    Duplicate,
}

/// A fixup with its target turned into a data offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedFixup {
    pub slot: u64,
    pub target: Option<u64>,
    pub tag: u64,
    /// Value stored in the slot of the image's data section.
    pub at_rest: u64,
}

impl ResolvedFixup {
    pub fn to_image(&self) -> Fixup {
        Fixup::new(self.slot, self.target, self.tag)
    }
}

/// Fixups keyed by absolute slot offset in the stream.
#[derive(Debug, Default)]
pub struct FixupSet {
    entries: BTreeMap<u64, FixupEntry>,
}

impl FixupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the slot at `offset`. A second insert for the same slot is
    /// a no-op reported as [`InsertOutcome::Duplicate`].
    pub fn insert(
        &mut self,
        owner: NodeId,
        offset: u64,
        ptr: PointerRef,
        restore: RestoreFn,
    ) -> InsertOutcome {
        match self.entries.entry(offset) {
            Entry::Occupied(_) => InsertOutcome::Duplicate,
            Entry::Vacant(slot) => {
                slot.insert(FixupEntry {
                    owner,
                    ptr,
                    restore,
                });
                InsertOutcome::Inserted
            }
        }
    }

    /// Retarget an already registered slot.
    pub fn update(
        &mut self,
        owner: NodeId,
        offset: u64,
        ptr: PointerRef,
    ) -> Result<(), FlattenError> {
        let entry = self
            .entries
            .get_mut(&offset)
            .ok_or(FlattenError::MissingFixupTarget { slot: offset })?;
        entry.owner = owner;
        entry.ptr = ptr;
        Ok(())
    }

    pub fn get(&self, offset: u64) -> Option<&FixupEntry> {
        self.entries.get(&offset)
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.entries.contains_key(&offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &FixupEntry)> {
        self.entries.iter().map(|(&slot, entry)| (slot, entry))
    }

    /// Turn every target into a data offset, in slot order.
    ///
    /// Fails if a target node never received its offset.
    pub fn resolve(&self, nodes: &NodeTable) -> Result<Vec<ResolvedFixup>, FlattenError> {
        let mut resolved = Vec::new();
        resolved
            .try_reserve_exact(self.entries.len())
            .map_err(|_| FlattenError::AllocationFailure {
                size: self.entries.len() * size_of::<ResolvedFixup>(),
            })?;

        for (&slot, entry) in &self.entries {
            let target = match entry.ptr.target {
                Some(id) => Some(node_offset(nodes, id)? + entry.ptr.offset),
                None => None,
            };
            let at_rest = (entry.restore)(target.unwrap_or(0), entry.ptr.tag);
            resolved.push(ResolvedFixup {
                slot,
                target,
                tag: entry.ptr.tag,
                at_rest,
            });
        }
        Ok(resolved)
    }
}

pub(crate) fn node_offset(nodes: &NodeTable, id: NodeId) -> Result<u64, FlattenError> {
    let node = nodes.get(id);
    node.offset().ok_or(FlattenError::UnresolvedCycleNode {
        node: id.get(),
        address: node.address(),
        size: node.size(),
    })
}
