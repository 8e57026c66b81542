//! Deduplication of flattened source regions.

use indexmap::IndexMap;
use indexmap::map::Entry;
use kflat_core::RestoreFn;

use crate::pointer::PointerRef;

/// Index of a node in its [`NodeTable`], in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pointer slot inside a node that was not yet emitted.
#[derive(Clone, Copy, Debug)]
pub struct DeferredSlot {
    /// Slot position relative to the node start.
    pub rel: u64,
    pub ptr: PointerRef,
    pub restore: RestoreFn,
}

/// One distinct source region.
///
/// In progress while `offset` is `None`, emitted once the stream offset of
/// its bytes is recorded.
#[derive(Debug)]
pub struct FlatNode {
    address: u64,
    size: usize,
    align: usize,
    offset: Option<u64>,
    pending: Vec<DeferredSlot>,
}

impl FlatNode {
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn is_emitted(&self) -> bool {
        self.offset.is_some()
    }
}

/// Arena of nodes keyed by `(address, size)`.
///
/// The same address with a different size is a different node: two views
/// of one region are separate flattening obligations.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: IndexMap<(u64, usize), FlatNode>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for the region, and whether it was just created.
    ///
    /// A new node has no offset; the caller appends its bytes and then
    /// calls [`set_offset`](Self::set_offset).
    pub fn resolve_or_create(&mut self, address: u64, size: usize, align: usize) -> (NodeId, bool) {
        let next = NodeId(self.nodes.len() as u32);
        match self.nodes.entry((address, size)) {
            Entry::Occupied(entry) => (NodeId(entry.index() as u32), false),
            Entry::Vacant(entry) => {
                entry.insert(FlatNode {
                    address,
                    size,
                    align,
                    offset: None,
                    pending: Vec::new(),
                });
                (next, true)
            }
        }
    }

    pub fn find(&self, address: u64, size: usize) -> Option<NodeId> {
        self.nodes
            .get_index_of(&(address, size))
            .map(|i| NodeId(i as u32))
    }

    /// Record where the node's bytes landed and hand back its deferred slots.
    pub fn set_offset(&mut self, id: NodeId, offset: u64) -> Vec<DeferredSlot> {
        let node = &mut self.nodes[id.index()];
        debug_assert!(node.offset.is_none(), "node emitted twice");
        node.offset = Some(offset);
        std::mem::take(&mut node.pending)
    }

    /// Queue a slot fixup until the node is emitted.
    pub fn defer(&mut self, id: NodeId, slot: DeferredSlot) {
        self.nodes[id.index()].pending.push(slot);
    }

    /// # Panics
    /// Panics if `id` was not handed out by this table.
    pub fn get(&self, id: NodeId) -> &FlatNode {
        &self.nodes[id.index()]
    }

    pub fn offset(&self, id: NodeId) -> Option<u64> {
        self.get(id).offset
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &FlatNode)> {
        self.nodes
            .values()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    /// First node still in progress, if any.
    pub fn first_unemitted(&self) -> Option<(NodeId, &FlatNode)> {
        self.iter().find(|(_, node)| !node.is_emitted())
    }
}
