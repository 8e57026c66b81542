use crate::node_table::NodeId;

/// Symbolic pointer value: a node and a byte offset into it, plus tag bits.
///
/// Refers to a node by identity, so it can be taken before the node has a
/// stream offset. It becomes a number only when fixups are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointerRef {
    /// `None` for a pointer without a target.
    pub target: Option<NodeId>,
    pub offset: u64,
    pub tag: u64,
}

impl PointerRef {
    pub const NULL: Self = Self {
        target: None,
        offset: 0,
        tag: 0,
    };

    pub fn to(node: NodeId, offset: u64) -> Self {
        Self {
            target: Some(node),
            offset,
            tag: 0,
        }
    }

    pub fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }

    pub fn untagged(self) -> Self {
        self.with_tag(0)
    }

    pub fn is_null(&self) -> bool {
        self.target.is_none()
    }
}
