//! Container specializations for kernel-style intrusive collections.
//!
//! Intrusive containers embed their link words inside each element, so a
//! plain pointer descriptor cannot tell a link back to the head from a link
//! to another element. A specialization walks the collection itself and
//! owns every link slot, both in the head and in each element.

use crate::registry::TypeId;

/// Shape of an intrusive collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Circular doubly linked list (`list_head`): `{next, prev}` in head and links.
    List,
    /// Hash-bucket list (`hlist_head`/`hlist_node`): head `{first}`, link `{next, pprev}`.
    HList,
    /// NULL-terminated singly linked list (`llist_head`/`llist_node`).
    SList,
    /// Red-black tree (`rb_root`/`rb_node`): link `{parent_color, right, left}`.
    RbTree,
}

impl ContainerKind {
    /// Size of the head structure embedded in the owner.
    pub fn head_size(self) -> usize {
        match self {
            Self::List => 16,
            Self::HList | Self::SList | Self::RbTree => 8,
        }
    }

    /// Offsets of pointer slots inside the head.
    pub fn head_slots(self) -> &'static [usize] {
        match self {
            Self::List => &[0, 8],
            Self::HList | Self::SList | Self::RbTree => &[0],
        }
    }

    /// Size of the link structure embedded in each element.
    pub fn link_size(self) -> usize {
        match self {
            Self::List | Self::HList => 16,
            Self::SList => 8,
            Self::RbTree => 24,
        }
    }

    /// Offsets of pointer slots inside each element's link.
    pub fn link_slots(self) -> &'static [usize] {
        match self {
            Self::List | Self::HList => &[0, 8],
            Self::SList => &[0],
            Self::RbTree => &[0, 8, 16],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::HList => "hlist",
            Self::SList => "slist",
            Self::RbTree => "rbtree",
        }
    }
}

/// A container head field: what the elements are and where their link sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Container {
    pub kind: ContainerKind,
    /// Element type; its descriptor should describe the link as raw bytes.
    pub element: TypeId,
    /// Byte offset of the link structure inside `element`.
    pub link: usize,
}

impl Container {
    pub fn new(kind: ContainerKind, element: TypeId, link: usize) -> Self {
        Self {
            kind,
            element,
            link,
        }
    }
}
