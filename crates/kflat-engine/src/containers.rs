//! Walks of intrusive containers.
//!
//! A walker owns every link slot of its container: the head's and each
//! element's. Elements are staged in walk order, lists forward from the head
//! and red-black trees in pre-order with the left subtree first.

use std::collections::HashSet;

use kflat_core::{Container, ContainerKind, PointerCodec, RestoreFn};

use crate::context::{FlattenContext, Place};
use crate::error::FlattenError;
use crate::node_table::NodeId;
use crate::pointer::PointerRef;

/// Colour bits kept in the low bits of `__rb_parent_color`.
const RB_PARENT: PointerCodec = PointerCodec::low_bits::<3>();

const PLAIN: RestoreFn = restore_plain;

fn restore_plain(address: u64, tag: u64) -> u64 {
    PointerCodec::PLAIN.restore(address, tag)
}

/// Bookkeeping shared by all walks: cycle and length guards.
struct Walk {
    container: Container,
    head: u64,
    seen: HashSet<u64>,
    limit: usize,
}

impl Walk {
    fn visit(&mut self, link: u64) -> Result<(), FlattenError> {
        if self.seen.len() >= self.limit {
            return Err(self.corrupt("more elements than the container limit"));
        }
        if !self.seen.insert(link) {
            return Err(self.corrupt("element reached twice"));
        }
        Ok(())
    }

    fn corrupt(&self, reason: &'static str) -> FlattenError {
        FlattenError::CorruptContainer {
            kind: self.container.kind.name(),
            address: self.head,
            reason,
        }
    }

    /// Link structure of `node`.
    fn link_of(&self, node: NodeId, address: u64) -> Place {
        Place {
            node,
            rel: self.container.link as u64,
            address,
        }
    }
}

/// Tree element waiting to be visited, with the slot that points at it.
struct Pending {
    address: u64,
    parent: Option<Place>,
    slot: Place,
}

impl FlattenContext<'_> {
    /// Walk the container whose head sits at `head`.
    pub(crate) fn walk_container(
        &mut self,
        head: Place,
        container: Container,
    ) -> Result<(), FlattenError> {
        for &slot in container.kind.head_slots() {
            self.expect(head.node, head.rel + slot as u64);
        }
        let mut walk = Walk {
            container,
            head: head.address,
            seen: HashSet::new(),
            limit: self.config().max_container_len,
        };
        match container.kind {
            ContainerKind::List => self.walk_list(head, &mut walk),
            ContainerKind::HList => self.walk_hlist(head, &mut walk),
            ContainerKind::SList => self.walk_slist(head, &mut walk),
            ContainerKind::RbTree => self.walk_rbtree(head, &mut walk),
        }
    }

    /// Circular `{next, prev}` list; the last element links back to the head.
    fn walk_list(&mut self, head: Place, walk: &mut Walk) -> Result<(), FlattenError> {
        let mut prev = head;
        let mut next = self.read_word_at(head.address, 0)?;

        while next != head.address {
            if next == 0 {
                return Err(walk.corrupt("null next link"));
            }
            walk.visit(next)?;
            if self.read_word_at(next, 8)? != prev.address {
                return Err(walk.corrupt("prev link does not match"));
            }

            let node = self.element(next, walk.container)?;
            let cur = walk.link_of(node, next);
            self.link(prev.node, prev.rel, cur.ptr(), PLAIN)?;
            self.link(cur.node, cur.rel + 8, prev.ptr(), PLAIN)?;

            prev = cur;
            next = self.read_word_at(next, 0)?;
        }

        if self.read_word_at(head.address, 8)? != prev.address {
            return Err(walk.corrupt("head prev link does not match"));
        }
        self.link(prev.node, prev.rel, head.ptr(), PLAIN)?;
        self.link(head.node, head.rel + 8, prev.ptr(), PLAIN)
    }

    /// `{first}` head, `{next, pprev}` links. `pprev` points at the previous
    /// `next` slot, or at the head's `first`.
    fn walk_hlist(&mut self, head: Place, walk: &mut Walk) -> Result<(), FlattenError> {
        let mut prev = head;
        let mut next = self.read_word_at(head.address, 0)?;

        while next != 0 {
            walk.visit(next)?;
            if self.read_word_at(next, 8)? != prev.address {
                return Err(walk.corrupt("pprev link does not match"));
            }

            let node = self.element(next, walk.container)?;
            let cur = walk.link_of(node, next);
            self.link(prev.node, prev.rel, cur.ptr(), PLAIN)?;
            self.link(cur.node, cur.rel + 8, prev.ptr(), PLAIN)?;

            prev = cur;
            next = self.read_word_at(next, 0)?;
        }
        self.link(prev.node, prev.rel, PointerRef::NULL, PLAIN)
    }

    /// `{first}` head, `{next}` links, NULL-terminated.
    fn walk_slist(&mut self, head: Place, walk: &mut Walk) -> Result<(), FlattenError> {
        let mut prev = head;
        let mut next = self.read_word_at(head.address, 0)?;

        while next != 0 {
            walk.visit(next)?;
            let node = self.element(next, walk.container)?;
            let cur = walk.link_of(node, next);
            self.link(prev.node, prev.rel, cur.ptr(), PLAIN)?;

            prev = cur;
            next = self.read_word_at(next, 0)?;
        }
        self.link(prev.node, prev.rel, PointerRef::NULL, PLAIN)
    }

    /// `{rb_node}` head, `{__rb_parent_color, rb_right, rb_left}` links.
    fn walk_rbtree(&mut self, head: Place, walk: &mut Walk) -> Result<(), FlattenError> {
        let mut stack = vec![Pending {
            address: self.read_word_at(head.address, 0)?,
            parent: None,
            slot: head,
        }];

        while let Some(pending) = stack.pop() {
            if pending.address == 0 {
                self.link(pending.slot.node, pending.slot.rel, PointerRef::NULL, PLAIN)?;
                continue;
            }
            walk.visit(pending.address)?;

            let parent_colour = self.read_word_at(pending.address, 0)?;
            let (parent_address, colour) = RB_PARENT.strip(parent_colour);
            if parent_address != pending.parent.map_or(0, |p| p.address) {
                return Err(walk.corrupt("parent link does not match"));
            }
            let right = self.read_word_at(pending.address, 8)?;
            let left = self.read_word_at(pending.address, 16)?;

            let node = self.element(pending.address, walk.container)?;
            let cur = walk.link_of(node, pending.address);
            self.link(pending.slot.node, pending.slot.rel, cur.ptr(), PLAIN)?;

            let parent = pending.parent.map_or(PointerRef::NULL, Place::ptr);
            self.link(cur.node, cur.rel, parent.with_tag(colour), RB_PARENT.restore_fn())?;

            // Left is pushed last so it is visited first.
            stack.push(Pending {
                address: right,
                parent: Some(cur),
                slot: cur.advance(8),
            });
            stack.push(Pending {
                address: left,
                parent: Some(cur),
                slot: cur.advance(16),
            });
        }
        Ok(())
    }
}
