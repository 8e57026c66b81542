//! Intrusive kernel containers: lists, hash lists, lock-less lists and
//! red-black trees.

use std::collections::HashSet;

use kflat_core::{Container, ContainerKind, TypeId, TypeRegistry};
use kflat_engine::{MemoryError, SimMemory};
use kflat_verify::{Cursor, InspectError, Inspector};

use super::{CheckFailure, Fixture, FixtureBuilder, TargetError, expect, root};

const LIST_KEYS: [u64; 5] = [10, 20, 30, 40, 50];
const HLIST_KEYS: [u64; 5] = [3, 1, 4, 5, 9];
const LLIST_KEYS: [u64; 6] = [1, 2, 3, 4, 5, 6];
const RB_KEYS: usize = 10;

pub(super) const RB_RED: u64 = 0;
pub(super) const RB_BLACK: u64 = 1;

/// `struct entry { u64 key; <link>; }` held by `struct owner { u64 id; <head>; }`.
fn entry_types(types: &mut TypeRegistry, kind: ContainerKind) -> Result<TypeId, TargetError> {
    let link = kind.link_size();
    let entry = types.declare("entry", 8 + link, 8)?;
    let owner = types.declare("owner", 8 + kind.head_size(), 8)?;
    types.fields(entry).raw("key", 0, 8).raw("link", 8, link);
    types
        .fields(owner)
        .raw("id", 0, 8)
        .container("entries", 8, Container::new(kind, entry, 8));
    Ok(owner)
}

/// Owner plus one entry per key; returns the owner and every entry's link.
fn alloc_entries(
    mem: &mut SimMemory,
    kind: ContainerKind,
    keys: &[u64],
) -> Result<(u64, Vec<u64>), MemoryError> {
    let owner = mem.alloc(8 + kind.head_size(), 8)?;
    mem.write_u64(owner, 1)?;
    let mut links = Vec::with_capacity(keys.len());
    for &key in keys {
        let entry = mem.alloc(8 + kind.link_size(), 8)?;
        mem.write_u64(entry, key)?;
        links.push(entry + 8);
    }
    Ok((owner, links))
}

pub(super) fn list() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("LIST", "circular doubly linked list_head");
    let owner_ty = entry_types(&mut b.types, ContainerKind::List)?;
    let (owner, links) = alloc_entries(&mut b.mem, ContainerKind::List, &LIST_KEYS)?;

    let mut ring = vec![owner + 8];
    ring.extend(links);
    for (idx, &at) in ring.iter().enumerate() {
        b.mem.write_u64(at, ring[(idx + 1) % ring.len()])?;
        b.mem.write_u64(at + 8, ring[(idx + ring.len() - 1) % ring.len()])?;
    }
    b.root("owner", owner, owner_ty);
    b.finish(verify_list)
}

fn verify_list(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let owner = root(inspector, "owner")?;
    let entries = check_keys(&owner, &LIST_KEYS)?;

    // Every prev link points one step back around the ring.
    let head = owner.offset() + 8;
    let mut links = vec![head];
    links.extend(entries.iter().map(|e| e.offset() + 8));
    for (idx, &link) in links.iter().enumerate() {
        let prev = links[(idx + links.len() - 1) % links.len()];
        expect(format_args!("prev of @{link:#x}"), target(inspector, link + 8)?, Some(prev))?;
    }
    Ok(())
}

pub(super) fn hlist() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("HLIST", "hash bucket hlist_head");
    let owner_ty = entry_types(&mut b.types, ContainerKind::HList)?;
    let (owner, links) = alloc_entries(&mut b.mem, ContainerKind::HList, &HLIST_KEYS)?;

    let mut prev = owner + 8;
    for &link in &links {
        b.mem.write_u64(prev, link)?;
        b.mem.write_u64(link + 8, prev)?;
        prev = link;
    }
    b.root("owner", owner, owner_ty);
    b.finish(verify_hlist)
}

fn verify_hlist(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let owner = root(inspector, "owner")?;
    let entries = check_keys(&owner, &HLIST_KEYS)?;

    // pprev points at the slot that points here.
    let mut slot = owner.offset() + 8;
    for entry in &entries {
        let link = entry.offset() + 8;
        expect(format_args!("pprev of @{link:#x}"), target(inspector, link + 8)?, Some(slot))?;
        slot = link;
    }
    expect("last next", target(inspector, slot)?, None)
}

pub(super) fn llist() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("LLIST", "NULL-terminated llist_head");
    let owner_ty = entry_types(&mut b.types, ContainerKind::SList)?;
    let (owner, links) = alloc_entries(&mut b.mem, ContainerKind::SList, &LLIST_KEYS)?;

    let mut prev = owner + 8;
    for &link in &links {
        b.mem.write_u64(prev, link)?;
        prev = link;
    }
    b.root("owner", owner, owner_ty);
    b.finish(verify_llist)
}

fn verify_llist(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let owner = root(inspector, "owner")?;
    check_keys(&owner, &LLIST_KEYS)?;
    expect("reachable nodes", inspector.reachable(&owner), 1 + LLIST_KEYS.len())
}

/// `struct rbkey { struct rb_node rb; u64 key; }` under `struct rb_root`.
pub(super) fn rbnode() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("RBNODE", "red-black tree of integer keys");
    let node = b.types.declare("rbkey", 32, 8)?;
    let tree = b.types.declare("keytree", 8, 8)?;
    b.types.fields(node).raw("rb", 0, 24).raw("key", 24, 8);
    b.types
        .fields(tree)
        .container("root", 0, Container::new(ContainerKind::RbTree, node, 0));

    let keys: Vec<u64> = (1..=RB_KEYS as u64).map(|k| k * 11).collect();
    let root_node = balanced_rbtree(&mut b.mem, &keys, &mut |mem, at, &key| {
        mem.write_u64(at + 24, key)
    })?;
    let at = b.mem.alloc(8, 8)?;
    b.mem.write_u64(at, root_node)?;
    b.root("tree", at, tree);
    b.finish(verify_rbnode)
}

fn verify_rbnode(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let tree = root(inspector, "tree")?;
    let keys: Vec<u64> = (1..=RB_KEYS as u64).map(|k| k * 11).collect();
    let mut expected = Vec::new();
    preorder(&keys, &mut expected);

    let nodes = tree.elements("root")?;
    let found = nodes
        .iter()
        .map(|n| n.u64("key"))
        .collect::<Result<Vec<_>, _>>()?;
    expect("pre-order keys", found, expected)?;
    check_colours(inspector, &nodes)
}

/// Walk container `entries` and compare keys in order.
fn check_keys<'a>(owner: &Cursor<'a>, keys: &[u64]) -> Result<Vec<Cursor<'a>>, CheckFailure> {
    let entries = owner.elements("entries")?;
    let found = entries
        .iter()
        .map(|e| e.u64("key"))
        .collect::<Result<Vec<_>, _>>()?;
    expect("keys", found.as_slice(), keys)?;
    Ok(entries)
}

/// Target of the fixup at `slot`.
pub(super) fn target(inspector: &Inspector<'_>, slot: u64) -> Result<Option<u64>, CheckFailure> {
    let fixup = inspector
        .image()
        .fixup_at(slot)
        .ok_or(InspectError::MissingFixup { slot })?;
    Ok(fixup.target)
}

/// Tree nodes with 32-byte elements and the link at 0: the root is black
/// with no parent, every other node's parent link points at a node of the
/// tree and no red node has a red parent.
pub(super) fn check_colours(
    inspector: &Inspector<'_>,
    nodes: &[Cursor<'_>],
) -> Result<(), CheckFailure> {
    let image = inspector.image();
    let members: HashSet<u64> = nodes.iter().map(|n| n.offset()).collect();
    let colour_of = |offset: u64| {
        image
            .fixup_at(offset)
            .map(|f| f.tag)
            .ok_or(InspectError::MissingFixup { slot: offset })
    };

    for (idx, node) in nodes.iter().enumerate() {
        let parent = image
            .fixup_at(node.offset())
            .ok_or(InspectError::MissingFixup { slot: node.offset() })?;
        if idx == 0 {
            expect("root parent", (parent.target, parent.tag), (None, RB_BLACK))?;
            continue;
        }
        let Some(up) = parent.target else {
            return Err(CheckFailure::Null(format!("parent of @{:#x}", node.offset())));
        };
        if !members.contains(&up) {
            return Err(CheckFailure::Mismatch {
                what: format!("parent of @{:#x}", node.offset()),
                expected: "a tree node".into(),
                found: format!("@{up:#x}"),
            });
        }
        if parent.tag == RB_RED && colour_of(up)? == RB_RED {
            return Err(CheckFailure::Mismatch {
                what: format!("colour of @{:#x}", node.offset()),
                expected: "black under a red parent".into(),
                found: "red".into(),
            });
        }
    }
    Ok(())
}

/// Lay out a balanced tree over sorted `items` in 32-byte nodes with the
/// `rb_node` at 0; `payload` fills the rest of each node. The deepest level
/// is red, the rest black. Returns the root node.
pub(super) fn balanced_rbtree<T>(
    mem: &mut SimMemory,
    items: &[T],
    payload: &mut impl FnMut(&mut SimMemory, u64, &T) -> Result<(), MemoryError>,
) -> Result<u64, MemoryError> {
    let red_depth = items.len().max(1).ilog2();
    place(mem, items, 0, 0, red_depth, payload)
}

fn place<T>(
    mem: &mut SimMemory,
    items: &[T],
    parent: u64,
    depth: u32,
    red_depth: u32,
    payload: &mut impl FnMut(&mut SimMemory, u64, &T) -> Result<(), MemoryError>,
) -> Result<u64, MemoryError> {
    if items.is_empty() {
        return Ok(0);
    }
    let mid = items.len() / 2;
    let node = mem.alloc(32, 8)?;
    payload(mem, node, &items[mid])?;
    let colour = if depth == red_depth { RB_RED } else { RB_BLACK };
    let left = place(mem, &items[..mid], node, depth + 1, red_depth, payload)?;
    let right = place(mem, &items[mid + 1..], node, depth + 1, red_depth, payload)?;
    mem.write_u64(node, parent | colour)?;
    mem.write_u64(node + 8, right)?;
    mem.write_u64(node + 16, left)?;
    Ok(node)
}

/// Pre-order, left first, of the tree [`balanced_rbtree`] builds.
pub(super) fn preorder<T: Clone>(items: &[T], out: &mut Vec<T>) {
    if items.is_empty() {
        return;
    }
    let mid = items.len() / 2;
    out.push(items[mid].clone());
    preorder(&items[..mid], out);
    preorder(&items[mid + 1..], out);
}
