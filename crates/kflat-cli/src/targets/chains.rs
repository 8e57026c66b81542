//! Plain pointer graphs: chains, cycles, sharing and alignment.

use kflat_verify::Inspector;

use super::{CheckFailure, Fixture, FixtureBuilder, TargetError, expect, follow, root};

/// `struct chain { u64 value; struct chain *next; }`
pub(super) fn simple() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("SIMPLE", "linear chain A -> B -> C");
    let chain = b.types.declare("chain", 16, 8)?;
    b.types.fields(chain).raw("value", 0, 8).pointer("next", 8, chain);

    let nodes = [b.mem.alloc(16, 8)?, b.mem.alloc(16, 8)?, b.mem.alloc(16, 8)?];
    for (idx, &node) in nodes.iter().enumerate() {
        b.mem.write_u64(node, 0xa + idx as u64)?;
        b.mem.write_u64(node + 8, nodes.get(idx + 1).copied().unwrap_or(0))?;
    }
    b.root("chain", nodes[0], chain);
    b.finish(verify_simple)
}

fn verify_simple(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let a = root(inspector, "chain")?;
    let b = follow(&a, "next")?;
    let c = follow(&b, "next")?;

    for (node, value) in [(a, 0xa), (b, 0xb), (c, 0xc)] {
        expect(format_args!("value @{:#x}", node.offset()), node.u64("value")?, value)?;
    }
    expect("end of chain", c.deref("next")?.map(|n| n.offset()), None)?;
    // Discovery order, back to back.
    expect("offsets", [a.offset(), b.offset(), c.offset()], [0, 16, 32])?;
    expect("reachable nodes", inspector.reachable(&a), 3)
}

const CIRCLE_LEN: usize = 4;

/// `struct circle { u64 id; struct circle *next, *prev; }` in a ring.
pub(super) fn circle() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("CIRCLE", "doubly linked ring of four");
    let circle = b.types.declare("circle", 24, 8)?;
    b.types
        .fields(circle)
        .raw("id", 0, 8)
        .pointer("next", 8, circle)
        .pointer("prev", 16, circle);

    let mut ring = Vec::with_capacity(CIRCLE_LEN);
    for _ in 0..CIRCLE_LEN {
        ring.push(b.mem.alloc(24, 8)?);
    }
    for (idx, &node) in ring.iter().enumerate() {
        b.mem.write_u64(node, idx as u64 + 1)?;
        b.mem.write_u64(node + 8, ring[(idx + 1) % CIRCLE_LEN])?;
        b.mem.write_u64(node + 16, ring[(idx + CIRCLE_LEN - 1) % CIRCLE_LEN])?;
    }
    b.root("circle", ring[0], circle);
    b.finish(verify_circle)
}

fn verify_circle(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let start = root(inspector, "circle")?;
    let mut node = start;
    for id in 1..=CIRCLE_LEN as u64 {
        expect("ring id", node.u64("id")?, id)?;
        let next = follow(&node, "next")?;
        expect("back link", follow(&next, "prev")?.offset(), node.offset())?;
        node = next;
    }
    expect("ring closes", node.offset(), start.offset())?;
    expect("nodes", inspector.image().nodes().len(), CIRCLE_LEN)?;
    expect("reachable nodes", inspector.reachable(&start), CIRCLE_LEN)
}

/// Two holders sharing one leaf, captured as separate roots.
pub(super) fn pointer() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("POINTER", "one leaf shared by two roots");
    let leaf = b.types.declare("leaf", 16, 8)?;
    let holder = b.types.declare("holder", 16, 8)?;
    b.types.fields(leaf).raw("value", 0, 8).raw("tag", 8, 8);
    b.types.fields(holder).raw("id", 0, 8).pointer("leaf", 8, leaf);

    let shared = b.mem.alloc(16, 8)?;
    b.mem.write_u64(shared, 0x1eaf)?;
    b.mem.write(shared + 8, b"shared\0\0")?;
    for (name, id) in [("first", 1), ("second", 2)] {
        let at = b.mem.alloc(16, 8)?;
        b.mem.write_u64(at, id)?;
        b.mem.write_u64(at + 8, shared)?;
        b.root(name, at, holder);
    }
    b.finish(verify_pointer)
}

fn verify_pointer(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let first = root(inspector, "first")?;
    let second = root(inspector, "second")?;
    let leaf = follow(&first, "leaf")?;

    expect("ids", (first.u64("id")?, second.u64("id")?), (1, 2))?;
    expect("shared leaf", follow(&second, "leaf")?.offset(), leaf.offset())?;
    expect("leaf value", leaf.u64("value")?, 0x1eaf)?;
    expect("leaf tag", leaf.field_bytes("tag")?, b"shared\0\0".as_slice())?;
    expect("nodes", inspector.image().nodes().len(), 3)?;
    expect("fixups", inspector.image().fixups().len(), 2)?;
    expect("roots", inspector.image().roots().len(), 2)
}

const FRAMES: usize = 3;

/// Byte-aligned packets between 8-byte aligned frames.
pub(super) fn padding() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("PADDING", "nodes keep their type alignment");
    let packet = b.types.declare("packet", 3, 1)?;
    let frame = b.types.declare("frame", 24, 8)?;
    b.types.fields(packet).raw("kind", 0, 3);
    b.types
        .fields(frame)
        .raw("seq", 0, 8)
        .pointer("head", 8, packet)
        .pointer("next", 16, frame);

    let mut frames = Vec::with_capacity(FRAMES);
    for _ in 0..FRAMES {
        frames.push(b.mem.alloc(24, 8)?);
    }
    for (idx, &at) in frames.iter().enumerate() {
        let head = b.mem.alloc(3, 1)?;
        let seq = idx as u8;
        b.mem.write(head, &[seq, seq + 1, seq + 2])?;
        b.mem.write_u64(at, 100 + idx as u64)?;
        b.mem.write_u64(at + 8, head)?;
        b.mem.write_u64(at + 16, frames.get(idx + 1).copied().unwrap_or(0))?;
    }
    b.root("frames", frames[0], frame);
    b.finish(verify_padding)
}

fn verify_padding(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let mut frame = Some(root(inspector, "frames")?);
    let mut layout = Vec::new();
    for idx in 0..FRAMES as u8 {
        let Some(cur) = frame else {
            return Err(CheckFailure::Null(format!("frame {idx}")));
        };
        let head = follow(&cur, "head")?;
        expect("frame seq", cur.u64("seq")?, 100 + u64::from(idx))?;
        expect("packet bytes", head.bytes(), [idx, idx + 1, idx + 2].as_slice())?;
        layout.push((cur.offset(), head.offset()));
        frame = cur.deref("next")?;
    }
    // Packets pack tightly; each frame is padded up to 8.
    expect("layout", layout, vec![(0, 24), (32, 56), (64, 88)])
}
