//! Several pointers into the same memory.
//!
//! A node is identified by address and size, so two views of different sizes
//! over one address are flattened separately, while pointers into the middle
//! of a structure share the node of the structure they point into.

use kflat_core::PointerTarget;
use kflat_verify::Inspector;

use super::{CheckFailure, Fixture, FixtureBuilder, TargetError, expect, follow, root};

/// A 32-byte window, a 16-byte prefix view of it, and the window again.
pub(super) fn overlapptr() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("OVERLAPPTR", "overlapping views of one buffer");
    let window = b.types.declare("window", 32, 8)?;
    let prefix = b.types.declare("prefix", 16, 8)?;
    let views = b.types.declare("views", 24, 8)?;
    b.types
        .fields(window)
        .raw("a", 0, 8)
        .raw("b", 8, 8)
        .raw("c", 16, 8)
        .raw("d", 24, 8);
    b.types.fields(prefix).raw("a", 0, 8).raw("b", 8, 8);
    b.types
        .fields(views)
        .pointer("whole", 0, window)
        .pointer("head", 8, prefix)
        .pointer("again", 16, window);

    let buffer = b.mem.alloc(32, 8)?;
    for idx in 0..4 {
        b.mem.write_u64(buffer + idx * 8, idx + 1)?;
    }
    let at = b.mem.alloc(24, 8)?;
    for slot in 0..3 {
        b.mem.write_u64(at + slot * 8, buffer)?;
    }
    b.root("views", at, views);
    b.finish(verify_overlapptr)
}

fn verify_overlapptr(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let views = root(inspector, "views")?;
    let whole = follow(&views, "whole")?;
    let head = follow(&views, "head")?;
    let again = follow(&views, "again")?;

    expect("same-size views", again.offset(), whole.offset())?;
    expect("layout", (whole.offset(), head.offset()), (24, 56))?;
    expect("prefix", (head.u64("a")?, head.u64("b")?), (1, 2))?;
    expect("window end", whole.u64("d")?, 4)?;
    expect("nodes", inspector.image().nodes().len(), 3)?;
    expect("fixups", inspector.image().fixups().len(), 3)
}

const CELLS: u64 = 4;

/// `struct cell { u64 id; struct cell *next; u64 payload; u64 *peer; }`
/// where `peer` points at the payload of the next cell.
pub(super) fn overlaplist() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("OVERLAPLIST", "list with member pointers into the next cell");
    let cell = b.types.declare("cell", 32, 8)?;
    b.types
        .fields(cell)
        .raw("id", 0, 8)
        .pointer("next", 8, cell)
        .raw("payload", 16, 8)
        .pointer_to("peer", 24, PointerTarget::one(cell).into_member(16));

    let mut cells = Vec::new();
    for _ in 0..CELLS {
        cells.push(b.mem.alloc(32, 8)?);
    }
    for (idx, &at) in cells.iter().enumerate() {
        let next = cells.get(idx + 1).copied().unwrap_or(0);
        b.mem.write_u64(at, idx as u64)?;
        b.mem.write_u64(at + 8, next)?;
        b.mem.write_u64(at + 16, 0x100 + idx as u64)?;
        b.mem.write_u64(at + 24, if next == 0 { 0 } else { next + 16 })?;
    }
    b.root("cells", cells[0], cell);
    b.finish(verify_overlaplist)
}

fn verify_overlaplist(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let mut cell = root(inspector, "cells")?;
    for id in 0..CELLS {
        expect("cell id", cell.u64("id")?, id)?;
        expect("payload", cell.u64("payload")?, 0x100 + id)?;
        let Some(next) = cell.deref("next")? else {
            expect("last cell", id, CELLS - 1)?;
            expect("last peer", cell.pointer("peer")?.target, None)?;
            break;
        };
        expect("peer target", cell.pointer("peer")?.target, Some(next.offset() + 16))?;
        expect("peer cell", follow(&cell, "peer")?.offset(), next.offset())?;
        cell = next;
    }
    expect("nodes", inspector.image().nodes().len(), CELLS as usize)?;
    expect("fixups", inspector.image().fixups().len(), 2 * CELLS as usize)
}
