//! Arrays of structures, with fixed and runtime lengths.

use kflat_core::PointerTarget;
use kflat_engine::{MemoryError, SimMemory};
use kflat_verify::{InspectError, Inspector};

use super::{CheckFailure, Fixture, FixtureBuilder, TargetError, expect, root, text};

const ITEMS: u32 = 5;
const PAIR: [(u64, &str); 2] = [(7, "pair-a"), (8, "pair-b")];

/// `struct bag { u32 count; struct item *items; struct item pair[2]*; }`
/// where `items` holds `count` elements.
pub(super) fn structarray() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("STRUCTARRAY", "arrays with fixed and runtime lengths");
    let item = b.types.declare("item", 16, 8)?;
    let bag = b.types.declare("bag", 24, 8)?;
    b.types.fields(item).raw("value", 0, 8).text("label", 8);
    b.types
        .fields(bag)
        .raw("count", 0, 4)
        .raw("pad", 4, 4)
        .pointer_to("items", 8, PointerTarget::counted(item, 0, 4))
        .pointer_to("pair", 16, PointerTarget::array(item, PAIR.len()));

    let items: Vec<(u64, String)> = (0..u64::from(ITEMS))
        .map(|idx| (idx * 100, format!("item-{idx}")))
        .collect();
    let items = alloc_items(&mut b.mem, items.iter().map(|(v, l)| (*v, l.as_str())))?;
    let pair = alloc_items(&mut b.mem, PAIR.into_iter())?;

    let at = b.mem.alloc(24, 8)?;
    b.mem.write_u32(at, ITEMS)?;
    b.mem.write_u64(at + 8, items)?;
    b.mem.write_u64(at + 16, pair)?;
    b.root("bag", at, bag);
    b.finish(verify_structarray)
}

/// Consecutive `item`s; returns the address of the first.
fn alloc_items<'a>(
    mem: &mut SimMemory,
    items: impl ExactSizeIterator<Item = (u64, &'a str)>,
) -> Result<u64, MemoryError> {
    let base = mem.alloc(16 * items.len(), 8)?;
    for (idx, (value, label)) in items.enumerate() {
        let at = base + 16 * idx as u64;
        let label = mem.alloc_cstr(label)?;
        mem.write_u64(at, value)?;
        mem.write_u64(at + 8, label)?;
    }
    Ok(base)
}

fn verify_structarray(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let bag = root(inspector, "bag")?;
    expect("count", bag.u32("count")?, ITEMS)?;

    for idx in 0..ITEMS as usize {
        let item = bag
            .deref_at("items", idx)?
            .ok_or_else(|| CheckFailure::Null("bag.items".into()))?;
        expect("item value", item.u64("value")?, idx as u64 * 100)?;
        expect("item label", text(&item, "label")?, format!("item-{idx}").as_str())?;
    }
    // The runtime length bounds the array node.
    match bag.deref_at("items", ITEMS as usize) {
        Err(InspectError::OutOfBounds { .. }) => {}
        other => {
            return Err(CheckFailure::Mismatch {
                what: "item past the count".into(),
                expected: "out of bounds".into(),
                found: format!("{other:?}"),
            });
        }
    }

    for (idx, (value, label)) in PAIR.into_iter().enumerate() {
        let item = bag
            .deref_at("pair", idx)?
            .ok_or_else(|| CheckFailure::Null("bag.pair".into()))?;
        expect("pair value", item.u64("value")?, value)?;
        expect("pair label", text(&item, "label")?, label)?;
    }
    Ok(())
}
