use kflat_core::PointerCodec;

use crate::{DeferredSlot, NodeTable, PointerRef};

#[test]
fn resolve_or_create_deduplicates() {
    let mut nodes = NodeTable::new();

    let (a, new_a) = nodes.resolve_or_create(0x1000, 16, 8);
    let (again, new_again) = nodes.resolve_or_create(0x1000, 16, 8);
    let (wider, new_wider) = nodes.resolve_or_create(0x1000, 32, 8);

    assert!(new_a);
    assert!(!new_again);
    assert!(new_wider);
    assert_eq!(a, again);
    assert_ne!(a, wider);
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes.find(0x1000, 32), Some(wider));
    assert_eq!(nodes.find(0x1000, 8), None);
}

#[test]
fn emission_state() {
    let mut nodes = NodeTable::new();
    let (a, _) = nodes.resolve_or_create(0x1000, 16, 8);
    let (b, _) = nodes.resolve_or_create(0x2000, 16, 8);

    assert_eq!(nodes.first_unemitted().map(|(id, _)| id), Some(a));
    nodes.set_offset(a, 0);
    assert_eq!(nodes.first_unemitted().map(|(id, _)| id), Some(b));
    nodes.set_offset(b, 16);
    assert!(nodes.first_unemitted().is_none());
    assert_eq!(nodes.offset(b), Some(16));
    assert!(nodes.get(a).is_emitted());
}

#[test]
fn deferred_slots_returned_on_emission() {
    let mut nodes = NodeTable::new();
    let (a, _) = nodes.resolve_or_create(0x1000, 16, 8);
    let slot = DeferredSlot {
        rel: 8,
        ptr: PointerRef::to(a, 0),
        restore: PointerCodec::PLAIN.restore_fn(),
    };
    nodes.defer(a, slot);

    let pending = nodes.set_offset(a, 64);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].rel, 8);
    assert_eq!(pending[0].ptr, PointerRef::to(a, 0));
}
