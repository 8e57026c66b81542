//! Hand-assembled images for format tests.

use crate::{Fixup, ImageWriter, NodeExtent};

/// Three 24-byte nodes `{value, next, pad}` linked N0 → N1 → N2 → null,
/// one root `chain` at N0. Pointer slots hold their at-rest offsets.
pub fn chain_writer(tag: u64) -> ImageWriter {
    let mut data = vec![0u8; 72];
    for (idx, value) in [10u64, 20, 30].into_iter().enumerate() {
        data[idx * 24..idx * 24 + 8].copy_from_slice(&value.to_le_bytes());
    }
    data[8..16].copy_from_slice(&(24 | tag).to_le_bytes());
    data[32..40].copy_from_slice(&48u64.to_le_bytes());

    let mut writer = ImageWriter::new(data);
    writer
        .node(NodeExtent::new(0, 24))
        .node(NodeExtent::new(24, 24))
        .node(NodeExtent::new(48, 24))
        .fixup(Fixup::new(8, Some(24), tag))
        .fixup(Fixup::new(32, Some(48), 0))
        .fixup(Fixup::new(56, None, 0))
        .root("chain", "item", Some(0));
    writer
}

pub fn chain_image() -> Vec<u8> {
    chain_writer(0).finish().unwrap()
}

pub fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}
