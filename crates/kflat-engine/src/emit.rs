//! Image assembly at the end of a run.

use kflat_core::POINTER_SIZE;
use kflat_image::{ImageWriter, NodeExtent};

use crate::error::FlattenError;
use crate::fixup::{ResolvedFixup, node_offset};
use crate::node_table::NodeTable;
use crate::roots::RootRegistry;
use crate::stream::BinaryStream;

/// Concatenate the stream, store at-rest values in every pointer slot and
/// lay out the image around it.
pub(crate) fn write_image(
    stream: &BinaryStream,
    nodes: &NodeTable,
    fixups: &[ResolvedFixup],
    roots: &RootRegistry,
) -> Result<Vec<u8>, FlattenError> {
    let mut data = Vec::new();
    stream.write_into(&mut data)?;

    for fixup in fixups {
        let start = fixup.slot as usize;
        let slot = data
            .get_mut(start..start + POINTER_SIZE)
            .ok_or(FlattenError::MissingFixupTarget { slot: fixup.slot })?;
        slot.copy_from_slice(&fixup.at_rest.to_le_bytes());
    }

    let mut writer = ImageWriter::new(data);
    for fixup in fixups {
        writer.fixup(fixup.to_image());
    }
    for (id, node) in nodes.iter() {
        writer.node(NodeExtent::new(node_offset(nodes, id)?, node.size() as u64));
    }
    for root in roots.iter() {
        let target = match root.ptr.target {
            Some(id) => Some(node_offset(nodes, id)? + root.ptr.offset),
            None => None,
        };
        writer.root(&root.name, &root.type_name, target);
    }
    Ok(writer.finish()?)
}
