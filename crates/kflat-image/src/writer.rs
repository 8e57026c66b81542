//! Image assembly from resolved parts.

use super::constants::{HEADER_SIZE, NULL_TARGET, SECTION_ALIGN};
use super::header::Header;
use super::image::ImageError;
use super::sections::{Fixup, NodeExtent};

struct RootSpec {
    name: String,
    type_name: String,
    target: Option<u64>,
}

/// Lays out data, fixups, roots and nodes into one image.
///
/// The data section is written as given: pointer slots must already hold
/// their at-rest values.
pub struct ImageWriter {
    data: Vec<u8>,
    fixups: Vec<Fixup>,
    roots: Vec<RootSpec>,
    nodes: Vec<NodeExtent>,
}

impl ImageWriter {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            fixups: Vec::new(),
            roots: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn fixup(&mut self, fixup: Fixup) -> &mut Self {
        self.fixups.push(fixup);
        self
    }

    pub fn root(&mut self, name: &str, type_name: &str, target: Option<u64>) -> &mut Self {
        self.roots.push(RootSpec {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            target,
        });
        self
    }

    pub fn node(&mut self, extent: NodeExtent) -> &mut Self {
        self.nodes.push(extent);
        self
    }

    /// Build the image bytes.
    ///
    /// Fixups are sorted by slot and nodes by offset; roots keep their order.
    pub fn finish(mut self) -> Result<Vec<u8>, ImageError> {
        let fixup_count = count_u32("fixups", self.fixups.len())?;
        let root_count = count_u32("roots", self.roots.len())?;
        let node_count = count_u32("nodes", self.nodes.len())?;

        self.fixups.sort_by_key(|f| f.slot);
        self.nodes.sort_by_key(|n| n.offset);

        let mut names = Vec::new();
        let mut root_bytes = Vec::with_capacity(self.roots.len() * 24);
        for root in &self.roots {
            let name_off = count_u32("names", names.len())?;
            names.extend_from_slice(root.name.as_bytes());
            let type_off = count_u32("names", names.len())?;
            names.extend_from_slice(root.type_name.as_bytes());

            root_bytes.extend_from_slice(&name_off.to_le_bytes());
            root_bytes.extend_from_slice(&(root.name.len() as u32).to_le_bytes());
            root_bytes.extend_from_slice(&type_off.to_le_bytes());
            root_bytes.extend_from_slice(&(root.type_name.len() as u32).to_le_bytes());
            root_bytes.extend_from_slice(&root.target.unwrap_or(NULL_TARGET).to_le_bytes());
        }
        let names_size = count_u32("names", names.len())?;

        let mut fixup_bytes = Vec::with_capacity(self.fixups.len() * 24);
        for fixup in &self.fixups {
            fixup_bytes.extend_from_slice(&fixup.to_bytes());
        }
        let mut node_bytes = Vec::with_capacity(self.nodes.len() * 16);
        for node in &self.nodes {
            node_bytes.extend_from_slice(&node.to_bytes());
        }

        // Header → Data → Fixups → Roots → Names → Nodes
        let mut output = vec![0u8; HEADER_SIZE];
        emit_section(&mut output, &self.data);
        emit_section(&mut output, &fixup_bytes);
        emit_section(&mut output, &root_bytes);
        emit_section(&mut output, &names);
        emit_section(&mut output, &node_bytes);
        pad_to_section(&mut output);

        let mut header = Header {
            total_size: output.len() as u64,
            data_size: self.data.len() as u64,
            node_count,
            fixup_count,
            root_count,
            names_size,
            ..Default::default()
        };
        header.set_tagged(self.fixups.iter().any(|f| f.tag != 0));
        header.checksum = crc32fast::hash(&output[HEADER_SIZE..]);
        output[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(output)
    }
}

fn count_u32(section: &'static str, count: usize) -> Result<u32, ImageError> {
    u32::try_from(count).map_err(|_| ImageError::TooLarge { section, count })
}

/// Pad a buffer to the section alignment boundary.
fn pad_to_section(buf: &mut Vec<u8>) {
    let rem = buf.len() % SECTION_ALIGN;
    if rem != 0 {
        buf.resize(buf.len() + SECTION_ALIGN - rem, 0);
    }
}

fn emit_section(output: &mut Vec<u8>, data: &[u8]) {
    pad_to_section(output);
    output.extend_from_slice(data);
}
