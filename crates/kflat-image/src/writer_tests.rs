use crate::test_utils::chain_image;
use crate::{Fixup, Header, Image, ImageWriter, NodeExtent, SECTION_ALIGN};

#[test]
fn empty_image_is_header_only() {
    let bytes = ImageWriter::new(Vec::new()).finish().unwrap();
    assert_eq!(bytes.len(), 64);

    let image = Image::from_bytes(&bytes).unwrap();
    assert!(image.data().is_empty());
    assert!(image.fixups().is_empty());
    assert!(image.roots().is_empty());
}

#[test]
fn sections_are_aligned() {
    let bytes = chain_image();
    let header = Header::from_bytes(&bytes);
    let offsets = header.compute_offsets();

    for offset in [offsets.fixups, offsets.roots, offsets.names, offsets.nodes] {
        assert_eq!(offset % SECTION_ALIGN as u64, 0);
    }
    assert_eq!(offsets.end, bytes.len() as u64);
}

#[test]
fn fixups_and_nodes_sorted() {
    let mut writer = ImageWriter::new(vec![0; 32]);
    writer
        .node(NodeExtent::new(16, 16))
        .node(NodeExtent::new(0, 16))
        .fixup(Fixup::new(24, Some(0), 0))
        .fixup(Fixup::new(8, Some(16), 0));
    let image = Image::from_bytes(&writer.finish().unwrap()).unwrap();

    let slots: Vec<u64> = image.fixups().iter().map(|f| f.slot).collect();
    assert_eq!(slots, [8, 24]);
    let offsets: Vec<u64> = image.nodes().iter().map(|n| n.offset).collect();
    assert_eq!(offsets, [0, 16]);
    image.check().unwrap();
}

#[test]
fn roots_keep_registration_order() {
    let mut writer = ImageWriter::new(vec![0; 8]);
    writer
        .root("zeta", "a", Some(0))
        .root("alpha", "b", None)
        .root("zeta", "c", Some(8));
    let image = Image::from_bytes(&writer.finish().unwrap()).unwrap();

    let names: Vec<&str> = image.roots().iter().map(|r| r.name).collect();
    assert_eq!(names, ["zeta", "alpha", "zeta"]);
    assert_eq!(image.roots().get(1).target, None);
    assert_eq!(image.roots().get(2).type_name, "c");
    // Lookup by name returns the first registration.
    assert_eq!(image.root("zeta").unwrap().type_name, "a");
}

#[test]
fn identical_input_identical_bytes() {
    assert_eq!(chain_image(), chain_image());
}
