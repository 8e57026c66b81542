use kflat_core::{Container, ContainerKind, PointerCodec, TypeId, TypeRegistry};

use crate::test_utils::{capture, fixup_pairs, load, read_u64};
use crate::{FlattenConfig, FlattenError, SimMemory, SourceMemory};

/// `elem { u64 value; <link> }` with the link at 8, owned by
/// `owner { u64 id; <head> }` with the head at 8.
fn container_types(kind: ContainerKind) -> (TypeRegistry, TypeId) {
    let mut types = TypeRegistry::new();
    let link = kind.link_size();
    let elem = types.declare("elem", 8 + link, 8).unwrap();
    let owner = types.declare("owner", 8 + kind.head_size(), 8).unwrap();
    types.fields(elem).raw("value", 0, 8).raw("link", 8, link);
    types
        .fields(owner)
        .raw("id", 0, 8)
        .container("items", 8, Container::new(kind, elem, 8));
    (types, owner)
}

/// Owner plus elements of `size` bytes holding `values`; returns the owner
/// address and the link address of every element.
fn alloc_elements(mem: &mut SimMemory, owner_size: usize, size: usize, values: &[u64]) -> (u64, Vec<u64>) {
    let owner = mem.alloc(owner_size, 8).unwrap();
    let links = values
        .iter()
        .map(|&value| {
            let elem = mem.alloc(size, 8).unwrap();
            mem.write_u64(elem, value).unwrap();
            elem + 8
        })
        .collect();
    (owner, links)
}

fn list_fixture(mem: &mut SimMemory, values: &[u64]) -> (u64, Vec<u64>) {
    let (owner, links) = alloc_elements(mem, 24, 24, values);
    let head = owner + 8;
    let mut ring = vec![head];
    ring.extend(&links);
    for (idx, &at) in ring.iter().enumerate() {
        let next = ring[(idx + 1) % ring.len()];
        let prev = ring[(idx + ring.len() - 1) % ring.len()];
        mem.write_u64(at, next).unwrap();
        mem.write_u64(at + 8, prev).unwrap();
    }
    (owner, links)
}

#[test]
fn list_links_follow_walk() {
    let (types, owner_ty) = container_types(ContainerKind::List);
    let mut mem = SimMemory::new();
    let (owner, _) = list_fixture(&mut mem, &[1, 2, 3]);

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    assert_eq!(image.nodes().len(), 4);
    assert_eq!(read_u64(image.data(), 48), 2);
    assert_eq!(
        fixup_pairs(&image),
        [
            (8, Some(32)),
            (16, Some(80)),
            (32, Some(56)),
            (40, Some(8)),
            (56, Some(80)),
            (64, Some(32)),
            (80, Some(8)),
            (88, Some(56)),
        ]
    );
}

#[test]
fn empty_list_points_at_head() {
    let (types, owner_ty) = container_types(ContainerKind::List);
    let mut mem = SimMemory::new();
    let (owner, _) = list_fixture(&mut mem, &[]);

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    assert_eq!(image.nodes().len(), 1);
    assert_eq!(fixup_pairs(&image), [(8, Some(8)), (16, Some(8))]);
}

#[test]
fn list_with_broken_back_link() {
    let (types, owner_ty) = container_types(ContainerKind::List);
    let mut mem = SimMemory::new();
    let (owner, links) = list_fixture(&mut mem, &[1, 2, 3]);
    mem.write_u64(links[1] + 8, owner + 8).unwrap();

    let err = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap_err();

    assert!(matches!(
        err,
        FlattenError::CorruptContainer {
            kind: "list",
            reason: "prev link does not match",
            ..
        }
    ));
}

#[test]
fn list_link_at_end_of_address_space() {
    let (types, owner_ty) = container_types(ContainerKind::List);
    let mut mem = SimMemory::new();
    let (owner, links) = list_fixture(&mut mem, &[1, 2]);
    mem.write_u64(links[0], u64::MAX - 3).unwrap();

    let err = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap_err();

    assert!(matches!(
        err,
        FlattenError::InvalidRead {
            address: 0xffff_ffff_ffff_fffc,
            len: 16
        }
    ));
}

#[test]
fn rbtree_child_at_end_of_address_space() {
    let (types, tree_ty) = rb_types();
    let mut mem = SimMemory::new();
    let names: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
    let root = build_tree(&mut mem, &names);
    mem.write_u64(root + 8, u64::MAX - 3).unwrap();
    let tree = mem.alloc(8, 8).unwrap();
    mem.write_u64(tree, root).unwrap();

    let err = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("tree", tree, tree_ty).map(drop)
    })
    .unwrap_err();

    assert!(matches!(err, FlattenError::InvalidRead { .. }));
}

#[test]
fn hlist_pprev_points_at_previous_next() {
    let (types, owner_ty) = container_types(ContainerKind::HList);
    let mut mem = SimMemory::new();
    let (owner, links) = alloc_elements(&mut mem, 16, 24, &[1, 2]);
    let head = owner + 8;
    mem.write_u64(head, links[0]).unwrap();
    mem.write_u64(links[0], links[1]).unwrap();
    mem.write_u64(links[0] + 8, head).unwrap();
    mem.write_u64(links[1] + 8, links[0]).unwrap();

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    assert_eq!(
        fixup_pairs(&image),
        [
            (8, Some(24)),
            (24, Some(48)),
            (32, Some(8)),
            (48, None),
            (56, Some(24)),
        ]
    );
}

fn slist_fixture(mem: &mut SimMemory, values: &[u64]) -> (u64, Vec<u64>) {
    let (owner, links) = alloc_elements(mem, 16, 16, values);
    let mut prev = owner + 8;
    for &link in &links {
        mem.write_u64(prev, link).unwrap();
        prev = link;
    }
    (owner, links)
}

#[test]
fn slist_null_terminated() {
    let (types, owner_ty) = container_types(ContainerKind::SList);
    let mut mem = SimMemory::new();
    let (owner, _) = slist_fixture(&mut mem, &[1, 2, 3]);

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    assert_eq!(
        fixup_pairs(&image),
        [(8, Some(24)), (24, Some(40)), (40, Some(56)), (56, None)]
    );
}

#[test]
fn slist_cycle_detected() {
    let (types, owner_ty) = container_types(ContainerKind::SList);
    let mut mem = SimMemory::new();
    let (owner, links) = slist_fixture(&mut mem, &[1, 2, 3]);
    mem.write_u64(links[2], links[0]).unwrap();

    let err = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap_err();

    let FlattenError::CorruptContainer { address, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*address, owner + 8);
    assert!(err.to_string().ends_with(": element reached twice"));
}

#[test]
fn container_length_limited() {
    let (types, owner_ty) = container_types(ContainerKind::SList);
    let mut mem = SimMemory::new();
    let (owner, _) = slist_fixture(&mut mem, &[1, 2, 3]);

    let config = FlattenConfig::default().max_container_len(2);
    let err = capture(&mem, &types, config, |flat| {
        flat.flatten_root("owner", owner, owner_ty).map(drop)
    })
    .unwrap_err();

    assert!(matches!(
        err,
        FlattenError::CorruptContainer {
            reason: "more elements than the container limit",
            ..
        }
    ));
}

#[test]
fn element_shared_with_plain_pointer() {
    let mut types = TypeRegistry::new();
    let elem = types.declare("elem", 16, 8).unwrap();
    let owner = types.declare("owner", 16, 8).unwrap();
    types.fields(elem).raw("value", 0, 8).raw("link", 8, 8);
    types
        .fields(owner)
        .container("items", 0, Container::new(ContainerKind::SList, elem, 8))
        .pointer("favourite", 8, elem);

    let mut mem = SimMemory::new();
    let (o, links) = alloc_elements(&mut mem, 16, 16, &[1, 2]);
    mem.write_u64(o, links[0]).unwrap();
    mem.write_u64(links[0], links[1]).unwrap();
    mem.write_u64(o + 8, links[1] - 8).unwrap();

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("owner", o, owner).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    assert_eq!(image.nodes().len(), 3);
    assert_eq!(
        fixup_pairs(&image),
        [(0, Some(24)), (8, Some(32)), (24, Some(40)), (40, None)]
    );
}

/// `snode { rb_node rb; char *name; }` under `tree { rb_root root; }`.
fn rb_types() -> (TypeRegistry, TypeId) {
    let mut types = TypeRegistry::new();
    let snode = types.declare("snode", 32, 8).unwrap();
    let tree = types.declare("tree", 8, 8).unwrap();
    types.fields(snode).raw("rb", 0, 24).text("name", 24);
    types
        .fields(tree)
        .container("root", 0, Container::new(ContainerKind::RbTree, snode, 0));
    (types, tree)
}

const RB_RED: u64 = 0;
const RB_BLACK: u64 = 1;

/// Balanced tree over sorted `names`; the deepest level is red.
fn build_tree(mem: &mut SimMemory, names: &[String]) -> u64 {
    fn place(mem: &mut SimMemory, names: &[String], parent: u64, depth: u32, red_depth: u32) -> u64 {
        if names.is_empty() {
            return 0;
        }
        let mid = names.len() / 2;
        let node = mem.alloc(32, 8).unwrap();
        let name = mem.alloc_cstr(&names[mid]).unwrap();
        let colour = if depth == red_depth { RB_RED } else { RB_BLACK };
        let left = place(mem, &names[..mid], node, depth + 1, red_depth);
        let right = place(mem, &names[mid + 1..], node, depth + 1, red_depth);
        mem.write_u64(node, parent | colour).unwrap();
        mem.write_u64(node + 8, right).unwrap();
        mem.write_u64(node + 16, left).unwrap();
        mem.write_u64(node + 24, name).unwrap();
        node
    }
    let red_depth = names.len().max(1).ilog2();
    place(mem, names, 0, 0, red_depth)
}

#[test]
fn rbtree_preorder_left_first() {
    let (types, tree_ty) = rb_types();
    let mut mem = SimMemory::new();
    let names: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
    let root = build_tree(&mut mem, &names);
    let tree = mem.alloc(8, 8).unwrap();
    mem.write_u64(tree, root).unwrap();

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("tree", tree, tree_ty).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    // tree, b, a, c, then the three names in the same order.
    assert_eq!(image.nodes().len(), 7);
    assert_eq!(&image.data()[104..110], b"b\0a\0c\0");
    assert_eq!(image.fixups().len(), 13);

    let b_parent = image.fixup_at(8).unwrap();
    assert_eq!((b_parent.target, b_parent.tag), (None, RB_BLACK));
    let b_right = image.fixup_at(16).unwrap();
    assert_eq!(b_right.target, Some(72));
    let b_left = image.fixup_at(24).unwrap();
    assert_eq!(b_left.target, Some(40));
    let a_parent = image.fixup_at(40).unwrap();
    assert_eq!((a_parent.target, a_parent.tag), (Some(8), RB_RED));
    assert_eq!(image.fixup_at(48).unwrap().target, None);
    assert_eq!(image.fixup_at(96).unwrap().target, Some(108));

    // Colour survives relocation.
    let data = image.relocate(0x4000).unwrap();
    let codec = PointerCodec::low_bits::<3>();
    assert_eq!(codec.strip(read_u64(&data, 8)), (0, RB_BLACK));
    assert_eq!(codec.strip(read_u64(&data, 40)), (0x4008, RB_RED));
}

#[test]
fn rbtree_stringset_2000() {
    let (types, tree_ty) = rb_types();
    let mut mem = SimMemory::new();
    let names: Vec<String> = (0..2000).map(|i| format!("string-{i:04}")).collect();
    let root = build_tree(&mut mem, &names);
    let tree = mem.alloc(8, 8).unwrap();
    mem.write_u64(tree, root).unwrap();

    let bytes = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("tree", tree, tree_ty).map(drop)
    })
    .unwrap();

    let image = load(&bytes);
    let elements: Vec<u64> = image
        .nodes()
        .iter()
        .filter(|n| n.size == 32)
        .map(|n| n.offset)
        .collect();
    assert_eq!(elements.len(), 2000);
    assert_eq!(image.nodes().len(), 1 + 2000 + 2000);

    let mut children = 0;
    let mut null_children = 0;
    for &offset in &elements {
        assert!(image.fixup_at(offset + 24).unwrap().target.is_some());
        for slot in [offset + 8, offset + 16] {
            match image.fixup_at(slot).unwrap().target {
                Some(_) => children += 1,
                None => null_children += 1,
            }
        }
    }
    assert_eq!(children, 1999);
    assert_eq!(null_children, 2001);
    assert_eq!(image.fixups().len(), 1 + 4 * 2000);
}

#[test]
fn rbtree_parent_mismatch() {
    let (types, tree_ty) = rb_types();
    let mut mem = SimMemory::new();
    let names: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
    let root = build_tree(&mut mem, &names);
    let left = mem.read_u64(root + 16).unwrap();
    mem.write_u64(left, RB_RED).unwrap();
    let tree = mem.alloc(8, 8).unwrap();
    mem.write_u64(tree, root).unwrap();

    let err = capture(&mem, &types, FlattenConfig::default(), |flat| {
        flat.flatten_root("tree", tree, tree_ty).map(drop)
    })
    .unwrap_err();

    assert!(matches!(
        err,
        FlattenError::CorruptContainer {
            kind: "rbtree",
            reason: "parent link does not match",
            ..
        }
    ));
}
