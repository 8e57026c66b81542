//! A 2000-string set kept in a red-black tree.

use kflat_core::{Container, ContainerKind};
use kflat_verify::Inspector;

use super::containers::{balanced_rbtree, check_colours, preorder, target};
use super::{CheckFailure, Fixture, FixtureBuilder, TargetError, expect, root, text};

const STRINGS: usize = 2000;

fn strings() -> Vec<String> {
    (0..STRINGS).map(|idx| format!("string-{idx:04}")).collect()
}

/// `struct string_node { struct rb_node node; char *s; }` in an `rb_root`.
pub(super) fn stringset() -> Result<Fixture, TargetError> {
    let mut b = FixtureBuilder::new("STRINGSET", "2000 strings in a red-black tree");
    let node = b.types.declare("string_node", 32, 8)?;
    let set = b.types.declare("stringset", 8, 8)?;
    b.types.fields(node).raw("node", 0, 24).text("s", 24);
    b.types
        .fields(set)
        .container("root", 0, Container::new(ContainerKind::RbTree, node, 0));

    let root_node = balanced_rbtree(&mut b.mem, &strings(), &mut |mem, at, s: &String| {
        let s = mem.alloc_cstr(s)?;
        mem.write_u64(at + 24, s)
    })?;
    let at = b.mem.alloc(8, 8)?;
    b.mem.write_u64(at, root_node)?;
    b.root("stringset", at, set);
    b.finish(verify_stringset)
}

fn verify_stringset(inspector: &Inspector<'_>) -> Result<(), CheckFailure> {
    let set = root(inspector, "stringset")?;
    let nodes = set.elements("root")?;
    expect("elements", nodes.len(), STRINGS)?;

    let mut expected = Vec::with_capacity(STRINGS);
    preorder(&strings(), &mut expected);
    let mut children = 0;
    for (node, want) in nodes.iter().zip(&expected) {
        expect("string", text(node, "s")?, want.as_str())?;
        for slot in [node.offset() + 8, node.offset() + 16] {
            children += usize::from(target(inspector, slot)?.is_some());
        }
    }
    // Every node but the root is somebody's child; the rest are null links.
    expect("child links", children, STRINGS - 1)?;
    check_colours(inspector, &nodes)?;
    expect("reachable nodes", inspector.reachable(&set), 1 + 2 * STRINGS)
}
