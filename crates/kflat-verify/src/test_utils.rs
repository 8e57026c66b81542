//! Images produced by the engine for inspection tests.

use kflat_core::{Container, ContainerKind, PointerTarget, TypeId, TypeRegistry};
use kflat_engine::{FlattenConfig, FlattenContext, SimMemory};
use kflat_image::Image;

/// `person { u64 id; char *name; person *friend; u32 age; i32 delta;
/// u32 *scores; u32 nscores; }`, 48 bytes.
pub fn person_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    let person = types.declare("person", 48, 8).unwrap();
    let score = types.plain("u32", 4).unwrap();
    types
        .fields(person)
        .raw("id", 0, 8)
        .text("name", 8)
        .pointer("friend", 16, person)
        .raw("age", 24, 4)
        .raw("delta", 28, 4)
        .pointer_to("scores", 32, PointerTarget::counted(score, 40, 4))
        .raw("nscores", 40, 4);
    types
}

pub struct PersonSpec<'a> {
    pub id: u64,
    pub name: Option<&'a str>,
    pub age: u32,
    pub delta: i32,
    pub scores: &'a [u32],
}

pub fn alloc_person(mem: &mut SimMemory, spec: &PersonSpec<'_>) -> u64 {
    let at = mem.alloc(48, 8).unwrap();
    let name = match spec.name {
        Some(name) => mem.alloc_cstr(name).unwrap(),
        None => 0,
    };
    let scores = mem.alloc(4 * spec.scores.len(), 4).unwrap();
    for (idx, &score) in spec.scores.iter().enumerate() {
        mem.write_u32(scores + 4 * idx as u64, score).unwrap();
    }
    mem.write_u64(at, spec.id).unwrap();
    mem.write_u64(at + 8, name).unwrap();
    mem.write_u32(at + 24, spec.age).unwrap();
    mem.write_u32(at + 28, spec.delta as u32).unwrap();
    mem.write_u64(at + 32, scores).unwrap();
    mem.write_u32(at + 40, spec.scores.len() as u32).unwrap();
    at
}

pub fn befriend(mem: &mut SimMemory, person: u64, friend: u64) {
    mem.write_u64(person + 16, friend).unwrap();
}

/// Flatten each `(root, address, type)` and load the result.
pub fn flatten(mem: &SimMemory, types: &TypeRegistry, roots: &[(&str, u64, &str)]) -> Image {
    let mut flat = FlattenContext::new(mem, types, FlattenConfig::default()).unwrap();
    for &(name, address, ty) in roots {
        let ty = types.lookup(ty).unwrap();
        flat.flatten_root(name, address, ty).unwrap();
    }
    let bytes = flat.finish().unwrap();
    let image = Image::from_bytes(&bytes).unwrap();
    image.check().unwrap();
    image
}

/// `elem { u64 value; <link> }` owned by `owner { u64 id; <head> }`.
pub fn container_types(kind: ContainerKind) -> TypeRegistry {
    let mut types = TypeRegistry::new();
    let link = kind.link_size();
    let elem = types.declare("elem", 8 + link, 8).unwrap();
    let owner = types.declare("owner", 8 + kind.head_size(), 8).unwrap();
    types.fields(elem).raw("value", 0, 8).raw("link", 8, link);
    types
        .fields(owner)
        .raw("id", 0, 8)
        .container("items", 8, Container::new(kind, elem, 8));
    types
}

/// Owner with a circular list of elements holding `values`.
pub fn list_owner(mem: &mut SimMemory, values: &[u64]) -> u64 {
    let owner = mem.alloc(24, 8).unwrap();
    let mut ring = vec![owner + 8];
    for &value in values {
        let elem = mem.alloc(24, 8).unwrap();
        mem.write_u64(elem, value).unwrap();
        ring.push(elem + 8);
    }
    for (idx, &at) in ring.iter().enumerate() {
        mem.write_u64(at, ring[(idx + 1) % ring.len()]).unwrap();
        mem.write_u64(at + 8, ring[(idx + ring.len() - 1) % ring.len()])
            .unwrap();
    }
    owner
}

/// Owner with a NULL-terminated singly linked list of `values`.
pub fn slist_owner(mem: &mut SimMemory, values: &[u64]) -> u64 {
    let owner = mem.alloc(16, 8).unwrap();
    let mut prev = owner + 8;
    for &value in values {
        let elem = mem.alloc(16, 8).unwrap();
        mem.write_u64(elem, value).unwrap();
        mem.write_u64(prev, elem + 8).unwrap();
        prev = elem + 8;
    }
    owner
}

/// `snode { rb_node rb; char *name; }` under `tree { rb_root root; }`.
pub fn rb_types() -> (TypeRegistry, TypeId) {
    let mut types = TypeRegistry::new();
    let snode = types.declare("snode", 32, 8).unwrap();
    let tree = types.declare("tree", 8, 8).unwrap();
    types.fields(snode).raw("rb", 0, 24).text("name", 24);
    types
        .fields(tree)
        .container("root", 0, Container::new(ContainerKind::RbTree, snode, 0));
    (types, tree)
}

/// Tree owner over a balanced, all-black tree of sorted `names`.
pub fn rb_tree(mem: &mut SimMemory, names: &[String]) -> u64 {
    fn place(mem: &mut SimMemory, names: &[String], parent: u64) -> u64 {
        if names.is_empty() {
            return 0;
        }
        let mid = names.len() / 2;
        let node = mem.alloc(32, 8).unwrap();
        let name = mem.alloc_cstr(&names[mid]).unwrap();
        let left = place(mem, &names[..mid], node);
        let right = place(mem, &names[mid + 1..], node);
        mem.write_u64(node, parent | 1).unwrap();
        mem.write_u64(node + 8, right).unwrap();
        mem.write_u64(node + 16, left).unwrap();
        mem.write_u64(node + 24, name).unwrap();
        node
    }
    let root = place(mem, names, 0);
    let tree = mem.alloc(8, 8).unwrap();
    mem.write_u64(tree, root).unwrap();
    tree
}
