//! Fixtures for engine tests.

use kflat_core::{TypeId, TypeRegistry};
use kflat_image::Image;

use crate::{FlattenConfig, FlattenContext, FlattenError, SimMemory};

pub fn read_u64(bytes: &[u8], offset: u64) -> u64 {
    let offset = offset as usize;
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

/// `struct item { u64 value; struct item *next; }`
pub fn item_types() -> (TypeRegistry, TypeId) {
    let mut types = TypeRegistry::new();
    let item = types.declare("item", 16, 8).unwrap();
    types.fields(item).raw("value", 0, 8).pointer("next", 8, item);
    (types, item)
}

/// Items holding `values`, each linked to the next. The last one links back
/// to the first when `cyclic`, otherwise it is NULL.
pub fn item_chain(mem: &mut SimMemory, values: &[u64], cyclic: bool) -> Vec<u64> {
    let addrs: Vec<u64> = values.iter().map(|_| mem.alloc(16, 8).unwrap()).collect();
    for (idx, (&addr, &value)) in addrs.iter().zip(values).enumerate() {
        let next = match addrs.get(idx + 1) {
            Some(&next) => next,
            None if cyclic => addrs[0],
            None => 0,
        };
        mem.write_u64(addr, value).unwrap();
        mem.write_u64(addr + 8, next).unwrap();
    }
    addrs
}

/// Run `body` in a fresh context and return the finished image bytes.
pub fn capture(
    mem: &SimMemory,
    types: &TypeRegistry,
    config: FlattenConfig,
    body: impl FnOnce(&mut FlattenContext<'_>) -> Result<(), FlattenError>,
) -> Result<Vec<u8>, FlattenError> {
    let mut flat = FlattenContext::new(mem, types, config)?;
    body(&mut flat)?;
    flat.finish()
}

/// Load and structurally check an image.
pub fn load(bytes: &[u8]) -> Image {
    let image = Image::from_bytes(bytes).unwrap();
    image.check().unwrap();
    image
}

/// `(slot, target)` of every fixup, in slot order.
pub fn fixup_pairs(image: &Image) -> Vec<(u64, Option<u64>)> {
    image.fixups().iter().map(|f| (f.slot, f.target)).collect()
}
