use crate::pointer::PointerRef;

/// Named entry point into the flattened graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootEntry {
    pub name: String,
    /// Descriptor name of the object `ptr` refers to.
    pub type_name: String,
    pub ptr: PointerRef,
}

/// Roots in registration order. Names need not be unique.
#[derive(Debug, Default)]
pub struct RootRegistry {
    entries: Vec<RootEntry>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, type_name: &str, ptr: PointerRef) {
        self.entries.push(RootEntry {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            ptr,
        });
    }

    /// First root registered under `name`.
    pub fn get(&self, name: &str) -> Option<&RootEntry> {
        self.entries.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootEntry> {
        self.entries.iter()
    }
}
