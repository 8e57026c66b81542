//! Entry points into an image: roots and reachability.

use std::collections::VecDeque;

use kflat_core::{TypeId, TypeRegistry};
use kflat_image::Image;

use crate::cursor::Cursor;
use crate::error::InspectError;

/// Read-only view of an image through the descriptors that produced it.
///
/// The image is never relocated; pointers are resolved through its fixup
/// table, so an inspector works on the bytes exactly as they were loaded.
#[derive(Clone, Copy)]
pub struct Inspector<'a> {
    image: &'a Image,
    types: &'a TypeRegistry,
}

impl<'a> Inspector<'a> {
    pub fn new(image: &'a Image, types: &'a TypeRegistry) -> Self {
        Self { image, types }
    }

    pub fn image(&self) -> &'a Image {
        self.image
    }

    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    /// Cursor on the object registered under `name`.
    ///
    /// `Ok(None)` means the root exists but was NULL when captured.
    pub fn root(&self, name: &str) -> Result<Option<Cursor<'a>>, InspectError> {
        let root = self
            .image
            .root(name)
            .ok_or_else(|| InspectError::UnknownRoot(name.to_owned()))?;
        let ty = self.type_id(root.type_name)?;
        root.target.map(|offset| self.at(offset, ty)).transpose()
    }

    /// Cursor on an instance of `ty` at data offset `offset`.
    pub fn at(&self, offset: u64, ty: TypeId) -> Result<Cursor<'a>, InspectError> {
        Cursor::new(self.image, self.types, offset, ty)
    }

    pub fn type_id(&self, name: &str) -> Result<TypeId, InspectError> {
        self.types
            .lookup(name)
            .ok_or_else(|| InspectError::UnknownType(name.to_owned()))
    }

    /// Number of nodes reachable from the node holding `from`, itself included.
    ///
    /// Every fixup whose slot lies inside a visited node is an edge; NULL
    /// targets and targets outside any non-empty node are not.
    pub fn reachable(&self, from: &Cursor<'_>) -> usize {
        let nodes = self.image.nodes();
        let Some((start, _)) = nodes.containing(from.offset()) else {
            return 0;
        };

        let mut seen = vec![false; nodes.len()];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        let mut count = 0;

        while let Some(idx) = queue.pop_front() {
            count += 1;
            let node = nodes.get(idx);
            for target in self.targets_within(node.offset, node.offset + node.size) {
                if let Some((next, _)) = nodes.containing(target)
                    && !seen[next]
                {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        count
    }

    /// Non-NULL targets of the fixups whose slots lie in `[start, end)`.
    fn targets_within(&self, start: u64, end: u64) -> impl Iterator<Item = u64> + 'a {
        let fixups = self.image.fixups();
        let (mut lo, mut hi) = (0, fixups.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if fixups.get(mid).slot < start {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        (lo..fixups.len())
            .map(move |idx| fixups.get(idx))
            .take_while(move |fixup| fixup.slot < end)
            .filter_map(|fixup| fixup.target)
    }
}
