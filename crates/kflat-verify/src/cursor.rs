//! Typed navigation inside an image's data section.

use std::collections::HashSet;

use kflat_core::{
    Container, ContainerKind, Field, FieldKind, PointerTarget, TypeDesc, TypeId, TypeRegistry,
};
use kflat_image::{Fixup, Image};

use crate::error::InspectError;

/// One instance of a described type inside an image.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    image: &'a Image,
    types: &'a TypeRegistry,
    desc: &'a TypeDesc,
    ty: TypeId,
    offset: u64,
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @{:#x}", self.desc.name, self.offset)
    }
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(
        image: &'a Image,
        types: &'a TypeRegistry,
        offset: u64,
        ty: TypeId,
    ) -> Result<Self, InspectError> {
        let desc = types
            .get(ty)
            .ok_or_else(|| InspectError::UnknownType(format!("#{}", ty.get())))?;
        let len = desc.size as u64;
        let in_bounds = offset
            .checked_add(len)
            .is_some_and(|end| end <= image.data().len() as u64);
        if !in_bounds {
            return Err(InspectError::OutOfBounds { offset, len });
        }
        Ok(Self {
            image,
            types,
            desc,
            ty,
            offset,
        })
    }

    /// Data offset of the instance.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn ty(&self) -> TypeId {
        self.ty
    }

    pub fn type_name(&self) -> &'a str {
        &self.desc.name
    }

    /// The whole instance.
    pub fn bytes(&self) -> &'a [u8] {
        self.slice(self.offset, self.desc.size)
    }

    /// Bytes of field `name`, as stored in the image.
    ///
    /// Pointer fields yield their 8-byte slot, which holds the at-rest value
    /// rather than a usable address.
    pub fn field_bytes(&self, name: &str) -> Result<&'a [u8], InspectError> {
        let field = self.field(name)?;
        let len = match field.kind {
            FieldKind::Raw { len } => len,
            FieldKind::Embedded { ty } => self.desc_of(ty)?.size,
            FieldKind::Pointer(_) | FieldKind::TaggedPointer { .. } | FieldKind::Text => 8,
            FieldKind::Container(container) => container.kind.head_size(),
        };
        Ok(self.slice(self.offset + field.offset as u64, len))
    }

    pub fn u64(&self, name: &str) -> Result<u64, InspectError> {
        self.number::<8>(name).map(u64::from_le_bytes)
    }

    pub fn u32(&self, name: &str) -> Result<u32, InspectError> {
        self.number::<4>(name).map(u32::from_le_bytes)
    }

    pub fn i32(&self, name: &str) -> Result<i32, InspectError> {
        self.number::<4>(name).map(i32::from_le_bytes)
    }

    /// The fixup recorded for pointer field `name`, tag included.
    pub fn pointer(&self, name: &str) -> Result<Fixup, InspectError> {
        let field = self.field(name)?;
        if !field.kind.is_pointer() {
            return Err(wrong_kind(field, "a pointer"));
        }
        self.fixup(self.offset + field.offset as u64)
    }

    /// Follow pointer field `name` to the first instance it refers to.
    pub fn deref(&self, name: &str) -> Result<Option<Cursor<'a>>, InspectError> {
        self.deref_at(name, 0)
    }

    /// Follow pointer field `name` to element `index` of the array it refers to.
    ///
    /// The element must lie inside the node the pointer targets.
    pub fn deref_at(&self, name: &str, index: usize) -> Result<Option<Cursor<'a>>, InspectError> {
        let field = self.field(name)?;
        let target = match field.kind {
            FieldKind::Pointer(target) | FieldKind::TaggedPointer { target, .. } => target,
            _ => return Err(wrong_kind(field, "a pointer")),
        };
        let fixup = self.fixup(self.offset + field.offset as u64)?;
        let Some(address) = fixup.target else {
            return Ok(None);
        };
        self.element_at(address, target, index).map(Some)
    }

    /// The text pointed at by field `name`.
    pub fn text(&self, name: &str) -> Result<Option<&'a str>, InspectError> {
        let field = self.field(name)?;
        if !matches!(field.kind, FieldKind::Text) {
            return Err(wrong_kind(field, "text"));
        }
        let fixup = self.fixup(self.offset + field.offset as u64)?;
        let Some(offset) = fixup.target else {
            return Ok(None);
        };
        let data = self.image.data();
        let rest = data
            .get(offset as usize..)
            .ok_or(InspectError::BadText { offset })?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(InspectError::BadText { offset })?;
        std::str::from_utf8(&rest[..end])
            .map(Some)
            .map_err(|_| InspectError::BadText { offset })
    }

    /// The structure embedded at field `name`.
    pub fn embedded(&self, name: &str) -> Result<Cursor<'a>, InspectError> {
        let field = self.field(name)?;
        let FieldKind::Embedded { ty } = field.kind else {
            return Err(wrong_kind(field, "embedded"));
        };
        Cursor::new(self.image, self.types, self.offset + field.offset as u64, ty)
    }

    /// Elements of container field `name`, in walk order: lists from the
    /// head forward, red-black trees in pre-order with left before right.
    pub fn elements(&self, name: &str) -> Result<Vec<Cursor<'a>>, InspectError> {
        let field = self.field(name)?;
        let FieldKind::Container(container) = field.kind else {
            return Err(wrong_kind(field, "a container"));
        };
        let head = self.offset + field.offset as u64;
        let links = match container.kind {
            ContainerKind::List => self.list_links(head)?,
            ContainerKind::HList | ContainerKind::SList => self.chain_links(head)?,
            ContainerKind::RbTree => self.tree_links(head)?,
        };
        links
            .into_iter()
            .map(|link| self.element_of(head, link, container))
            .collect()
    }

    /// Number of elements in container field `name`.
    pub fn count(&self, name: &str) -> Result<usize, InspectError> {
        self.elements(name).map(|elements| elements.len())
    }

    fn field(&self, name: &str) -> Result<&'a Field, InspectError> {
        self.desc.field(name).ok_or_else(|| InspectError::NoField {
            ty: self.desc.name.clone(),
            field: name.to_owned(),
        })
    }

    fn desc_of(&self, ty: TypeId) -> Result<&'a TypeDesc, InspectError> {
        self.types
            .get(ty)
            .ok_or_else(|| InspectError::UnknownType(format!("#{}", ty.get())))
    }

    fn number<const N: usize>(&self, name: &str) -> Result<[u8; N], InspectError> {
        let bytes = self.field_bytes(name)?;
        bytes
            .get(..N)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| InspectError::WrongSize {
                field: name.to_owned(),
                size: bytes.len(),
                wanted: N,
            })
    }

    fn fixup(&self, slot: u64) -> Result<Fixup, InspectError> {
        self.image
            .fixup_at(slot)
            .ok_or(InspectError::MissingFixup { slot })
    }

    fn target(&self, slot: u64) -> Result<Option<u64>, InspectError> {
        self.fixup(slot).map(|fixup| fixup.target)
    }

    fn element_at(
        &self,
        address: u64,
        target: PointerTarget,
        index: usize,
    ) -> Result<Cursor<'a>, InspectError> {
        let size = self.desc_of(target.ty)?.size as u64;
        let base = address
            .checked_add_signed(target.shift)
            .ok_or(InspectError::OutOfBounds {
                offset: address,
                len: size,
            })?;
        let start = base + index as u64 * size;
        // The array is the node the pointer lands in; elements past its end
        // belong to whatever was emitted next.
        let fits = self
            .image
            .nodes()
            .containing(base)
            .is_some_and(|(_, node)| start + size <= node.offset + node.size);
        if !fits {
            return Err(InspectError::OutOfBounds {
                offset: start,
                len: size,
            });
        }
        Cursor::new(self.image, self.types, start, target.ty)
    }

    fn element_of(
        &self,
        head: u64,
        link: u64,
        container: Container,
    ) -> Result<Cursor<'a>, InspectError> {
        let start = link
            .checked_sub(container.link as u64)
            .ok_or(InspectError::CorruptContainer {
                offset: head,
                reason: "link before the start of the data",
            })?;
        Cursor::new(self.image, self.types, start, container.element)
    }

    /// Circular list: follow `next` until it returns to the head.
    fn list_links(&self, head: u64) -> Result<Vec<u64>, InspectError> {
        let mut guard = Guard::new(self.image, head);
        let mut links = Vec::new();
        let mut next = self.target(head)?;
        loop {
            match next {
                None => return Err(guard.corrupt("null next link")),
                Some(link) if link == head => return Ok(links),
                Some(link) => {
                    guard.visit(link)?;
                    links.push(link);
                    next = self.target(link)?;
                }
            }
        }
    }

    /// NULL-terminated chain of `next` links.
    fn chain_links(&self, head: u64) -> Result<Vec<u64>, InspectError> {
        let mut guard = Guard::new(self.image, head);
        let mut links = Vec::new();
        let mut next = self.target(head)?;
        while let Some(link) = next {
            guard.visit(link)?;
            links.push(link);
            next = self.target(link)?;
        }
        Ok(links)
    }

    /// Pre-order, left subtree first.
    fn tree_links(&self, head: u64) -> Result<Vec<u64>, InspectError> {
        let mut guard = Guard::new(self.image, head);
        let mut links = Vec::new();
        let mut stack: Vec<u64> = self.target(head)?.into_iter().collect();
        while let Some(link) = stack.pop() {
            guard.visit(link)?;
            links.push(link);
            if let Some(right) = self.target(link + 8)? {
                stack.push(right);
            }
            if let Some(left) = self.target(link + 16)? {
                stack.push(left);
            }
        }
        Ok(links)
    }

    fn slice(&self, offset: u64, len: usize) -> &'a [u8] {
        // Bounds were checked when the cursor was made.
        let start = offset as usize;
        &self.image.data()[start..start + len]
    }
}

/// Cycle guard for container walks. A walk can visit at most one element
/// per fixup, so that is also its length bound.
struct Guard {
    head: u64,
    seen: HashSet<u64>,
    limit: usize,
}

impl Guard {
    fn new(image: &Image, head: u64) -> Self {
        Self {
            head,
            seen: HashSet::new(),
            limit: image.fixups().len(),
        }
    }

    fn visit(&mut self, link: u64) -> Result<(), InspectError> {
        if self.seen.len() >= self.limit || !self.seen.insert(link) {
            return Err(self.corrupt("element reached twice"));
        }
        Ok(())
    }

    fn corrupt(&self, reason: &'static str) -> InspectError {
        InspectError::CorruptContainer {
            offset: self.head,
            reason,
        }
    }
}

fn wrong_kind(field: &Field, expected: &'static str) -> InspectError {
    InspectError::WrongKind {
        field: field.name.clone(),
        expected,
        found: field.kind.kind_name(),
    }
}
