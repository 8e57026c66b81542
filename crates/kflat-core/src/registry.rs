//! Data-driven type descriptors.
//!
//! A [`TypeRegistry`] holds one [`TypeDesc`] per structure type. Types are
//! declared first (name, size, alignment) so recursive structures can point
//! at themselves, then given their field list through [`FieldsBuilder`].

use indexmap::IndexMap;

use crate::codec::PointerCodec;
use crate::container::Container;
use crate::error::DescriptorError;
use crate::POINTER_SIZE;

/// Index of a type in its [`TypeRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// How many consecutive instances a pointer refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Count {
    One,
    Fixed(usize),
    /// Read from a sibling field of the pointing instance (little-endian, unsigned).
    Field { offset: usize, width: usize },
}

impl Count {
    /// Element count for one instance's bytes.
    pub fn resolve(&self, instance: &[u8]) -> usize {
        match *self {
            Self::One => 1,
            Self::Fixed(n) => n,
            Self::Field { offset, width } => {
                let width = width.min(8);
                let mut raw = [0u8; 8];
                let Some(bytes) = instance.get(offset..offset + width) else {
                    return 0;
                };
                raw[..width].copy_from_slice(bytes);
                u64::from_le_bytes(raw) as usize
            }
        }
    }
}

/// What a pointer field points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerTarget {
    pub ty: TypeId,
    pub count: Count,
    /// Added to the pointer value to find the start of the pointee region.
    /// Negative for pointers into the middle of a structure.
    pub shift: i64,
}

impl PointerTarget {
    pub fn one(ty: TypeId) -> Self {
        Self {
            ty,
            count: Count::One,
            shift: 0,
        }
    }

    pub fn array(ty: TypeId, len: usize) -> Self {
        Self {
            ty,
            count: Count::Fixed(len),
            shift: 0,
        }
    }

    /// Array whose length lives in the field at `offset` of the pointing instance.
    pub fn counted(ty: TypeId, offset: usize, width: usize) -> Self {
        Self {
            ty,
            count: Count::Field { offset, width },
            shift: 0,
        }
    }

    /// Pointer to the member at `member_offset` of the target type.
    pub fn into_member(mut self, member_offset: usize) -> Self {
        self.shift = -(member_offset as i64);
        self
    }
}

/// Flattening action for one field.
#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    /// Plain bytes, copied verbatim with the instance.
    Raw { len: usize },
    /// Nested structure flattened as part of the same node.
    Embedded { ty: TypeId },
    /// Pointer followed and relocated.
    Pointer(PointerTarget),
    /// Pointer with flags in some of its bits.
    TaggedPointer {
        target: PointerTarget,
        codec: PointerCodec,
    },
    /// Pointer to NUL-terminated text.
    Text,
    /// Head of an intrusive container.
    Container(Container),
}

impl FieldKind {
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Self::Pointer(_) | Self::TaggedPointer { .. } | Self::Text
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Raw { .. } => "raw",
            Self::Embedded { .. } => "embedded",
            Self::Pointer(_) => "pointer",
            Self::TaggedPointer { .. } => "tagged pointer",
            Self::Text => "text",
            Self::Container(_) => "container",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub offset: usize,
    pub kind: FieldKind,
}

/// Descriptor of one structure type.
#[derive(Clone, Debug)]
pub struct TypeDesc {
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<Field>,
    defined: bool,
}

impl TypeDesc {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True once the field list has been supplied.
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// True for leaf types with no pointers to follow.
    pub fn is_plain(&self) -> bool {
        self.fields
            .iter()
            .all(|f| matches!(f.kind, FieldKind::Raw { .. }))
    }
}

/// Registry of type descriptors, indexed by [`TypeId`] in declaration order.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDesc>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a structure type. Fields are added later with [`fields`](Self::fields).
    pub fn declare(
        &mut self,
        name: &str,
        size: usize,
        align: usize,
    ) -> Result<TypeId, DescriptorError> {
        if self.types.contains_key(name) {
            return Err(DescriptorError::DuplicateType(name.to_owned()));
        }
        if align == 0 || !align.is_power_of_two() {
            return Err(DescriptorError::BadAlignment {
                ty: name.to_owned(),
                align,
            });
        }

        let id = TypeId(self.types.len() as u32);
        self.types.insert(
            name.to_owned(),
            TypeDesc {
                name: name.to_owned(),
                size,
                align,
                fields: Vec::new(),
                defined: false,
            },
        );
        Ok(id)
    }

    /// Declare a leaf type of plain data (`u32`, `char[16]`, ...).
    ///
    /// Alignment is the largest power of two dividing `size`, capped at 8.
    pub fn plain(&mut self, name: &str, size: usize) -> Result<TypeId, DescriptorError> {
        let align = match size {
            0 => 1,
            n => 1 << n.trailing_zeros().min(3),
        };
        let id = self.declare(name, size, align)?;
        self.types[id.index()].defined = true;
        Ok(id)
    }

    /// Start (or continue) the field list of a declared type.
    ///
    /// # Panics
    /// Panics if `id` was not handed out by this registry.
    pub fn fields(&mut self, id: TypeId) -> FieldsBuilder<'_> {
        let desc = &mut self.types[id.index()];
        desc.defined = true;
        FieldsBuilder { desc }
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDesc> {
        self.types.get_index(id.index()).map(|(_, desc)| desc)
    }

    /// Like [`get`](Self::get), but an error for unknown ids.
    pub fn desc(&self, id: TypeId) -> Result<&TypeDesc, DescriptorError> {
        self.get(id).ok_or(DescriptorError::UnknownType(id.0))
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.types.get_index_of(name).map(|i| TypeId(i as u32))
    }

    /// Type name, or `"?"` for foreign ids.
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).map_or("?", |d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDesc)> {
        self.types
            .values()
            .enumerate()
            .map(|(i, d)| (TypeId(i as u32), d))
    }

    /// Check every descriptor is usable for flattening.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        for (_, desc) in self.iter() {
            self.validate_fields(desc)?;
        }
        for (id, _) in self.iter() {
            self.check_embedding(id, &mut Vec::new())?;
        }
        Ok(())
    }

    fn validate_fields(&self, desc: &TypeDesc) -> Result<(), DescriptorError> {
        for field in &desc.fields {
            let extent = match field.kind {
                FieldKind::Raw { len } => len,
                FieldKind::Embedded { ty } => self.defined(ty)?.size,
                FieldKind::Pointer(target) | FieldKind::TaggedPointer { target, .. } => {
                    self.defined(target.ty)?;
                    if let Count::Field { offset, width } = target.count {
                        if !matches!(width, 1 | 2 | 4 | 8) {
                            return Err(DescriptorError::BadCountWidth {
                                ty: desc.name.clone(),
                                width,
                            });
                        }
                        check_extent(desc, &field.name, offset, width)?;
                    }
                    POINTER_SIZE
                }
                FieldKind::Text => POINTER_SIZE,
                FieldKind::Container(c) => {
                    let element = self.defined(c.element)?;
                    let link_end = c.link + c.kind.link_size();
                    if link_end > element.size {
                        return Err(DescriptorError::FieldOverflow {
                            ty: element.name.clone(),
                            field: format!("{} link", c.kind.name()),
                            end: link_end,
                            size: element.size,
                        });
                    }
                    if c.link % POINTER_SIZE != 0 {
                        return Err(DescriptorError::MisalignedPointer {
                            ty: element.name.clone(),
                            field: format!("{} link", c.kind.name()),
                            offset: c.link,
                        });
                    }
                    c.kind.head_size()
                }
            };

            let needs_alignment =
                field.kind.is_pointer() || matches!(field.kind, FieldKind::Container(_));
            if needs_alignment && field.offset % POINTER_SIZE != 0 {
                return Err(DescriptorError::MisalignedPointer {
                    ty: desc.name.clone(),
                    field: field.name.clone(),
                    offset: field.offset,
                });
            }
            check_extent(desc, &field.name, field.offset, extent)?;
        }
        Ok(())
    }

    fn defined(&self, id: TypeId) -> Result<&TypeDesc, DescriptorError> {
        let desc = self.desc(id)?;
        if !desc.defined {
            return Err(DescriptorError::Undefined(desc.name.clone()));
        }
        Ok(desc)
    }

    fn check_embedding(&self, id: TypeId, path: &mut Vec<TypeId>) -> Result<(), DescriptorError> {
        if path.contains(&id) {
            return Err(DescriptorError::EmbeddingCycle(self.name(id).to_owned()));
        }
        path.push(id);
        for field in &self.desc(id)?.fields {
            if let FieldKind::Embedded { ty } = field.kind {
                self.check_embedding(ty, path)?;
            }
        }
        path.pop();
        Ok(())
    }
}

fn check_extent(
    desc: &TypeDesc,
    field: &str,
    offset: usize,
    len: usize,
) -> Result<(), DescriptorError> {
    let end = offset + len;
    if end > desc.size {
        return Err(DescriptorError::FieldOverflow {
            ty: desc.name.clone(),
            field: field.to_owned(),
            end,
            size: desc.size,
        });
    }
    Ok(())
}

/// Appends field actions to one type descriptor.
pub struct FieldsBuilder<'a> {
    desc: &'a mut TypeDesc,
}

impl FieldsBuilder<'_> {
    fn push(&mut self, name: &str, offset: usize, kind: FieldKind) -> &mut Self {
        self.desc.fields.push(Field {
            name: name.to_owned(),
            offset,
            kind,
        });
        self
    }

    pub fn raw(&mut self, name: &str, offset: usize, len: usize) -> &mut Self {
        self.push(name, offset, FieldKind::Raw { len })
    }

    pub fn embedded(&mut self, name: &str, offset: usize, ty: TypeId) -> &mut Self {
        self.push(name, offset, FieldKind::Embedded { ty })
    }

    /// Pointer to a single `ty`.
    pub fn pointer(&mut self, name: &str, offset: usize, ty: TypeId) -> &mut Self {
        self.pointer_to(name, offset, PointerTarget::one(ty))
    }

    pub fn pointer_to(&mut self, name: &str, offset: usize, target: PointerTarget) -> &mut Self {
        self.push(name, offset, FieldKind::Pointer(target))
    }

    pub fn tagged_pointer(
        &mut self,
        name: &str,
        offset: usize,
        target: PointerTarget,
        codec: PointerCodec,
    ) -> &mut Self {
        self.push(name, offset, FieldKind::TaggedPointer { target, codec })
    }

    pub fn text(&mut self, name: &str, offset: usize) -> &mut Self {
        self.push(name, offset, FieldKind::Text)
    }

    pub fn container(&mut self, name: &str, offset: usize, container: Container) -> &mut Self {
        self.push(name, offset, FieldKind::Container(container))
    }
}
