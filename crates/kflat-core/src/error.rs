//! Descriptor validation errors.

/// A type descriptor that cannot be used for flattening.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("type `{0}` is already declared")]
    DuplicateType(String),
    #[error("type `{0}` is referenced but has no field list")]
    Undefined(String),
    #[error("type `{ty}`: alignment {align} is not a power of two")]
    BadAlignment { ty: String, align: usize },
    #[error("type `{ty}`: field `{field}` ends at {end}, past size {size}")]
    FieldOverflow {
        ty: String,
        field: String,
        end: usize,
        size: usize,
    },
    #[error("type `{ty}`: pointer field `{field}` at offset {offset} is not 8-byte aligned")]
    MisalignedPointer {
        ty: String,
        field: String,
        offset: usize,
    },
    #[error("type `{ty}`: count field width {width} is not 1, 2, 4 or 8")]
    BadCountWidth { ty: String, width: usize },
    #[error("type `{0}` embeds itself")]
    EmbeddingCycle(String),
    #[error("unknown type id {0}")]
    UnknownType(u32),
}
