/// Failed query against an image.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InspectError {
    #[error("no root named `{0}`")]
    UnknownRoot(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("type `{ty}` has no field `{field}`")]
    NoField { ty: String, field: String },
    #[error("field `{field}` is {found}, expected {expected}")]
    WrongKind {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field `{field}` has {size} bytes, {wanted} needed")]
    WrongSize {
        field: String,
        size: usize,
        wanted: usize,
    },
    #[error("{len} bytes at @{offset:#x} lie outside the data section")]
    OutOfBounds { offset: u64, len: u64 },
    #[error("pointer slot @{slot:#x} has no fixup")]
    MissingFixup { slot: u64 },
    #[error("text at @{offset:#x} is not terminated UTF-8")]
    BadText { offset: u64 },
    #[error("container at @{offset:#x} is corrupt: {reason}")]
    CorruptContainer { offset: u64, reason: &'static str },
}
