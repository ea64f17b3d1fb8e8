//! Error types for struct declaration and instance access.

/// Broad classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The struct type declaration is invalid.
    Definition,
    /// An offset, size or index falls outside the buffer or the current shape.
    Bounds,
    /// The operation does not apply to the field or to the value given.
    InvalidOperation,
    /// The logical struct size exceeds the physical buffer.
    Overflow,
}

/// Errors raised while declaring struct types or accessing instances.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("field name `{0}` is reserved")]
    ReservedName(String),
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("field `{field}` follows `{target}`, which is not declared before it")]
    InvalidOffsetTarget { field: String, target: String },
    #[error("array elements must have a fixed size, got {0}")]
    UnsupportedArrayElement(String),
    #[error("array shape must have at least one dimension")]
    EmptyShape,

    #[error("{size} bytes at offset {offset} are out of bounds for a buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize,
    },
    #[error("index {index:?} is out of bounds for shape {shape:?}")]
    IndexOutOfBounds { index: Vec<isize>, shape: Vec<usize> },

    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is not dynamic and cannot be resized")]
    NotDynamic(String),
    #[error("{kind} field cannot be resized to {spec}")]
    InvalidResize { kind: String, spec: &'static str },
    #[error("variable field has no type assigned")]
    NoTypeAssigned,
    #[error("expected a {expected} field, found {found}")]
    WrongFieldKind { expected: &'static str, found: String },
    #[error("length mismatch: field holds {expected} bytes, value has {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("shape mismatch: field has shape {expected:?}, value has {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("expected a `{expected}` struct, got `{found}`")]
    StructTypeMismatch { expected: String, found: String },
    #[error("{field} field cannot hold a {value} value")]
    TypeMismatch { field: String, value: &'static str },
    #[error("{value} does not fit in a {width}-byte {signedness} integer")]
    IntegerOutOfRange {
        value: i128,
        width: usize,
        signedness: &'static str,
    },
    #[error("text cannot be {op}d as {encoding}")]
    Encoding {
        encoding: &'static str,
        op: &'static str,
    },

    #[error("overflow: struct needs {required} bytes but the buffer holds {len}")]
    Overflow { required: usize, len: usize },
}

impl Error {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReservedName(_)
            | Self::DuplicateField(_)
            | Self::InvalidOffsetTarget { .. }
            | Self::UnsupportedArrayElement(_)
            | Self::EmptyShape => ErrorKind::Definition,
            Self::OutOfBounds { .. } | Self::IndexOutOfBounds { .. } => ErrorKind::Bounds,
            Self::UnknownField(_)
            | Self::NotDynamic(_)
            | Self::InvalidResize { .. }
            | Self::NoTypeAssigned
            | Self::WrongFieldKind { .. }
            | Self::LengthMismatch { .. }
            | Self::ShapeMismatch { .. }
            | Self::StructTypeMismatch { .. }
            | Self::TypeMismatch { .. }
            | Self::IntegerOutOfRange { .. }
            | Self::Encoding { .. } => ErrorKind::InvalidOperation,
            Self::Overflow { .. } => ErrorKind::Overflow,
        }
    }
}

/// Result type for struct operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fail with [`Error::OutOfBounds`] unless `offset..offset + size` lies within `len`.
pub(crate) fn check_bounds(offset: usize, size: usize, len: usize) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::OutOfBounds { offset, size, len }),
    }
}
