//! Field descriptors.
//!
//! A [`Field`] pairs a [`FieldKind`] with an [`Offset`] rule. Descriptors are
//! immutable once a struct type is built; anything that varies per instance
//! (byte range length, array shape, nested state, variable child type) lives
//! in the instance's [`InstanceState`](crate::InstanceState).

mod access;


use std::fmt;
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};

use crate::codec::{Endianness, FloatWidth, IntWidth};
use crate::error::{Error, Result};
use crate::layout::StructType;
use crate::shape::element_count;
use crate::state::FieldState;

/// Where a field starts relative to the struct.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Offset {
    /// Right after the previously declared field, or 0 for the first one.
    #[default]
    Auto,
    /// Fixed byte offset from the start of the struct.
    At(usize),
    /// Right after the named field, using that field's current size.
    After(String),
}

/// The encoding rules of a field.
#[derive(Clone, Debug)]
pub enum FieldKind {
    Int {
        width: IntWidth,
        signed: bool,
        endian: Endianness,
    },
    Float {
        width: FloatWidth,
        endian: Endianness,
    },
    Bool {
        width: IntWidth,
        endian: Endianness,
    },
    /// Raw bytes. `None` length means the length is set per instance.
    Bytes { len: Option<usize> },
    /// Encoded text. `None` length means the length is set per instance.
    Str {
        len: Option<usize>,
        encoding: &'static Encoding,
    },
    /// Row-major array of fixed-size elements. `None` shape means the
    /// shape is set per instance and starts as `[0]`.
    Array {
        shape: Option<Vec<usize>>,
        elem: Box<FieldKind>,
    },
    /// Nested struct stored inline.
    Struct { ty: Arc<StructType> },
    /// Slot whose concrete kind is chosen per instance.
    Variable,
}

/// A field descriptor: encoding rules plus offset rule.
#[derive(Clone, Debug)]
pub struct Field {
    kind: FieldKind,
    offset: Offset,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            offset: Offset::Auto,
        }
    }

    pub fn int(width: IntWidth, signed: bool) -> Self {
        Self::new(FieldKind::Int {
            width,
            signed,
            endian: Endianness::Native,
        })
    }

    pub fn i8() -> Self {
        Self::int(IntWidth::W1, true)
    }

    pub fn i16() -> Self {
        Self::int(IntWidth::W2, true)
    }

    pub fn i32() -> Self {
        Self::int(IntWidth::W4, true)
    }

    pub fn i64() -> Self {
        Self::int(IntWidth::W8, true)
    }

    pub fn u8() -> Self {
        Self::int(IntWidth::W1, false)
    }

    pub fn u16() -> Self {
        Self::int(IntWidth::W2, false)
    }

    pub fn u32() -> Self {
        Self::int(IntWidth::W4, false)
    }

    pub fn u64() -> Self {
        Self::int(IntWidth::W8, false)
    }

    pub fn f32() -> Self {
        Self::new(FieldKind::Float {
            width: FloatWidth::F32,
            endian: Endianness::Native,
        })
    }

    pub fn f64() -> Self {
        Self::new(FieldKind::Float {
            width: FloatWidth::F64,
            endian: Endianness::Native,
        })
    }

    /// Boolean stored as a 4-byte integer; see [`Field::width`].
    pub fn boolean() -> Self {
        Self::new(FieldKind::Bool {
            width: IntWidth::W4,
            endian: Endianness::Native,
        })
    }

    pub fn bytes(len: usize) -> Self {
        Self::new(FieldKind::Bytes { len: Some(len) })
    }

    pub fn dyn_bytes() -> Self {
        Self::new(FieldKind::Bytes { len: None })
    }

    /// UTF-8 string of `len` bytes; see [`Field::encoding`].
    pub fn string(len: usize) -> Self {
        Self::new(FieldKind::Str {
            len: Some(len),
            encoding: UTF_8,
        })
    }

    pub fn dyn_string() -> Self {
        Self::new(FieldKind::Str {
            len: None,
            encoding: UTF_8,
        })
    }

    /// Fixed-shape array. The element's offset rule is ignored.
    pub fn array(shape: impl Into<Vec<usize>>, elem: Field) -> Self {
        Self::new(FieldKind::Array {
            shape: Some(shape.into()),
            elem: Box::new(elem.kind),
        })
    }

    /// Array whose shape is set per instance.
    pub fn dyn_array(elem: Field) -> Self {
        Self::new(FieldKind::Array {
            shape: None,
            elem: Box::new(elem.kind),
        })
    }

    pub fn nested(ty: &Arc<StructType>) -> Self {
        Self::new(FieldKind::Struct { ty: Arc::clone(ty) })
    }

    pub fn variable() -> Self {
        Self::new(FieldKind::Variable)
    }

    /// Place the field at a fixed offset.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Offset::At(offset);
        self
    }

    /// Place the field right after an earlier field.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.offset = Offset::After(name.into());
        self
    }

    /// Set the byte order of a scalar field or of an array's elements.
    pub fn endian(mut self, endian: Endianness) -> Self {
        self.kind.set_endian(endian);
        self
    }

    /// Set the width of an integer or boolean field.
    pub fn width(mut self, width: IntWidth) -> Self {
        match &mut self.kind {
            FieldKind::Int { width: w, .. } | FieldKind::Bool { width: w, .. } => *w = width,
            FieldKind::Array { elem, .. } => {
                if let FieldKind::Int { width: w, .. } | FieldKind::Bool { width: w, .. } =
                    elem.as_mut()
                {
                    *w = width;
                }
            }
            _ => {}
        }
        self
    }

    /// Set the text encoding of a string field or of an array's string elements.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        match &mut self.kind {
            FieldKind::Str { encoding: e, .. } => *e = encoding,
            FieldKind::Array { elem, .. } => {
                if let FieldKind::Str { encoding: e, .. } = elem.as_mut() {
                    *e = encoding;
                }
            }
            _ => {}
        }
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind.is_dynamic()
    }

    pub fn static_size(&self) -> usize {
        self.kind.static_size()
    }

    pub(crate) fn into_parts(self) -> (FieldKind, Offset) {
        (self.kind, self.offset)
    }
}

impl From<FieldKind> for Field {
    fn from(kind: FieldKind) -> Self {
        Self::new(kind)
    }
}

impl FieldKind {
    /// Whether the size of the field may differ between instances.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes { len } | Self::Str { len, .. } => len.is_none(),
            Self::Array { shape, .. } => shape.is_none(),
            Self::Struct { ty } => ty.has_dynamic_fields(),
            Self::Variable => true,
            Self::Int { .. } | Self::Float { .. } | Self::Bool { .. } => false,
        }
    }

    /// Size with no per-instance state: dynamic parts count as empty.
    pub fn static_size(&self) -> usize {
        match self {
            Self::Int { width, .. } | Self::Bool { width, .. } => width.bytes(),
            Self::Float { width, .. } => width.bytes(),
            Self::Bytes { len } | Self::Str { len, .. } => len.unwrap_or(0),
            Self::Array { shape, elem } => shape
                .as_deref()
                .map_or(0, |shape| element_count(shape) * elem.static_size()),
            Self::Struct { ty } => ty.min_size(),
            Self::Variable => 0,
        }
    }

    /// Current size given the field's per-instance state.
    pub fn size(&self, state: Option<&FieldState>) -> usize {
        match (self, state) {
            (Self::Bytes { len: None } | Self::Str { len: None, .. }, Some(FieldState::Len(n))) => *n,
            (Self::Array { shape: None, elem }, Some(FieldState::Shape(shape))) => {
                element_count(shape) * elem.static_size()
            }
            (Self::Struct { ty }, Some(FieldState::Nested(inner))) => ty.logical_size(inner),
            (Self::Variable, Some(FieldState::Variable(Some(child)))) => {
                child.kind.size(child.state.as_ref())
            }
            _ => self.static_size(),
        }
    }

    /// Current array shape given the field's per-instance state.
    pub(crate) fn current_shape(&self, state: Option<&FieldState>) -> Vec<usize> {
        match (self, state) {
            (Self::Array { shape: Some(shape), .. }, _) => shape.clone(),
            (Self::Array { shape: None, .. }, Some(FieldState::Shape(shape))) => shape.clone(),
            _ => vec![0],
        }
    }

    /// State a fresh instance starts with, or `None` when the field keeps none.
    pub(crate) fn initial_state(&self) -> Option<FieldState> {
        match self {
            Self::Bytes { len: None } | Self::Str { len: None, .. } => Some(FieldState::Len(0)),
            Self::Array { shape: None, .. } => Some(FieldState::Shape(vec![0])),
            Self::Struct { .. } => Some(FieldState::Nested(Default::default())),
            Self::Variable => Some(FieldState::Variable(None)),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let Self::Array { shape, elem } = self else {
            return Ok(());
        };
        if shape.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::EmptyShape);
        }
        let fixed = match elem.as_ref() {
            Self::Array { .. } | Self::Variable => false,
            other => !other.is_dynamic(),
        };
        if !fixed {
            return Err(Error::UnsupportedArrayElement(elem.to_string()));
        }
        Ok(())
    }

    fn set_endian(&mut self, endian: Endianness) {
        match self {
            Self::Int { endian: e, .. } | Self::Float { endian: e, .. } | Self::Bool { endian: e, .. } => {
                *e = endian
            }
            Self::Array { elem, .. } => elem.set_endian(endian),
            _ => {}
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int { width, signed, .. } => {
                let prefix = if *signed { 'i' } else { 'u' };
                write!(f, "{prefix}{}", width.bytes() * 8)
            }
            Self::Float { width, .. } => write!(f, "f{}", width.bytes() * 8),
            Self::Bool { .. } => f.write_str("bool"),
            Self::Bytes { len: Some(n) } => write!(f, "bytes[{n}]"),
            Self::Bytes { len: None } => f.write_str("bytes[*]"),
            Self::Str { len: Some(n), .. } => write!(f, "str[{n}]"),
            Self::Str { len: None, .. } => f.write_str("str[*]"),
            Self::Array {
                shape: Some(shape),
                elem,
            } => {
                f.write_str("array[")?;
                for (i, dim) in shape.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{dim}")?;
                }
                write!(f, "] of {elem}")
            }
            Self::Array { shape: None, elem } => write!(f, "array[*] of {elem}"),
            Self::Struct { ty } => write!(f, "struct {}", ty.name()),
            Self::Variable => f.write_str("variable"),
        }
    }
}

/// New size, shape or type for a dynamic field.
#[derive(Clone, Debug)]
pub enum Resize {
    /// Byte length of a byte range or string, or length of a 1-D array.
    Len(usize),
    /// Shape of an array.
    Shape(Vec<usize>),
    /// Concrete type of a variable field.
    Type(Field),
}

impl Resize {
    fn describe(&self) -> &'static str {
        match self {
            Self::Len(_) => "a length",
            Self::Shape(_) => "a shape",
            Self::Type(_) => "a type",
        }
    }
}

impl From<usize> for Resize {
    fn from(len: usize) -> Self {
        Self::Len(len)
    }
}

impl From<Vec<usize>> for Resize {
    fn from(shape: Vec<usize>) -> Self {
        Self::Shape(shape)
    }
}

impl<const N: usize> From<[usize; N]> for Resize {
    fn from(shape: [usize; N]) -> Self {
        Self::Shape(shape.to_vec())
    }
}

impl From<Field> for Resize {
    fn from(field: Field) -> Self {
        Self::Type(field)
    }
}
