//! Struct type declaration and offset resolution.
//!
//! A [`StructType`] is built once from an ordered field list and then shared
//! by all of its instances. Static offsets are fixed at build time; live
//! offsets follow the chain of [`ResolvedOffset::After`] links and add the
//! current size of each field on the way.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::field::{Field, FieldKind, Offset};
use crate::state::InstanceState;

/// Names that cannot be used for fields.
pub const RESERVED_NAMES: [&str; 3] = ["data", "master_offset", "size"];

/// Position of a field in its struct type's declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(usize);

impl FieldId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Offset rule after name resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedOffset {
    At(usize),
    After(FieldId),
}

/// A declared field with its resolved layout.
#[derive(Debug)]
pub struct FieldEntry {
    kind: FieldKind,
    offset: ResolvedOffset,
    static_offset: usize,
    static_size: usize,
}

impl FieldEntry {
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn offset(&self) -> ResolvedOffset {
        self.offset
    }

    /// Offset assuming every dynamic field is empty.
    pub fn static_offset(&self) -> usize {
        self.static_offset
    }

    pub fn static_size(&self) -> usize {
        self.static_size
    }

    fn static_end(&self) -> usize {
        self.static_offset + self.static_size
    }
}

/// Resolved layout of a struct type.
#[derive(Debug)]
pub struct StructType {
    name: String,
    fields: IndexMap<String, FieldEntry>,
    min_size: usize,
    last_field: Option<FieldId>,
}

impl StructType {
    pub fn builder(name: impl Into<String>) -> StructTypeBuilder {
        StructTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes needed to hold every field with dynamic fields empty.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Last declared field; the logical size ends where it ends.
    pub fn last_field(&self) -> Option<FieldId> {
        self.last_field
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields.get_index_of(name).map(FieldId::new)
    }

    pub fn field_name(&self, id: FieldId) -> Option<&str> {
        self.fields.get_index(id.index()).map(|(name, _)| name.as_str())
    }

    pub fn entry(&self, id: FieldId) -> Option<&FieldEntry> {
        self.fields.get_index(id.index()).map(|(_, entry)| entry)
    }

    /// Name and entry of a field, in one lookup.
    pub fn field_at(&self, id: FieldId) -> Option<(&str, &FieldEntry)> {
        self.fields.get_index(id.index()).map(|(name, entry)| (name.as_str(), entry))
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &str, &FieldEntry)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, (name, entry))| (FieldId::new(i), name.as_str(), entry))
    }

    pub fn has_dynamic_fields(&self) -> bool {
        self.fields.values().any(|entry| entry.kind.is_dynamic())
    }

    /// Current size of a field in the instance owning `state`.
    pub fn field_size(&self, id: FieldId, state: &InstanceState) -> usize {
        self.entry(id)
            .map_or(0, |entry| entry.kind.size(state.get(id)))
    }

    /// Current offset of a field from the start of the struct.
    pub fn field_offset(&self, id: FieldId, state: &InstanceState) -> usize {
        let mut offset = 0;
        let mut current = id;
        while let Some(entry) = self.entry(current) {
            match entry.offset {
                ResolvedOffset::At(at) => return offset + at,
                ResolvedOffset::After(prev) => {
                    offset += self.field_size(prev, state);
                    current = prev;
                }
            }
        }
        offset
    }

    /// Offset right after the last field, or 0 for a type without fields.
    pub fn logical_size(&self, state: &InstanceState) -> usize {
        self.last_field.map_or(0, |id| {
            self.field_offset(id, state) + self.field_size(id, state)
        })
    }
}

/// Collects fields in declaration order; see [`StructType::builder`].
#[derive(Debug)]
pub struct StructTypeBuilder {
    name: String,
    fields: Vec<(String, Field)>,
}

impl StructTypeBuilder {
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    pub fn build(self) -> Result<Arc<StructType>> {
        let mut fields: IndexMap<String, FieldEntry> = IndexMap::with_capacity(self.fields.len());
        let mut min_size = 0;

        for (name, field) in self.fields {
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(Error::ReservedName(name));
            }
            if fields.contains_key(&name) {
                return Err(Error::DuplicateField(name));
            }

            let (kind, offset) = field.into_parts();
            kind.validate()?;

            let (offset, static_offset) = match offset {
                Offset::At(at) => (ResolvedOffset::At(at), at),
                Offset::Auto => match fields.last() {
                    Some((_, prev)) => (
                        ResolvedOffset::After(FieldId::new(fields.len() - 1)),
                        prev.static_end(),
                    ),
                    None => (ResolvedOffset::At(0), 0),
                },
                Offset::After(target) => {
                    let Some((index, _, prev)) = fields.get_full(&target) else {
                        return Err(Error::InvalidOffsetTarget {
                            field: name,
                            target,
                        });
                    };
                    (ResolvedOffset::After(FieldId::new(index)), prev.static_end())
                }
            };

            let static_size = kind.static_size();
            let end = static_offset + static_size;
            trace!("field `{name}`: {kind} at {static_offset}, {static_size} bytes");

            min_size = min_size.max(end);

            fields.insert(
                name,
                FieldEntry {
                    kind,
                    offset,
                    static_offset,
                    static_size,
                },
            );
        }

        let last_field = fields.len().checked_sub(1).map(FieldId::new);
        debug!(
            "declared struct `{}` with {} fields, min size {min_size}",
            self.name,
            fields.len()
        );

        Ok(Arc::new(StructType {
            name: self.name,
            fields,
            min_size,
            last_field,
        }))
    }
}

/// Addresses a field by name or by id.
pub trait FieldKey {
    fn resolve(&self, ty: &StructType) -> Result<FieldId>;
}

impl FieldKey for FieldId {
    fn resolve(&self, ty: &StructType) -> Result<FieldId> {
        if self.index() < ty.len() {
            Ok(*self)
        } else {
            Err(Error::UnknownField(format!("#{}", self.index())))
        }
    }
}

impl FieldKey for &str {
    fn resolve(&self, ty: &StructType) -> Result<FieldId> {
        ty.field_id(self)
            .ok_or_else(|| Error::UnknownField((*self).to_owned()))
    }
}

impl FieldKey for String {
    fn resolve(&self, ty: &StructType) -> Result<FieldId> {
        self.as_str().resolve(ty)
    }
}
