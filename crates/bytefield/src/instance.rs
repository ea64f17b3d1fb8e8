//! Struct instances bound to a byte buffer.
//!
//! [`Struct`] owns its buffer and state. [`StructRef`] and [`StructMut`] are
//! borrowed handles over a buffer region starting at a master offset; nested
//! struct fields and array elements hand out such handles over the parent's
//! buffer, so a handle can never outlive a resize of its parent.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use log::{debug, trace};

use crate::error::{Error, Result, check_bounds};
use crate::field::{FieldKind, Resize};
use crate::layout::{FieldEntry, FieldId, FieldKey, StructType};
use crate::state::{EMPTY_STATE, FieldState, InstanceState, VariableChild};
use crate::value::Value;
use crate::view::{ArrayView, ArrayViewMut, ByteRangeView, ByteRangeViewMut};

/// A struct instance owning its buffer.
#[derive(Clone, Debug)]
pub struct Struct {
    ty: Arc<StructType>,
    data: Vec<u8>,
    master_offset: usize,
    state: InstanceState,
}

impl Struct {
    /// Zero-filled instance of `min_size` bytes.
    pub fn new(ty: &Arc<StructType>) -> Self {
        Self::from_bytes(ty, vec![0; ty.min_size()])
    }

    /// Instance over existing bytes. A `Vec<u8>` is used as is.
    pub fn from_bytes(ty: &Arc<StructType>, data: impl Into<Vec<u8>>) -> Self {
        Self::with_master_offset(ty, data, 0)
    }

    /// Instance whose fields start `master_offset` bytes into `data`.
    pub fn with_master_offset(ty: &Arc<StructType>, data: impl Into<Vec<u8>>, master_offset: usize) -> Self {
        Self {
            ty: Arc::clone(ty),
            data: data.into(),
            master_offset,
            state: InstanceState::new(),
        }
    }

    /// Zero-filled instance with fields set in the given order.
    pub fn with_values<K, V>(ty: &Arc<StructType>, values: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: FieldKey,
        V: Into<Value>,
    {
        let mut instance = Self::new(ty);
        for (key, value) in values {
            instance.set(key, value)?;
        }
        Ok(instance)
    }

    pub(crate) fn detached(ty: Arc<StructType>, data: Vec<u8>, state: InstanceState) -> Self {
        Self {
            ty,
            data,
            master_offset: 0,
            state,
        }
    }

    pub fn view(&self) -> StructRef<'_> {
        StructRef {
            ty: Arc::clone(&self.ty),
            data: &self.data,
            master_offset: self.master_offset,
            state: &self.state,
        }
    }

    pub fn view_mut(&mut self) -> StructMut<'_> {
        StructMut {
            ty: Arc::clone(&self.ty),
            data: &mut self.data,
            master_offset: self.master_offset,
            state: StateMut::Borrowed(&mut self.state),
        }
    }

    pub fn struct_type(&self) -> &Arc<StructType> {
        &self.ty
    }

    /// The whole buffer, including bytes before the master offset.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn master_offset(&self) -> usize {
        self.master_offset
    }

    /// Bytes covered by the logical size, or `None` on overflow.
    pub fn logical_bytes(&self) -> Option<&[u8]> {
        let end = self.master_offset.checked_add(self.size())?;
        self.data.get(self.master_offset..end)
    }

    pub(crate) fn state(&self) -> &InstanceState {
        &self.state
    }

    pub fn size(&self) -> usize {
        self.view().size()
    }

    pub fn check_overflow(&self) -> Result<()> {
        self.view().check_overflow()
    }

    pub fn calc_offset(&self, key: impl FieldKey) -> Result<usize> {
        self.view().calc_offset(key)
    }

    pub fn calc_field_offset(&self, key: impl FieldKey) -> Result<usize> {
        self.view().calc_field_offset(key)
    }

    pub fn field_size(&self, key: impl FieldKey) -> Result<usize> {
        self.view().field_size(key)
    }

    pub fn get(&self, key: impl FieldKey) -> Result<Value> {
        self.view().get(key)
    }

    pub fn set(&mut self, key: impl FieldKey, value: impl Into<Value>) -> Result<()> {
        self.view_mut().set(key, value)
    }

    pub fn resize(&mut self, key: impl FieldKey, spec: impl Into<Resize>, resize_bytes: bool) -> Result<()> {
        self.view_mut().resize(key, spec, resize_bytes)
    }

    pub fn nested(&self, key: impl FieldKey) -> Result<StructRef<'_>> {
        self.view().nested(key)
    }

    pub fn nested_mut(&mut self, key: impl FieldKey) -> Result<StructMut<'_>> {
        let id = key.resolve(&self.ty)?;
        nested_mut_at(&self.ty, &mut self.data, self.master_offset, &mut self.state, id)
    }

    pub fn array(&self, key: impl FieldKey) -> Result<ArrayView<'_>> {
        self.view().array(key)
    }

    pub fn array_mut(&mut self, key: impl FieldKey) -> Result<ArrayViewMut<'_>> {
        let id = key.resolve(&self.ty)?;
        array_mut_at(&self.ty, &mut self.data, self.master_offset, &self.state, id)
    }

    pub fn byte_range(&self, key: impl FieldKey) -> Result<ByteRangeView<'_>> {
        self.view().byte_range(key)
    }

    pub fn byte_range_mut(&mut self, key: impl FieldKey) -> Result<ByteRangeViewMut<'_>> {
        let id = key.resolve(&self.ty)?;
        byte_range_mut_at(&self.ty, &mut self.data, self.master_offset, &self.state, id)
    }
}

/// Compares the logical bytes of two instances of the same type.
impl PartialEq for Struct {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ty, &other.ty) && self.logical_bytes() == other.logical_bytes()
    }
}

/// Bytes from the master offset to the end of the buffer.
impl AsRef<[u8]> for Struct {
    fn as_ref(&self) -> &[u8] {
        self.data.get(self.master_offset..).unwrap_or_default()
    }
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::dump::dump(&self.view()) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

/// Read-only handle over a struct stored in a borrowed buffer.
#[derive(Clone, Debug)]
pub struct StructRef<'a> {
    ty: Arc<StructType>,
    data: &'a [u8],
    master_offset: usize,
    state: &'a InstanceState,
}

impl<'a> StructRef<'a> {
    pub(crate) fn new(ty: Arc<StructType>, data: &'a [u8], master_offset: usize, state: &'a InstanceState) -> Self {
        Self {
            ty,
            data,
            master_offset,
            state,
        }
    }

    pub fn struct_type(&self) -> &Arc<StructType> {
        &self.ty
    }

    /// The whole underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn master_offset(&self) -> usize {
        self.master_offset
    }

    /// Logical size: offset right after the last field.
    pub fn size(&self) -> usize {
        self.ty.logical_size(self.state)
    }

    pub(crate) fn field_state(&self, id: FieldId) -> Option<&'a FieldState> {
        self.state.get(id)
    }

    /// Fail if the logical size runs past the end of the buffer.
    pub fn check_overflow(&self) -> Result<()> {
        let required = self.master_offset.saturating_add(self.size());
        if required > self.data.len() {
            return Err(Error::Overflow {
                required,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    /// Absolute offset of a field in the buffer.
    pub fn calc_offset(&self, key: impl FieldKey) -> Result<usize> {
        Ok(self.master_offset + self.calc_field_offset(key)?)
    }

    /// Offset of a field from the start of the struct.
    pub fn calc_field_offset(&self, key: impl FieldKey) -> Result<usize> {
        let id = key.resolve(&self.ty)?;
        Ok(self.ty.field_offset(id, self.state))
    }

    pub fn field_size(&self, key: impl FieldKey) -> Result<usize> {
        let id = key.resolve(&self.ty)?;
        Ok(self.ty.field_size(id, self.state))
    }

    pub fn get(&self, key: impl FieldKey) -> Result<Value> {
        let (id, entry) = resolve(&self.ty, key)?;
        let offset = self.master_offset + self.ty.field_offset(id, self.state);
        entry.kind().read(self.data, offset, self.state.get(id))
    }

    /// Handle over a nested struct field, at its current offset.
    pub fn nested(&self, key: impl FieldKey) -> Result<StructRef<'a>> {
        let (id, entry) = resolve(&self.ty, key)?;
        let state: &'a InstanceState = self.state;
        let (ty, inner) = nested_parts(entry.kind(), state.get(id))?;
        Ok(StructRef {
            ty,
            data: self.data,
            master_offset: self.master_offset + self.ty.field_offset(id, state),
            state: inner,
        })
    }

    pub fn array(&self, key: impl FieldKey) -> Result<ArrayView<'a>> {
        let (id, entry) = resolve(&self.ty, key)?;
        let offset = self.master_offset + self.ty.field_offset(id, self.state);
        let (shape, elem) = array_parts(entry.kind(), self.state.get(id))?;
        Ok(ArrayView::new(self.data, offset, shape, elem))
    }

    pub fn byte_range(&self, key: impl FieldKey) -> Result<ByteRangeView<'a>> {
        let (id, entry) = resolve(&self.ty, key)?;
        let offset = self.master_offset + self.ty.field_offset(id, self.state);
        let len = byte_range_len(entry.kind(), self.state.get(id))?;
        ByteRangeView::new(self.data, offset, len)
    }
}

#[derive(Debug)]
enum StateMut<'a> {
    Borrowed(&'a mut InstanceState),
    /// Array elements carry no state of their own.
    Detached(InstanceState),
}

impl Deref for StateMut<'_> {
    type Target = InstanceState;

    fn deref(&self) -> &InstanceState {
        match self {
            Self::Borrowed(state) => state,
            Self::Detached(state) => state,
        }
    }
}

impl DerefMut for StateMut<'_> {
    fn deref_mut(&mut self) -> &mut InstanceState {
        match self {
            Self::Borrowed(state) => state,
            Self::Detached(state) => state,
        }
    }
}

/// Mutable handle over a struct stored in a borrowed buffer.
///
/// Writes and resizes splice the whole underlying buffer, so resizing a
/// nested struct's field moves every byte after it in the parent too.
#[derive(Debug)]
pub struct StructMut<'a> {
    ty: Arc<StructType>,
    data: &'a mut Vec<u8>,
    master_offset: usize,
    state: StateMut<'a>,
}

impl<'a> StructMut<'a> {
    pub(crate) fn detached(ty: Arc<StructType>, data: &'a mut Vec<u8>, master_offset: usize) -> Self {
        Self {
            ty,
            data,
            master_offset,
            state: StateMut::Detached(InstanceState::new()),
        }
    }

    pub fn view(&self) -> StructRef<'_> {
        StructRef {
            ty: Arc::clone(&self.ty),
            data: self.data.as_slice(),
            master_offset: self.master_offset,
            state: &*self.state,
        }
    }

    pub fn struct_type(&self) -> &Arc<StructType> {
        &self.ty
    }

    pub fn master_offset(&self) -> usize {
        self.master_offset
    }

    pub fn size(&self) -> usize {
        self.view().size()
    }

    pub fn check_overflow(&self) -> Result<()> {
        self.view().check_overflow()
    }

    pub fn calc_offset(&self, key: impl FieldKey) -> Result<usize> {
        self.view().calc_offset(key)
    }

    pub fn calc_field_offset(&self, key: impl FieldKey) -> Result<usize> {
        self.view().calc_field_offset(key)
    }

    pub fn get(&self, key: impl FieldKey) -> Result<Value> {
        self.view().get(key)
    }

    pub fn set(&mut self, key: impl FieldKey, value: impl Into<Value>) -> Result<()> {
        let (id, entry) = resolve(&self.ty, key)?;
        let value = value.into();
        let offset = self.master_offset + self.ty.field_offset(id, &self.state);
        let state = self.state.get_or_create(id, entry.kind());
        entry.kind().write(self.data, offset, state, &value)
    }

    /// Change the size, shape or type of a dynamic field.
    ///
    /// The field's state is always updated. With `resize_bytes` the buffer is
    /// spliced too: growing inserts zeros at the field's old end, shrinking
    /// drops the field's tail. Bytes outside the field keep their order.
    pub fn resize(&mut self, key: impl FieldKey, spec: impl Into<Resize>, resize_bytes: bool) -> Result<()> {
        let (id, name, entry) = resolve_named(&self.ty, key)?;
        let kind = entry.kind();
        if !kind.is_dynamic() {
            return Err(Error::NotDynamic(name.to_owned()));
        }

        let offset = self.master_offset + self.ty.field_offset(id, &self.state);
        let Some(state) = self.state.get_or_create(id, kind) else {
            return Err(Error::NotDynamic(name.to_owned()));
        };

        let old = kind.size(Some(&*state));
        let mut next = state.clone();
        kind.resize(&mut next, spec.into())?;
        let new = kind.size(Some(&next));

        if resize_bytes {
            splice_region(self.data, offset, old, new)?;
        }
        *state = next;

        debug!(
            "resized `{}.{name}` from {old} to {new} bytes{}",
            self.ty.name(),
            if resize_bytes { "" } else { " (logical only)" }
        );
        Ok(())
    }

    pub fn nested(&self, key: impl FieldKey) -> Result<StructRef<'_>> {
        let (id, entry) = resolve(&self.ty, key)?;
        let state: &InstanceState = &self.state;
        let (ty, inner) = nested_parts(entry.kind(), state.get(id))?;
        Ok(StructRef {
            ty,
            data: self.data.as_slice(),
            master_offset: self.master_offset + self.ty.field_offset(id, state),
            state: inner,
        })
    }

    /// Mutable handle over a nested struct field, at its current offset.
    pub fn nested_mut(&mut self, key: impl FieldKey) -> Result<StructMut<'_>> {
        let id = key.resolve(&self.ty)?;
        nested_mut_at(&self.ty, self.data, self.master_offset, &mut self.state, id)
    }

    pub fn array(&self, key: impl FieldKey) -> Result<ArrayView<'_>> {
        self.view_array(key)
    }

    pub fn array_mut(&mut self, key: impl FieldKey) -> Result<ArrayViewMut<'_>> {
        let id = key.resolve(&self.ty)?;
        array_mut_at(&self.ty, self.data, self.master_offset, &self.state, id)
    }

    pub fn byte_range(&self, key: impl FieldKey) -> Result<ByteRangeView<'_>> {
        let (id, entry) = resolve(&self.ty, key)?;
        let offset = self.master_offset + self.ty.field_offset(id, &self.state);
        let len = byte_range_len(entry.kind(), self.state.get(id))?;
        ByteRangeView::new(self.data.as_slice(), offset, len)
    }

    pub fn byte_range_mut(&mut self, key: impl FieldKey) -> Result<ByteRangeViewMut<'_>> {
        let id = key.resolve(&self.ty)?;
        byte_range_mut_at(&self.ty, self.data, self.master_offset, &self.state, id)
    }

    fn view_array(&self, key: impl FieldKey) -> Result<ArrayView<'_>> {
        let (id, entry) = resolve(&self.ty, key)?;
        let offset = self.master_offset + self.ty.field_offset(id, &self.state);
        let (shape, elem) = array_parts(entry.kind(), self.state.get(id))?;
        Ok(ArrayView::new(self.data.as_slice(), offset, shape, elem))
    }
}

fn resolve(ty: &StructType, key: impl FieldKey) -> Result<(FieldId, &FieldEntry)> {
    let (id, _, entry) = resolve_named(ty, key)?;
    Ok((id, entry))
}

fn resolve_named(ty: &StructType, key: impl FieldKey) -> Result<(FieldId, &str, &FieldEntry)> {
    let id = key.resolve(ty)?;
    let (name, entry) = ty
        .field_at(id)
        .ok_or_else(|| Error::UnknownField(format!("#{}", id.index())))?;
    Ok((id, name, entry))
}

fn nested_mut_at<'s>(
    ty: &StructType,
    data: &'s mut Vec<u8>,
    master_offset: usize,
    state: &'s mut InstanceState,
    id: FieldId,
) -> Result<StructMut<'s>> {
    let (_, entry) = resolve(ty, id)?;
    let offset = master_offset + ty.field_offset(id, state);
    let (nested_ty, inner) = nested_parts_mut(entry.kind(), state.get_or_create(id, entry.kind()))?;
    Ok(StructMut {
        ty: nested_ty,
        data,
        master_offset: offset,
        state: StateMut::Borrowed(inner),
    })
}

fn array_mut_at<'s>(
    ty: &StructType,
    data: &'s mut Vec<u8>,
    master_offset: usize,
    state: &InstanceState,
    id: FieldId,
) -> Result<ArrayViewMut<'s>> {
    let (_, entry) = resolve(ty, id)?;
    let offset = master_offset + ty.field_offset(id, state);
    let (shape, elem) = array_parts(entry.kind(), state.get(id))?;
    Ok(ArrayViewMut::new(data, offset, shape, elem))
}

fn byte_range_mut_at<'s>(
    ty: &StructType,
    data: &'s mut Vec<u8>,
    master_offset: usize,
    state: &InstanceState,
    id: FieldId,
) -> Result<ByteRangeViewMut<'s>> {
    let (_, entry) = resolve(ty, id)?;
    let offset = master_offset + ty.field_offset(id, state);
    let len = byte_range_len(entry.kind(), state.get(id))?;
    ByteRangeViewMut::new(data, offset, len)
}

/// Struct type and inner state of a nested struct field, looking through variables.
fn nested_parts<'s>(kind: &FieldKind, state: Option<&'s FieldState>) -> Result<(Arc<StructType>, &'s InstanceState)> {
    match (kind, state) {
        (FieldKind::Struct { ty }, Some(FieldState::Nested(inner))) => Ok((Arc::clone(ty), inner)),
        (FieldKind::Struct { ty }, _) => Ok((Arc::clone(ty), &EMPTY_STATE)),
        (FieldKind::Variable, Some(FieldState::Variable(Some(child)))) => {
            nested_parts(&child.kind, child.state.as_ref())
        }
        (FieldKind::Variable, _) => Err(Error::NoTypeAssigned),
        (other, _) => Err(Error::WrongFieldKind {
            expected: "struct",
            found: other.to_string(),
        }),
    }
}

fn nested_parts_mut<'s>(
    kind: &FieldKind,
    state: Option<&'s mut FieldState>,
) -> Result<(Arc<StructType>, &'s mut InstanceState)> {
    match (kind, state) {
        (FieldKind::Struct { ty }, Some(FieldState::Nested(inner))) => Ok((Arc::clone(ty), inner)),
        (FieldKind::Variable, Some(FieldState::Variable(Some(child)))) => {
            let VariableChild { kind, state } = &mut **child;
            if state.is_none() {
                *state = kind.initial_state();
            }
            nested_parts_mut(kind, state.as_mut())
        }
        (FieldKind::Variable, _) => Err(Error::NoTypeAssigned),
        (other, _) => Err(Error::WrongFieldKind {
            expected: "struct",
            found: other.to_string(),
        }),
    }
}

/// Current shape and element kind of an array field, looking through variables.
fn array_parts(kind: &FieldKind, state: Option<&FieldState>) -> Result<(Vec<usize>, FieldKind)> {
    match (kind, state) {
        (FieldKind::Array { elem, .. }, _) => Ok((kind.current_shape(state), (**elem).clone())),
        (FieldKind::Variable, Some(FieldState::Variable(Some(child)))) => {
            array_parts(&child.kind, child.state.as_ref())
        }
        (FieldKind::Variable, _) => Err(Error::NoTypeAssigned),
        (other, _) => Err(Error::WrongFieldKind {
            expected: "array",
            found: other.to_string(),
        }),
    }
}

/// Current length of a byte range field, looking through variables.
fn byte_range_len(kind: &FieldKind, state: Option<&FieldState>) -> Result<usize> {
    match (kind, state) {
        (FieldKind::Bytes { .. }, _) => Ok(kind.size(state)),
        (FieldKind::Variable, Some(FieldState::Variable(Some(child)))) => {
            byte_range_len(&child.kind, child.state.as_ref())
        }
        (FieldKind::Variable, _) => Err(Error::NoTypeAssigned),
        (other, _) => Err(Error::WrongFieldKind {
            expected: "bytes",
            found: other.to_string(),
        }),
    }
}

/// Resize the `old`-byte region at `offset` to `new` bytes in one splice.
///
/// Shrinking drops the region's tail, growing appends zeros to it.
pub(crate) fn splice_region(data: &mut Vec<u8>, offset: usize, old: usize, new: usize) -> Result<()> {
    check_bounds(offset, old, data.len())?;
    if new < old {
        data.drain(offset + new..offset + old);
    } else if new > old {
        let at = offset + old;
        data.splice(at..at, std::iter::repeat_n(0, new - old));
    }
    if new != old {
        trace!("spliced {old} -> {new} bytes at offset {offset}, buffer now {} bytes", data.len());
    }
    Ok(())
}
