//! Zero-copy views over array and byte range fields.
//!
//! A view resolves the field's offset and shape when it is created. It
//! borrows the instance's buffer, so the geometry cannot change while the
//! view is alive; take a new view after a resize.

use std::sync::Arc;

use crate::error::{Error, Result, check_bounds};
use crate::field::FieldKind;
use crate::instance::{StructMut, StructRef};
use crate::layout::StructType;
use crate::shape::{element_count, flat_index};
use crate::state::EMPTY_STATE;
use crate::value::{DenseArray, Value};

#[derive(Clone, Debug)]
struct ArrayGeometry {
    base: usize,
    shape: Vec<usize>,
    elem: FieldKind,
}

impl ArrayGeometry {
    fn element_offset(&self, index: &[isize]) -> Result<usize> {
        Ok(self.base + flat_index(&self.shape, index)? * self.elem.static_size())
    }

    fn element_type(&self) -> Result<&Arc<StructType>> {
        match &self.elem {
            FieldKind::Struct { ty } => Ok(ty),
            other => Err(Error::WrongFieldKind {
                expected: "struct",
                found: other.to_string(),
            }),
        }
    }

    fn read(&self, data: &[u8], index: &[isize]) -> Result<Value> {
        self.elem.read(data, self.element_offset(index)?, None)
    }

    fn to_dense(&self, data: &[u8]) -> Result<DenseArray> {
        let elem_size = self.elem.static_size();
        let items = (0..element_count(&self.shape))
            .map(|i| self.elem.read(data, self.base + i * elem_size, None))
            .collect::<Result<Vec<_>>>()?;
        DenseArray::new(self.shape.clone(), items)
    }
}

/// Read-only view over an array field.
#[derive(Clone, Debug)]
pub struct ArrayView<'a> {
    data: &'a [u8],
    geometry: ArrayGeometry,
}

impl<'a> ArrayView<'a> {
    pub(crate) fn new(data: &'a [u8], base: usize, shape: Vec<usize>, elem: FieldKind) -> Self {
        Self {
            data,
            geometry: ArrayGeometry { base, shape, elem },
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.geometry.shape
    }

    /// Length of the first dimension.
    pub fn len(&self) -> usize {
        self.geometry.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`; negative components count from the end.
    pub fn get(&self, index: &[isize]) -> Result<Value> {
        self.geometry.read(self.data, index)
    }

    /// Handle over a struct element at its place in the buffer.
    pub fn nested(&self, index: &[isize]) -> Result<StructRef<'a>> {
        let ty = Arc::clone(self.geometry.element_type()?);
        let offset = self.geometry.element_offset(index)?;
        Ok(StructRef::new(ty, self.data, offset, &EMPTY_STATE))
    }

    /// Copy of every element in row-major order.
    pub fn to_dense(&self) -> Result<DenseArray> {
        self.geometry.to_dense(self.data)
    }
}

/// Mutable view over an array field. Element writes never resize the field.
#[derive(Debug)]
pub struct ArrayViewMut<'a> {
    data: &'a mut Vec<u8>,
    geometry: ArrayGeometry,
}

impl<'a> ArrayViewMut<'a> {
    pub(crate) fn new(data: &'a mut Vec<u8>, base: usize, shape: Vec<usize>, elem: FieldKind) -> Self {
        Self {
            data,
            geometry: ArrayGeometry { base, shape, elem },
        }
    }

    pub fn view(&self) -> ArrayView<'_> {
        ArrayView {
            data: self.data.as_slice(),
            geometry: self.geometry.clone(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.geometry.shape
    }

    pub fn len(&self) -> usize {
        self.geometry.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: &[isize]) -> Result<Value> {
        self.geometry.read(self.data.as_slice(), index)
    }

    pub fn set(&mut self, index: &[isize], value: impl Into<Value>) -> Result<()> {
        let offset = self.geometry.element_offset(index)?;
        self.geometry.elem.write(self.data, offset, None, &value.into())
    }

    /// Mutable handle over a struct element, valid until the next access.
    pub fn nested_mut(&mut self, index: &[isize]) -> Result<StructMut<'_>> {
        let ty = Arc::clone(self.geometry.element_type()?);
        let offset = self.geometry.element_offset(index)?;
        Ok(StructMut::detached(ty, self.data, offset))
    }

    pub fn to_dense(&self) -> Result<DenseArray> {
        self.geometry.to_dense(self.data.as_slice())
    }
}

fn normalize(len: usize, index: isize) -> Result<usize> {
    flat_index(&[len], &[index])
}

/// Read-only view over a byte range field.
#[derive(Clone, Copy, Debug)]
pub struct ByteRangeView<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteRangeView<'a> {
    pub(crate) fn new(data: &'a [u8], offset: usize, len: usize) -> Result<Self> {
        check_bounds(offset, len, data.len())?;
        Ok(Self {
            bytes: &data[offset..offset + len],
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte at `index`; negative indices count from the end.
    pub fn get(&self, index: isize) -> Result<u8> {
        Ok(self.bytes[normalize(self.bytes.len(), index)?])
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

/// Mutable view over a byte range field. Writes never resize the field.
#[derive(Debug)]
pub struct ByteRangeViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> ByteRangeViewMut<'a> {
    pub(crate) fn new(data: &'a mut [u8], offset: usize, len: usize) -> Result<Self> {
        check_bounds(offset, len, data.len())?;
        Ok(Self {
            bytes: &mut data[offset..offset + len],
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: isize) -> Result<u8> {
        Ok(self.bytes[normalize(self.bytes.len(), index)?])
    }

    pub fn set(&mut self, index: isize, byte: u8) -> Result<()> {
        let i = normalize(self.bytes.len(), index)?;
        self.bytes[i] = byte;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}
