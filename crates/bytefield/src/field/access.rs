//! Reading, writing and logical resizing of field values.

use std::sync::Arc;

use super::{FieldKind, Resize};
use crate::codec;
use crate::error::{Error, Result, check_bounds};
use crate::instance::{Struct, splice_region};
use crate::shape::element_count;
use crate::state::{EMPTY_STATE, FieldState, VariableChild};
use crate::value::{DenseArray, Value};

fn region(data: &[u8], offset: usize, size: usize) -> Result<&[u8]> {
    check_bounds(offset, size, data.len())?;
    Ok(&data[offset..offset + size])
}

fn region_mut(data: &mut [u8], offset: usize, size: usize) -> Result<&mut [u8]> {
    check_bounds(offset, size, data.len())?;
    Ok(&mut data[offset..offset + size])
}

impl FieldKind {
    /// Decode the field stored at `offset`.
    pub(crate) fn read(&self, data: &[u8], offset: usize, state: Option<&FieldState>) -> Result<Value> {
        match self {
            Self::Int {
                width,
                signed,
                endian,
            } => {
                let bytes = region(data, offset, width.bytes())?;
                Ok(if *signed {
                    Value::Int(codec::read_int(bytes, *endian))
                } else {
                    Value::UInt(codec::read_uint(bytes, *endian))
                })
            }
            Self::Float { width, endian } => {
                let bytes = region(data, offset, width.bytes())?;
                Ok(Value::Float(codec::read_float(bytes, *width, *endian)))
            }
            Self::Bool { width, endian } => {
                let bytes = region(data, offset, width.bytes())?;
                Ok(Value::Bool(codec::read_uint(bytes, *endian) != 0))
            }
            Self::Bytes { .. } => {
                let bytes = region(data, offset, self.size(state))?;
                Ok(Value::Bytes(bytes.to_vec()))
            }
            Self::Str { encoding, .. } => {
                let bytes = region(data, offset, self.size(state))?;
                Ok(Value::Str(codec::decode_text(bytes, *encoding)?))
            }
            Self::Array { elem, .. } => {
                let shape = self.current_shape(state);
                check_bounds(offset, self.size(state), data.len())?;
                let elem_size = elem.static_size();
                let items = (0..element_count(&shape))
                    .map(|i| elem.read(data, offset + i * elem_size, None))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(DenseArray::new(shape, items)?))
            }
            Self::Struct { ty } => {
                let inner = match state {
                    Some(FieldState::Nested(inner)) => inner,
                    _ => &EMPTY_STATE,
                };
                let bytes = region(data, offset, ty.logical_size(inner))?;
                Ok(Value::Struct(Struct::detached(
                    Arc::clone(ty),
                    bytes.to_vec(),
                    inner.clone(),
                )))
            }
            Self::Variable => match state {
                Some(FieldState::Variable(Some(child))) => {
                    child.kind.read(data, offset, child.state.as_ref())
                }
                _ => Err(Error::NoTypeAssigned),
            },
        }
    }

    /// Encode `value` into the field stored at `offset`.
    ///
    /// Dynamic fields with state adopt the natural size of the value, splicing
    /// the buffer when it differs. Without state the value must fit the
    /// field's current size.
    pub(crate) fn write(
        &self,
        data: &mut Vec<u8>,
        offset: usize,
        state: Option<&mut FieldState>,
        value: &Value,
    ) -> Result<()> {
        match (self, value) {
            (
                Self::Int {
                    width,
                    signed,
                    endian,
                },
                Value::Int(_) | Value::UInt(_),
            ) => {
                let wide = match *value {
                    Value::Int(v) => i128::from(v),
                    Value::UInt(v) => i128::from(v),
                    _ => return Err(self.mismatch(value)),
                };
                let raw = codec::encode_int(wide, *width, *signed)?;
                codec::write_uint(region_mut(data, offset, width.bytes())?, raw, *endian);
                Ok(())
            }
            (Self::Float { width, endian }, Value::Float(_) | Value::Int(_) | Value::UInt(_)) => {
                let v = match *value {
                    Value::Float(v) => v,
                    Value::Int(v) => v as f64,
                    Value::UInt(v) => v as f64,
                    _ => return Err(self.mismatch(value)),
                };
                codec::write_float(region_mut(data, offset, width.bytes())?, v, *width, *endian);
                Ok(())
            }
            (Self::Bool { width, endian }, Value::Bool(v)) => {
                let out = region_mut(data, offset, width.bytes())?;
                codec::write_uint(out, u64::from(*v), *endian);
                Ok(())
            }
            (Self::Bytes { len: Some(len) }, Value::Bytes(bytes)) => {
                if bytes.len() != *len {
                    return Err(Error::LengthMismatch {
                        expected: *len,
                        actual: bytes.len(),
                    });
                }
                region_mut(data, offset, *len)?.copy_from_slice(bytes);
                Ok(())
            }
            (Self::Bytes { len: None }, Value::Bytes(bytes)) => {
                write_run(data, offset, state, bytes)
            }
            (Self::Str { len, encoding }, Value::Str(text)) => {
                let encoded = codec::encode_text(text, *encoding)?;
                match len {
                    Some(len) => {
                        // Longer text is cut, shorter text leaves the tail untouched.
                        let out = region_mut(data, offset, *len)?;
                        let n = encoded.len().min(*len);
                        out[..n].copy_from_slice(&encoded[..n]);
                        Ok(())
                    }
                    None => write_run(data, offset, state, &encoded),
                }
            }
            (Self::Array { shape, elem }, Value::Array(array)) => {
                let elem_size = elem.static_size();
                let new = array.len() * elem_size;
                let prior = match (shape, &state) {
                    (None, Some(state)) => self.size(Some(&**state)),
                    _ => new,
                };
                // Encode every element before touching the buffer or the shape.
                let mut encoded: Vec<u8> = data.iter().skip(offset).take(prior.min(new)).copied().collect();
                encoded.resize(new, 0);
                for (i, item) in array.items().iter().enumerate() {
                    elem.write(&mut encoded, i * elem_size, None, item)?;
                }

                match (shape, state) {
                    (Some(shape), _) => {
                        if shape.as_slice() != array.shape() {
                            return Err(Error::ShapeMismatch {
                                expected: shape.clone(),
                                actual: array.shape().to_vec(),
                            });
                        }
                    }
                    (None, Some(state)) => {
                        splice_region(data, offset, prior, new)?;
                        *state = FieldState::Shape(array.shape().to_vec());
                    }
                    (None, None) => {
                        if array.shape() != [0] {
                            return Err(Error::ShapeMismatch {
                                expected: vec![0],
                                actual: array.shape().to_vec(),
                            });
                        }
                    }
                }
                region_mut(data, offset, new)?.copy_from_slice(&encoded);
                Ok(())
            }
            (Self::Struct { ty }, Value::Struct(src)) => {
                if !Arc::ptr_eq(ty, src.struct_type()) {
                    return Err(Error::StructTypeMismatch {
                        expected: ty.name().to_owned(),
                        found: src.struct_type().name().to_owned(),
                    });
                }
                let src_view = src.view();
                src_view.check_overflow()?;
                let new = src_view.size();
                let start = src.master_offset();
                let bytes = &src.data()[start..start + new];

                match state {
                    Some(state) => {
                        let old = self.size(Some(&*state));
                        splice_region(data, offset, old, new)?;
                        *state = FieldState::Nested(src.state().clone());
                    }
                    None => {
                        let old = ty.logical_size(&EMPTY_STATE);
                        if old != new {
                            return Err(Error::LengthMismatch {
                                expected: old,
                                actual: new,
                            });
                        }
                    }
                }
                region_mut(data, offset, new)?.copy_from_slice(bytes);
                Ok(())
            }
            (Self::Variable, _) => match state {
                Some(FieldState::Variable(Some(child))) => {
                    let VariableChild { kind, state } = &mut **child;
                    kind.write(data, offset, state.as_mut(), value)
                }
                _ => Err(Error::NoTypeAssigned),
            },
            _ => Err(self.mismatch(value)),
        }
    }

    /// Apply `spec` to the field's state without touching the buffer.
    pub(crate) fn resize(&self, state: &mut FieldState, spec: Resize) -> Result<()> {
        let next = match (self, spec) {
            (Self::Bytes { len: None } | Self::Str { len: None, .. }, Resize::Len(n)) => {
                FieldState::Len(n)
            }
            (Self::Array { shape: None, .. }, Resize::Len(n)) => FieldState::Shape(vec![n]),
            (Self::Array { shape: None, .. }, Resize::Shape(shape)) if !shape.is_empty() => {
                FieldState::Shape(shape)
            }
            (Self::Variable, Resize::Type(field)) => {
                let (kind, _) = field.into_parts();
                kind.validate()?;
                FieldState::Variable(Some(Box::new(VariableChild {
                    state: kind.initial_state(),
                    kind,
                })))
            }
            (_, spec) => {
                return Err(Error::InvalidResize {
                    kind: self.to_string(),
                    spec: spec.describe(),
                });
            }
        };
        *state = next;
        Ok(())
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::TypeMismatch {
            field: self.to_string(),
            value: value.kind_name(),
        }
    }
}

/// Write a variable-length run, resizing the field to the run's length.
fn write_run(
    data: &mut Vec<u8>,
    offset: usize,
    state: Option<&mut FieldState>,
    bytes: &[u8],
) -> Result<()> {
    match state {
        Some(state) => {
            let old = match state {
                FieldState::Len(n) => *n,
                _ => 0,
            };
            splice_region(data, offset, old, bytes.len())?;
            *state = FieldState::Len(bytes.len());
        }
        None if !bytes.is_empty() => {
            return Err(Error::LengthMismatch {
                expected: 0,
                actual: bytes.len(),
            });
        }
        None => {}
    }
    region_mut(data, offset, bytes.len())?.copy_from_slice(bytes);
    Ok(())
}
