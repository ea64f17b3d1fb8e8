//! Encode or decode a single field outside of any declared struct.

use std::sync::Arc;

use crate::error::Result;
use crate::field::{Field, FieldKind};
use crate::instance::Struct;
use crate::layout::StructType;
use crate::value::Value;

const SCRATCH_FIELD: &str = "value";

fn scratch_type(field: &Field) -> Result<Arc<StructType>> {
    StructType::builder("packed")
        .field(SCRATCH_FIELD, field.clone())
        .build()
}

/// Encode `value` as `field` would store it.
///
/// The result covers the field's offset too, so a field placed at
/// `Offset::At(n)` yields `n` zero bytes before the value.
pub fn pack_value(value: impl Into<Value>, field: &Field) -> Result<Vec<u8>> {
    let ty = scratch_type(field)?;
    let mut scratch = Struct::new(&ty);
    scratch.set(SCRATCH_FIELD, value)?;
    Ok(scratch.into_bytes())
}

/// Decode `field` from `data`.
///
/// Dynamic byte ranges and strings take every byte from the field's offset to
/// the end of `data`; dynamic arrays take as many whole elements as fit.
pub fn unpack_bytes(data: impl AsRef<[u8]>, field: &Field) -> Result<Value> {
    let data = data.as_ref();
    let ty = scratch_type(field)?;
    let mut scratch = Struct::from_bytes(&ty, data);
    let remaining = data.len().saturating_sub(scratch.calc_offset(SCRATCH_FIELD)?);

    match field.kind() {
        FieldKind::Bytes { len: None } | FieldKind::Str { len: None, .. } => {
            scratch.resize(SCRATCH_FIELD, remaining, false)?;
        }
        FieldKind::Array { shape: None, elem } if elem.static_size() > 0 => {
            scratch.resize(SCRATCH_FIELD, remaining / elem.static_size(), false)?;
        }
        _ => {}
    }

    scratch.get(SCRATCH_FIELD)
}
