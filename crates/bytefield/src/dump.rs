//! Human-readable rendering of struct instances and values.
//!
//! ```text
//! Header (10 bytes)
//!   magic: bytes[4] = [ 7F 45 4C 46 ]
//!   version: u16 = 3
//!   inner: struct Inner
//!     flag: bool = true
//! ```

use std::fmt;

use crate::error::Result;
use crate::field::FieldKind;
use crate::instance::{Struct, StructRef};
use crate::layout::FieldId;
use crate::shape::element_count;
use crate::state::FieldState;
use crate::value::{DenseArray, Value};

/// Bytes and array rows shown before the rest is summarized.
pub const DISPLAY_LIMIT: usize = 16;

const INDENT: &str = "  ";

/// Render every field of `view`, one per line, nested structs indented.
///
/// Fails if the struct overflows its buffer. Fields that cannot be read are
/// rendered with the error in place of the value.
pub fn dump(view: &StructRef<'_>) -> Result<String> {
    view.check_overflow()?;
    Ok(StructDump { view, depth: 0 }.to_string())
}

struct StructDump<'v, 'a> {
    view: &'v StructRef<'a>,
    depth: usize,
}

impl fmt::Display for StructDump<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.view.struct_type();
        if self.depth == 0 {
            writeln!(f, "{} ({} bytes)", ty.name(), self.view.size())?;
        }
        for (id, name, entry) in ty.fields() {
            self.field(f, id, name, entry.kind())?;
        }
        Ok(())
    }
}

impl StructDump<'_, '_> {
    fn field(&self, f: &mut fmt::Formatter<'_>, id: FieldId, name: &str, kind: &FieldKind) -> fmt::Result {
        let pad = INDENT.repeat(self.depth + 1);

        let (label, effective) = match (kind, self.view.field_state(id)) {
            (FieldKind::Variable, Some(FieldState::Variable(Some(child)))) => {
                (format!("variable({})", child.kind), &child.kind)
            }
            (FieldKind::Variable, _) => return writeln!(f, "{pad}{name}: variable = <no type>"),
            _ => (kind.to_string(), kind),
        };

        if let FieldKind::Struct { .. } = effective {
            return match self.view.nested(id) {
                Ok(inner) => {
                    writeln!(f, "{pad}{name}: {label}")?;
                    let nested = StructDump {
                        view: &inner,
                        depth: self.depth + 1,
                    };
                    write!(f, "{nested}")
                }
                Err(err) => writeln!(f, "{pad}{name}: {label} = [ reading error ({err}) ]"),
            };
        }

        match self.view.get(id) {
            Ok(value) => writeln!(f, "{pad}{name}: {label} = {value}"),
            Err(err) => writeln!(f, "{pad}{name}: {label} = [ reading error ({err}) ]"),
        }
    }
}

/// `[ DE AD BE EF ]`, at most [`DISPLAY_LIMIT`] bytes.
pub fn format_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "[ empty ]".to_owned();
    }
    let shown: Vec<String> = bytes
        .iter()
        .take(DISPLAY_LIMIT)
        .map(|b| format!("{b:02X}"))
        .collect();
    let mut out = format!("[ {}", shown.join(" "));
    if bytes.len() > DISPLAY_LIMIT {
        out.push_str(&format!("  ({} more bytes...)", bytes.len() - DISPLAY_LIMIT));
    }
    out.push_str(" ]");
    out
}

fn fmt_array(f: &mut fmt::Formatter<'_>, array: &DenseArray) -> fmt::Result {
    if array.is_empty() {
        return f.write_str("[ empty ]");
    }
    let rows = array.shape().first().copied().unwrap_or(0);
    fmt_rows(f, array.shape(), array.items(), Some(DISPLAY_LIMIT))?;
    if rows > DISPLAY_LIMIT {
        write!(f, "   ({} more items...)", rows - DISPLAY_LIMIT)?;
    }
    Ok(())
}

fn fmt_rows(f: &mut fmt::Formatter<'_>, shape: &[usize], items: &[Value], limit: Option<usize>) -> fmt::Result {
    let Some((&rows, inner)) = shape.split_first() else {
        return match items.first() {
            Some(item) => write!(f, "{item}"),
            None => Ok(()),
        };
    };
    let stride = element_count(inner);
    f.write_str("[")?;
    for (row, chunk) in items
        .chunks(stride.max(1))
        .take(rows.min(limit.unwrap_or(rows)))
        .enumerate()
    {
        if row > 0 {
            f.write_str(", ")?;
        }
        fmt_rows(f, inner, chunk, None)?;
    }
    f.write_str("]")
}

/// One-line form of a struct value: `Inner { a: 1, b: true }`.
fn fmt_struct_inline(f: &mut fmt::Formatter<'_>, value: &Struct) -> fmt::Result {
    let view = value.view();
    let ty = view.struct_type();
    write!(f, "{} {{", ty.name())?;
    for (i, (id, name, _)) in ty.fields().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        match view.get(id) {
            Ok(field) => write!(f, "{name}: {field}")?,
            Err(_) => write!(f, "{name}: ?")?,
        }
    }
    f.write_str(if ty.is_empty() { "}" } else { " }" })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => f.write_str(&format_bytes(v)),
            Self::Array(v) => fmt_array(f, v),
            Self::Struct(v) => fmt_struct_inline(f, v),
        }
    }
}
