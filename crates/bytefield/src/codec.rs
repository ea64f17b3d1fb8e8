//! Scalar codecs: integers, floats, booleans and text.
//!
//! Every codec works on a slice that is exactly the width of the encoded
//! value. Callers slice the buffer (and check bounds) before decoding.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

use crate::error::{Error, Result};

/// Byte order of a scalar field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Byte order of the target platform.
    #[default]
    Native,
    Little,
    Big,
}

impl Endianness {
    /// Resolve [`Endianness::Native`] to the byte order of the target.
    pub fn resolve(self) -> Self {
        match self {
            Self::Native if cfg!(target_endian = "big") => Self::Big,
            Self::Native => Self::Little,
            other => other,
        }
    }
}

/// Width of an integer or boolean field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IntWidth {
    W1 = 1,
    W2 = 2,
    W4 = 4,
    W8 = 8,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        self as usize
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::W1),
            2 => Some(Self::W2),
            4 => Some(Self::W4),
            8 => Some(Self::W8),
            _ => None,
        }
    }

    fn bits(self) -> u32 {
        8 * self as u32
    }
}

/// Width of a floating point field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

pub(crate) fn read_uint(bytes: &[u8], endian: Endianness) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    match endian.resolve() {
        Endianness::Big => {
            buf[8 - n..].copy_from_slice(&bytes[..n]);
            u64::from_be_bytes(buf)
        }
        _ => {
            buf[..n].copy_from_slice(&bytes[..n]);
            u64::from_le_bytes(buf)
        }
    }
}

/// Read a two's complement integer, sign-extending from the slice width.
pub(crate) fn read_int(bytes: &[u8], endian: Endianness) -> i64 {
    let raw = read_uint(bytes, endian);
    let shift = 64 - 8 * bytes.len().min(8) as u32;
    ((raw << shift) as i64) >> shift
}

/// Write the low `out.len()` bytes of `value`.
pub(crate) fn write_uint(out: &mut [u8], value: u64, endian: Endianness) {
    let n = out.len().min(8);
    match endian.resolve() {
        Endianness::Big => out[..n].copy_from_slice(&value.to_be_bytes()[8 - n..]),
        _ => out[..n].copy_from_slice(&value.to_le_bytes()[..n]),
    }
}

/// Range-check `value` against the integer type and return its raw bits.
pub(crate) fn encode_int(value: i128, width: IntWidth, signed: bool) -> Result<u64> {
    let bits = width.bits();
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };

    if value < min || value > max {
        return Err(Error::IntegerOutOfRange {
            value,
            width: width.bytes(),
            signedness: if signed { "signed" } else { "unsigned" },
        });
    }

    Ok(value as u64)
}

pub(crate) fn read_float(bytes: &[u8], width: FloatWidth, endian: Endianness) -> f64 {
    let raw = read_uint(bytes, endian);
    match width {
        FloatWidth::F32 => f64::from(f32::from_bits(raw as u32)),
        FloatWidth::F64 => f64::from_bits(raw),
    }
}

pub(crate) fn write_float(out: &mut [u8], value: f64, width: FloatWidth, endian: Endianness) {
    let raw = match width {
        FloatWidth::F32 => u64::from((value as f32).to_bits()),
        FloatWidth::F64 => value.to_bits(),
    };
    write_uint(out, raw, endian);
}

/// Decode `bytes` strictly: malformed input is an error, NULs are kept.
pub(crate) fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
        .ok_or(Error::Encoding {
            encoding: encoding.name(),
            op: "decode",
        })
}

/// Encode `text` strictly: unmappable characters are an error.
pub(crate) fn encode_text(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    // encoding_rs only decodes UTF-16, its encoder falls back to UTF-8.
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let (bytes, used, had_errors) = encoding.encode(text);
    if had_errors || used != encoding {
        return Err(Error::Encoding {
            encoding: encoding.name(),
            op: "encode",
        });
    }

    Ok(bytes.into_owned())
}
