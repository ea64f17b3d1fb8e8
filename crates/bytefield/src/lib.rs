#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Declarative binary struct layouts, read and written in place.
//!
//! A [`StructType`] describes the fields of a binary record. A [`Struct`]
//! binds a type to a byte buffer; getting or setting a field decodes or
//! encodes it right at its offset in that buffer.
//!
//! Dynamic fields (byte ranges, strings and arrays without a fixed size,
//! nested structs containing them, variable fields) keep their current size
//! per instance. Offsets of the fields that follow them are resolved on every
//! access, and [`Struct::resize`] can splice the buffer so trailing data moves
//! along.
//!
//! ```
//! use bytefield::{Endianness, Field, Struct, StructType};
//!
//! let header = StructType::builder("Header")
//!     .field("magic", Field::bytes(4))
//!     .field("len", Field::u16().endian(Endianness::Little))
//!     .field("payload", Field::dyn_bytes())
//!     .build()?;
//!
//! let mut packet = Struct::new(&header);
//! packet.set("magic", b"BFLD")?;
//! packet.set("payload", vec![1u8, 2, 3])?;
//! packet.set("len", 3u16)?;
//!
//! assert_eq!(packet.size(), 9);
//! assert_eq!(packet.data(), b"BFLD\x03\x00\x01\x02\x03");
//! # Ok::<(), bytefield::Error>(())
//! ```

pub mod codec;
pub mod dump;
pub mod error;
pub mod field;
pub mod instance;
pub mod layout;
pub mod pack;
pub mod shape;
pub mod state;
pub mod value;
pub mod view;

#[cfg(test)]
mod instance_tests;
#[cfg(test)]
mod view_tests;

pub use codec::{Endianness, FloatWidth, IntWidth};
pub use dump::dump;
pub use error::{Error, ErrorKind, Result};
pub use field::{Field, FieldKind, Offset, Resize};
pub use instance::{Struct, StructMut, StructRef};
pub use layout::{FieldEntry, FieldId, FieldKey, ResolvedOffset, StructType, StructTypeBuilder};
pub use pack::{pack_value, unpack_bytes};
pub use state::{FieldState, InstanceState, VariableChild};
pub use value::{DenseArray, Value};
pub use view::{ArrayView, ArrayViewMut, ByteRangeView, ByteRangeViewMut};
