//! # bufcraft
//!
//! Schema-driven binary layouts over byte buffers.
//!
//! Describe a record as an ordered list of fields (integers with a chosen
//! byte order, enums, flag masks, nested structs, fixed or bounded arrays,
//! tagged views, constants and derived size fields), compile it once, then
//! encode records with a checked builder and decode them with lazy,
//! zero-copy readers.
//!
//! ## Example
//!
//! ```
//! use bufcraft::field::{ArraySpec, DerivedSpec, Field, FieldKind, PrimitiveSpec};
//! use bufcraft::schema::Schema;
//! use bufcraft::size::{Operand, SizeExpr};
//!
//! let fields = vec![
//!     Field::new(
//!         "len",
//!         FieldKind::DerivedSize(DerivedSpec {
//!             repr: PrimitiveSpec::unsigned(1),
//!             expr: SizeExpr::new().plus(Operand::size_of("payload")),
//!         }),
//!     ),
//!     Field::new(
//!         "payload",
//!         FieldKind::Array(ArraySpec::bounded(
//!             FieldKind::Primitive(PrimitiveSpec::unsigned(2)),
//!             8,
//!             PrimitiveSpec::unsigned(1),
//!         )),
//!     ),
//!     Field::uint("crc", 1),
//! ];
//! let schema = Schema::compile(&fields).unwrap();
//!
//! let mut builder = schema.builder();
//! builder.array("payload").unwrap().push_value(0x0102).unwrap();
//! builder.with("crc", 0xaa).unwrap();
//! let bytes = builder.to_vec().unwrap();
//! assert_eq!(bytes, vec![3, 1, 0x01, 0x02, 0xaa]);
//!
//! let reader = schema.reader(&bytes);
//! assert_eq!(reader.get_u64("len"), Ok(3));
//! assert_eq!(reader.array("payload").unwrap().get(0).unwrap().as_u64(), Ok(0x0102));
//! assert_eq!(reader.get_u64("crc"), Ok(0xaa));
//! ```

pub mod bits;
pub mod builder;
pub mod compiled;
pub mod cursor;
pub mod enumeration;
pub mod errors;
pub mod field;
pub mod mask;
pub mod planner;
pub mod primitive;
pub mod reader;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;
pub mod size;
pub mod value;

pub use errors::{CompileError, ReadError, WriteError};
pub use schema::Schema;
pub use value::Value;
