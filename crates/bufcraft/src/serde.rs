//! JSON-deserializable schema description.
//!
//! These types describe the *shape* of a record. They are intended to be
//! loaded from a schema file (for example with `serde_json`) and then
//! converted into [crate::field] descriptors or compiled directly with
//! `Schema::try_from`.
//!
//! ```
//! use bufcraft::{schema::Schema, serde::SchemaDef};
//!
//! let def: SchemaDef = serde_json::from_str(
//!     r#"{ "fields": [ { "name": "id", "kind": { "type": "Int", "width": 2 } } ] }"#,
//! )
//! .unwrap();
//! let schema = Schema::try_from(def).unwrap();
//! assert_eq!(schema.fixed_width(), Some(2));
//! ```

use serde::{Deserialize, Serialize};

/// Byte order of a multi-byte integer.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum EndianDef {
    Big,
    Little,
}

/// Top-level schema definition: the fields of the root record.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchemaDef {
    /// Byte order inherited by every integer; big endian when absent.
    #[serde(default)]
    pub endian: Option<EndianDef>,
    pub fields: Vec<FieldDef>,
}

/// A single named field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKindDef,
}

/// Integer representation.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct IntDef {
    /// Width in bytes: 1, 2, 3, 4 or 8.
    pub width: usize,
    #[serde(default)]
    pub signed: bool,
    /// Overrides the inherited byte order.
    #[serde(default)]
    pub endian: Option<EndianDef>,
}

/// Kind of field in the schema.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum FieldKindDef {
    Int(IntDef),
    /// Integer restricted to named values, listed as `[name, value]` pairs.
    Enum {
        repr: IntDef,
        variants: Vec<(String, u64)>,
    },
    Mask {
        width: usize,
        flags: Vec<FlagDef>,
    },
    Struct {
        fields: Vec<FieldDef>,
        #[serde(default)]
        endian: Option<EndianDef>,
    },
    Array {
        element: Box<FieldKindDef>,
        len: ArrayLenDef,
    },
    View {
        key: IntDef,
        variants: Vec<VariantDef>,
    },
    Constant {
        repr: IntDef,
        value: u64,
    },
    /// Integer computed while serializing as the sum of `expr`.
    DerivedSize {
        repr: IntDef,
        expr: Vec<TermDef>,
    },
}

/// One flag of a mask. `bit` 0 is the most significant bit of the first byte.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FlagDef {
    pub name: String,
    pub bit: usize,
    #[serde(default)]
    pub implies: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// One variant of a view.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VariantDef {
    pub name: String,
    pub key: u64,
    pub kind: FieldKindDef,
}

/// Element count of an array.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ArrayLenDef {
    /// Exactly `count` elements, no prefix.
    Fixed { count: usize },
    /// Up to `max` elements behind a count prefix.
    Bounded { max: usize, count: IntDef },
}

/// One signed term of a size expression.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TermDef {
    /// Subtract instead of add.
    #[serde(default)]
    pub negate: bool,
    pub operand: OperandDef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum OperandDef {
    Const(u64),
    ValueOf(String),
    CountOf(String),
    SizeOf { from: String, to: String },
}
