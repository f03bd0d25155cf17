//! Definition of logical fields used to build a [crate::schema::Schema].
//!
//! A record type is described as an ordered list of [Field]s; the order is the
//! wire order. Nothing here is validated: [crate::schema::Schema::compile]
//! checks the descriptor once and turns it into [crate::compiled] form.

use crate::{primitive::Endian, size::SizeExpr};

/// A single named field in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Name used by builders and readers to address the field.
    pub name: String,
    /// Shape of the field's encoding.
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            name: name.into(),
            kind,
        }
    }

    /// Unsigned integer field of `width` bytes in the enclosing struct's byte order.
    pub fn uint(name: impl Into<String>, width: usize) -> Self {
        Field::new(name, FieldKind::Primitive(PrimitiveSpec::unsigned(width)))
    }

    /// Signed integer field of `width` bytes in the enclosing struct's byte order.
    pub fn int(name: impl Into<String>, width: usize) -> Self {
        Field::new(name, FieldKind::Primitive(PrimitiveSpec::signed(width)))
    }
}

/// What a field is and how it is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Fixed-width integer.
    Primitive(PrimitiveSpec),
    /// Integer restricted to a set of named values.
    Enum(EnumSpec),
    /// Fixed-width vector of named flags.
    Mask(MaskSpec),
    /// Nested record.
    Struct(StructSpec),
    /// Fixed-count or capacity-bounded sequence.
    Array(ArraySpec),
    /// Tagged union: key followed by one variant's payload.
    View(ViewSpec),
    /// Integer fixed by the schema.
    Constant(ConstantSpec),
    /// Integer computed from a [SizeExpr] while serializing.
    DerivedSize(DerivedSpec),
}

/// Integer representation. `endian: None` inherits the enclosing struct's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveSpec {
    pub width: usize,
    pub signed: bool,
    pub endian: Option<Endian>,
}

impl PrimitiveSpec {
    pub fn unsigned(width: usize) -> Self {
        PrimitiveSpec {
            width,
            signed: false,
            endian: None,
        }
    }

    pub fn signed(width: usize) -> Self {
        PrimitiveSpec {
            width,
            signed: true,
            endian: None,
        }
    }

    /// Overrides the inherited byte order for this field only.
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }
}

/// Integer whose value must be one of the named variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSpec {
    pub repr: PrimitiveSpec,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub value: u64,
}

impl EnumSpec {
    pub fn new(repr: PrimitiveSpec) -> Self {
        EnumSpec {
            repr,
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, value: u64) -> Self {
        self.variants.push(EnumVariant {
            name: name.into(),
            value,
        });
        self
    }
}

/// Flag vector of `width` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSpec {
    pub width: usize,
    pub flags: Vec<FlagSpec>,
}

impl MaskSpec {
    pub fn new(width: usize) -> Self {
        MaskSpec {
            width,
            flags: Vec::new(),
        }
    }

    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }
}

/// One named flag, its bit (0 = MSB of the first byte) and its relations to other flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub bit: usize,
    /// Flags also set whenever this one is set.
    pub implies: Vec<String>,
    /// Flags cleared whenever this one is set.
    pub excludes: Vec<String>,
}

impl FlagSpec {
    pub fn new(name: impl Into<String>, bit: usize) -> Self {
        FlagSpec {
            name: name.into(),
            bit,
            implies: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn implies(mut self, flags: &[&str]) -> Self {
        self.implies.extend(flags.iter().map(|f| f.to_string()));
        self
    }

    pub fn excludes(mut self, flags: &[&str]) -> Self {
        self.excludes.extend(flags.iter().map(|f| f.to_string()));
        self
    }
}

/// Nested record. `endian: None` inherits the parent's byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSpec {
    pub fields: Vec<Field>,
    pub endian: Option<Endian>,
}

impl StructSpec {
    pub fn new(fields: Vec<Field>) -> Self {
        StructSpec {
            fields,
            endian: None,
        }
    }
}

/// Sequence of `element`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySpec {
    pub element: Box<FieldKind>,
    pub len: ArrayLen,
}

impl ArraySpec {
    /// Exactly `count` elements, no length prefix.
    pub fn fixed(element: FieldKind, count: usize) -> Self {
        ArraySpec {
            element: Box::new(element),
            len: ArrayLen::Fixed(count),
        }
    }

    /// Up to `max` elements, prefixed by a count encoded as `count`.
    pub fn bounded(element: FieldKind, max: usize, count: PrimitiveSpec) -> Self {
        ArraySpec {
            element: Box::new(element),
            len: ArrayLen::Bounded { max, count },
        }
    }
}

/// Number of elements in an array field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLen {
    Fixed(usize),
    Bounded { max: usize, count: PrimitiveSpec },
}

/// Tagged union: a key of representation `key` selects one of `variants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    pub key: PrimitiveSpec,
    pub variants: Vec<VariantSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSpec {
    pub name: String,
    pub key: u64,
    pub kind: FieldKind,
}

impl ViewSpec {
    pub fn new(key: PrimitiveSpec) -> Self {
        ViewSpec {
            key,
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, key: u64, kind: FieldKind) -> Self {
        self.variants.push(VariantSpec {
            name: name.into(),
            key,
            kind,
        });
        self
    }
}

/// Integer whose value is fixed at schema-authoring time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSpec {
    pub repr: PrimitiveSpec,
    pub value: u64,
}

/// Integer computed from sibling fields while serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSpec {
    pub repr: PrimitiveSpec,
    pub expr: SizeExpr,
}

#[cfg(feature = "serde")]
mod from_def {
    use super::*;
    use crate::serde::{
        ArrayLenDef, EndianDef, FieldDef, FieldKindDef, FlagDef, IntDef, SchemaDef, VariantDef,
    };

    impl From<EndianDef> for Endian {
        fn from(value: EndianDef) -> Self {
            match value {
                EndianDef::Big => Endian::Big,
                EndianDef::Little => Endian::Little,
            }
        }
    }

    impl From<IntDef> for PrimitiveSpec {
        fn from(value: IntDef) -> Self {
            PrimitiveSpec {
                width: value.width,
                signed: value.signed,
                endian: value.endian.map(Into::into),
            }
        }
    }

    impl From<FlagDef> for FlagSpec {
        fn from(value: FlagDef) -> Self {
            FlagSpec {
                name: value.name,
                bit: value.bit,
                implies: value.implies,
                excludes: value.excludes,
            }
        }
    }

    impl From<VariantDef> for VariantSpec {
        fn from(value: VariantDef) -> Self {
            VariantSpec {
                name: value.name,
                key: value.key,
                kind: value.kind.into(),
            }
        }
    }

    impl From<ArrayLenDef> for ArrayLen {
        fn from(value: ArrayLenDef) -> Self {
            match value {
                ArrayLenDef::Fixed { count } => ArrayLen::Fixed(count),
                ArrayLenDef::Bounded { max, count } => ArrayLen::Bounded {
                    max,
                    count: count.into(),
                },
            }
        }
    }

    impl From<FieldKindDef> for FieldKind {
        fn from(value: FieldKindDef) -> Self {
            match value {
                FieldKindDef::Int(int) => FieldKind::Primitive(int.into()),
                FieldKindDef::Enum { repr, variants } => FieldKind::Enum(EnumSpec {
                    repr: repr.into(),
                    variants: variants
                        .into_iter()
                        .map(|(name, value)| EnumVariant { name, value })
                        .collect(),
                }),
                FieldKindDef::Mask { width, flags } => FieldKind::Mask(MaskSpec {
                    width,
                    flags: flags.into_iter().map(Into::into).collect(),
                }),
                FieldKindDef::Struct { fields, endian } => FieldKind::Struct(StructSpec {
                    fields: fields.into_iter().map(Into::into).collect(),
                    endian: endian.map(Into::into),
                }),
                FieldKindDef::Array { element, len } => FieldKind::Array(ArraySpec {
                    element: Box::new((*element).into()),
                    len: len.into(),
                }),
                FieldKindDef::View { key, variants } => FieldKind::View(ViewSpec {
                    key: key.into(),
                    variants: variants.into_iter().map(Into::into).collect(),
                }),
                FieldKindDef::Constant { repr, value } => FieldKind::Constant(ConstantSpec {
                    repr: repr.into(),
                    value,
                }),
                FieldKindDef::DerivedSize { repr, expr } => FieldKind::DerivedSize(DerivedSpec {
                    repr: repr.into(),
                    expr: expr.into(),
                }),
            }
        }
    }

    impl From<FieldDef> for Field {
        fn from(value: FieldDef) -> Self {
            Field {
                name: value.name,
                kind: value.kind.into(),
            }
        }
    }

    impl From<SchemaDef> for StructSpec {
        fn from(value: SchemaDef) -> Self {
            StructSpec {
                fields: value.fields.into_iter().map(Into::into).collect(),
                endian: value.endian.map(Into::into),
            }
        }
    }
}
