//! Validated descriptor tree produced by [crate::schema::Schema::compile].
//!
//! Compilation resolves inherited byte orders, turns names into indices,
//! rejects every configuration error and records static offsets for the
//! fixed-width prefix of each struct.

use crate::{
    enumeration::CompiledEnum,
    errors::CompileError,
    field::{ArrayLen, Field, FieldKind, PrimitiveSpec},
    mask::CompiledMask,
    planner,
    primitive::{Endian, Primitive},
    size::CompiledExpr,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledField {
    pub name: String,
    pub kind: CompiledKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledKind {
    Primitive(Primitive),
    Enum(CompiledEnum),
    Mask(CompiledMask),
    Struct(CompiledStruct),
    Array(CompiledArray),
    View(CompiledView),
    Constant(Constant),
    Derived(CompiledDerived),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStruct {
    pub fields: Vec<CompiledField>,
    /// Offset of each field from the struct start, `None` once a variable-width field precedes it.
    pub offsets: Vec<Option<usize>>,
    pub fixed_width: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArray {
    pub element: Box<CompiledKind>,
    pub len: CompiledLen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompiledLen {
    Fixed(usize),
    Bounded { max: usize, count: Primitive },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledView {
    pub key: Primitive,
    pub variants: Vec<CompiledVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledVariant {
    pub name: String,
    pub key: u64,
    pub kind: CompiledKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    pub repr: Primitive,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDerived {
    pub repr: Primitive,
    pub expr: CompiledExpr,
}

impl CompiledView {
    pub fn index_of_key(&self, key: u64) -> Option<usize> {
        self.variants.iter().position(|v| v.key == key)
    }

    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.name == name)
    }

    /// Width shared by every variant's payload, `None` if they differ.
    pub fn payload_width(&self) -> Option<usize> {
        let first = self.variants.first()?.kind.fixed_width()?;
        self.variants
            .iter()
            .all(|variant| variant.kind.fixed_width() == Some(first))
            .then_some(first)
    }
}

impl CompiledStruct {
    /// Compiles the fields of one struct. `endian` is the order fields inherit.
    pub fn compile(fields: &[Field], endian: Endian) -> Result<Self, CompileError> {
        for (i, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(CompileError::EmptyName);
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(CompileError::DuplicateName(field.name.clone()));
            }
        }

        let mut compiled = Vec::with_capacity(fields.len());
        for field in fields {
            compiled.push(CompiledField {
                name: field.name.clone(),
                kind: CompiledKind::compile(&field.name, &field.kind, Some(fields), endian)?,
            });
        }

        for field in &compiled {
            if let CompiledKind::Derived(derived) = &field.kind {
                if let Some(value) = derived.expr.static_value(&compiled) {
                    if !derived.repr.fits(value) {
                        return Err(CompileError::SizeExceedsWidth {
                            field: field.name.clone(),
                            value,
                            max: derived.repr.max_value() as u64,
                        });
                    }
                }
            }
        }

        let (offsets, fixed_width) = planner::static_offsets(&compiled)?;

        Ok(CompiledStruct {
            fields: compiled,
            offsets,
            fixed_width,
        })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

fn resolve(spec: &PrimitiveSpec, endian: Endian) -> Result<Primitive, CompileError> {
    Primitive::new(spec.width, spec.signed, spec.endian.unwrap_or(endian))
}

impl CompiledKind {
    /// Compiles one field kind. `siblings` is the enclosing struct's descriptor,
    /// `None` for array elements and view variants.
    pub fn compile(
        name: &str,
        kind: &FieldKind,
        siblings: Option<&[Field]>,
        endian: Endian,
    ) -> Result<Self, CompileError> {
        match kind {
            FieldKind::Primitive(spec) => Ok(CompiledKind::Primitive(resolve(spec, endian)?)),
            FieldKind::Enum(spec) => Ok(CompiledKind::Enum(CompiledEnum::compile(
                name,
                spec,
                resolve(&spec.repr, endian)?,
            )?)),
            FieldKind::Mask(spec) => Ok(CompiledKind::Mask(CompiledMask::try_from(spec)?)),
            FieldKind::Struct(spec) => Ok(CompiledKind::Struct(CompiledStruct::compile(
                &spec.fields,
                spec.endian.unwrap_or(endian),
            )?)),
            FieldKind::Array(spec) => {
                let len = match &spec.len {
                    ArrayLen::Fixed(count) => {
                        if *count == 0 {
                            return Err(CompileError::InvalidArrayCount(name.to_string()));
                        }
                        CompiledLen::Fixed(*count)
                    }
                    ArrayLen::Bounded { max, count } => {
                        if *max == 0 {
                            return Err(CompileError::InvalidArrayCount(name.to_string()));
                        }
                        let count = resolve(count, endian)?;
                        if !count.fits(*max as i128) {
                            return Err(CompileError::CapacityOutOfDomain {
                                max: *max,
                                width: count.width,
                            });
                        }
                        CompiledLen::Bounded { max: *max, count }
                    }
                };

                let element = CompiledKind::compile(name, &spec.element, None, endian)?;
                if let (CompiledLen::Fixed(count), Some(width)) = (len, element.fixed_width()) {
                    if width.checked_mul(count).is_none() {
                        return Err(CompileError::LayoutTooLarge(name.to_string()));
                    }
                }

                Ok(CompiledKind::Array(CompiledArray {
                    element: Box::new(element),
                    len,
                }))
            }
            FieldKind::View(spec) => {
                if spec.variants.is_empty() {
                    return Err(CompileError::EmptyView(name.to_string()));
                }

                let key = resolve(&spec.key, endian)?;
                let mut variants: Vec<CompiledVariant> = Vec::with_capacity(spec.variants.len());
                for variant in &spec.variants {
                    if variant.name.is_empty() {
                        return Err(CompileError::EmptyName);
                    }
                    if !key.fits(variant.key as i128) {
                        return Err(CompileError::VariantKeyOutOfDomain {
                            key: variant.key,
                            width: key.width,
                        });
                    }
                    if variants.iter().any(|v| v.key == variant.key) {
                        return Err(CompileError::DuplicateVariantKey(variant.key));
                    }
                    if variants.iter().any(|v| v.name == variant.name) {
                        return Err(CompileError::DuplicateName(variant.name.clone()));
                    }

                    variants.push(CompiledVariant {
                        name: variant.name.clone(),
                        key: variant.key,
                        kind: CompiledKind::compile(&variant.name, &variant.kind, None, endian)?,
                    });
                }

                let view = CompiledView { key, variants };
                if let Some(width) = view.payload_width() {
                    if width.checked_add(key.width).is_none() {
                        return Err(CompileError::LayoutTooLarge(name.to_string()));
                    }
                }

                Ok(CompiledKind::View(view))
            }
            FieldKind::Constant(spec) => {
                let repr = resolve(&spec.repr, endian)?;
                if !repr.fits(spec.value as i128) {
                    return Err(CompileError::ValueOutOfRange {
                        value: spec.value,
                        width: repr.width,
                    });
                }
                Ok(CompiledKind::Constant(Constant {
                    repr,
                    value: spec.value,
                }))
            }
            FieldKind::DerivedSize(spec) => {
                let siblings =
                    siblings.ok_or_else(|| CompileError::DetachedSize(name.to_string()))?;
                Ok(CompiledKind::Derived(CompiledDerived {
                    repr: resolve(&spec.repr, endian)?,
                    expr: CompiledExpr::compile(&spec.expr, siblings)?,
                }))
            }
        }
    }

    /// Encoded width if it does not depend on the data.
    ///
    /// Compilation rejects layouts whose width overflows `usize`, so the
    /// arithmetic here cannot wrap for a compiled kind.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            CompiledKind::Primitive(p) => Some(p.width),
            CompiledKind::Enum(e) => Some(e.repr.width),
            CompiledKind::Mask(m) => Some(m.width),
            CompiledKind::Struct(s) => s.fixed_width,
            CompiledKind::Array(a) => match a.len {
                CompiledLen::Fixed(count) => a.element.fixed_width().map(|w| w * count),
                CompiledLen::Bounded { .. } => None,
            },
            CompiledKind::View(v) => v.payload_width().map(|w| v.key.width + w),
            CompiledKind::Constant(c) => Some(c.repr.width),
            CompiledKind::Derived(d) => Some(d.repr.width),
        }
    }
}
