//! Integers restricted to a set of named values.

use crate::{errors::CompileError, field::EnumSpec, primitive::Primitive};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEnum {
    pub repr: Primitive,
    pub variants: Vec<(String, u64)>,
}

impl CompiledEnum {
    /// Validates `spec` with its representation already resolved to `repr`.
    pub fn compile(name: &str, spec: &EnumSpec, repr: Primitive) -> Result<Self, CompileError> {
        if spec.variants.is_empty() {
            return Err(CompileError::EmptyEnum(name.to_string()));
        }

        let mut variants: Vec<(String, u64)> = Vec::with_capacity(spec.variants.len());
        for variant in &spec.variants {
            if variant.name.is_empty() {
                return Err(CompileError::EmptyName);
            }
            if !repr.fits(variant.value as i128) {
                return Err(CompileError::ValueOutOfRange {
                    value: variant.value,
                    width: repr.width,
                });
            }
            if variants.iter().any(|(n, _)| *n == variant.name) {
                return Err(CompileError::DuplicateName(variant.name.clone()));
            }
            if variants.iter().any(|(_, v)| *v == variant.value) {
                return Err(CompileError::DuplicateEnumValue(variant.value));
            }
            variants.push((variant.name.clone(), variant.value));
        }

        Ok(CompiledEnum { repr, variants })
    }

    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: u64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}
