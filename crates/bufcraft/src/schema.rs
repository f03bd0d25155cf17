//! Schema: compiled record layout used to build and read byte buffers.

use tracing::debug;

use crate::{
    builder::StructBuilder,
    compiled::CompiledStruct,
    errors::{CompileError, ReadError},
    field::{Field, StructSpec},
    primitive::Endian,
    reader::StructReader,
    value::Value,
};

/// A compiled schema. Use [Schema::compile] to build from [Field]s, then
/// [Schema::builder] to encode records and [Schema::reader] to decode them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    root: CompiledStruct,
}

impl Schema {
    /// Compiles a slice of [Field]s into a big-endian schema. Fails if the layout is invalid.
    pub fn compile(fields: &[Field]) -> Result<Self, CompileError> {
        Self::compile_with_endian(fields, Endian::Big)
    }

    /// Compiles `fields` with `endian` as the byte order inherited by every integer.
    pub fn compile_with_endian(fields: &[Field], endian: Endian) -> Result<Self, CompileError> {
        let root = CompiledStruct::compile(fields, endian)?;
        debug!(
            fields = root.fields.len(),
            static_fields = root.offsets.iter().filter(|o| o.is_some()).count(),
            fixed_width = ?root.fixed_width,
            "compiled schema"
        );

        Ok(Schema { root })
    }

    /// Compiles a root [StructSpec], honoring its byte order (big endian if unset).
    pub fn compile_struct(spec: &StructSpec) -> Result<Self, CompileError> {
        Self::compile_with_endian(&spec.fields, spec.endian.unwrap_or_default())
    }

    /// Compiled root struct.
    pub fn root(&self) -> &CompiledStruct {
        &self.root
    }

    /// Encoded length of every record, if it does not depend on the data.
    pub fn fixed_width(&self) -> Option<usize> {
        self.root.fixed_width
    }

    /// New builder with every field unset.
    pub fn builder(&self) -> StructBuilder<'_> {
        StructBuilder::new(&self.root)
    }

    /// Reader over a record starting at the front of `data`.
    pub fn reader<'a>(&self, data: &'a [u8]) -> StructReader<'a, '_> {
        self.reader_at(data, 0)
    }

    /// Reader over a record starting at `base` in `data`.
    pub fn reader_at<'a>(&self, data: &'a [u8], base: usize) -> StructReader<'a, '_> {
        StructReader::new(&self.root, data, base)
    }

    /// Decodes a whole record into an owned [Value::Struct].
    pub fn parse(&self, data: &[u8]) -> Result<Value, ReadError> {
        self.reader(data).to_value()
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::SchemaDef> for Schema {
    type Error = CompileError;

    fn try_from(value: crate::serde::SchemaDef) -> Result<Self, Self::Error> {
        Schema::compile_struct(&value.into())
    }
}
