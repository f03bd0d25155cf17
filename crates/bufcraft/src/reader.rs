//! Zero-copy, schema-checked access to encoded records.
//!
//! Readers borrow the buffer and the compiled schema and decode on demand.
//! Offsets of fields behind variable-width siblings are found by walking the
//! sizes actually encoded in the buffer, so a reader never trusts a length it
//! has not checked against the data present.

use std::{collections::BTreeMap, ops::Range};

use crate::{
    compiled::{CompiledArray, CompiledKind, CompiledLen, CompiledStruct, CompiledView},
    errors::ReadError,
    mask::MaskReader,
    planner,
    value::Value,
};

/// Reader for a struct starting at `base`.
#[derive(Debug, Clone, Copy)]
pub struct StructReader<'a, 's> {
    schema: &'s CompiledStruct,
    data: &'a [u8],
    base: usize,
}

/// Reader for one field, array element or view payload.
#[derive(Debug, Clone, Copy)]
pub struct ValueReader<'a, 's> {
    name: &'s str,
    kind: &'s CompiledKind,
    data: &'a [u8],
    offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ArrayReader<'a, 's> {
    name: &'s str,
    array: &'s CompiledArray,
    data: &'a [u8],
    offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewReader<'a, 's> {
    name: &'s str,
    view: &'s CompiledView,
    data: &'a [u8],
    offset: usize,
}

impl<'a, 's> StructReader<'a, 's> {
    pub fn new(schema: &'s CompiledStruct, data: &'a [u8], base: usize) -> Self {
        StructReader { schema, data, base }
    }

    /// Reader for the member `name`.
    pub fn field(&self, name: &str) -> Result<ValueReader<'a, 's>, ReadError> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| ReadError::UnknownField(name.to_string()))?;
        let field = &self.schema.fields[index];
        let offset = planner::field_offset(self.schema, index, self.data, self.base)?;

        Ok(ValueReader::new(&field.name, &field.kind, self.data, offset))
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, ReadError> {
        self.field(name)?.as_u64()
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, ReadError> {
        self.field(name)?.as_i64()
    }

    pub fn get_enum(&self, name: &str) -> Result<&'s str, ReadError> {
        self.field(name)?.as_enum()
    }

    pub fn get_flag(&self, name: &str, flag: &str) -> Result<bool, ReadError> {
        self.mask(name)?.get(flag)
    }

    pub fn mask(&self, name: &str) -> Result<MaskReader<'a, 's>, ReadError> {
        self.field(name)?.as_mask()
    }

    pub fn nested(&self, name: &str) -> Result<StructReader<'a, 's>, ReadError> {
        self.field(name)?.as_struct()
    }

    pub fn array(&self, name: &str) -> Result<ArrayReader<'a, 's>, ReadError> {
        self.field(name)?.as_array()
    }

    pub fn view(&self, name: &str) -> Result<ViewReader<'a, 's>, ReadError> {
        self.field(name)?.as_view()
    }

    /// Encoded length of the whole struct as found in the buffer.
    pub fn size(&self) -> Result<usize, ReadError> {
        if let Some(width) = self.schema.fixed_width {
            return Ok(width);
        }

        let mut pos = self.base;
        for field in &self.schema.fields {
            let len = planner::encoded_len(&field.kind, self.data, pos)?;
            pos = planner::advance(pos, len, self.data)?;
        }

        Ok(pos - self.base)
    }

    /// Absolute byte range occupied by the member `name`.
    pub fn span_of(&self, name: &str) -> Result<Range<usize>, ReadError> {
        let field = self.field(name)?;
        let len = field.encoded_len()?;

        Ok(field.offset..planner::advance(field.offset, len, self.data)?)
    }

    /// Decodes every member into an owned [Value::Struct].
    pub fn to_value(&self) -> Result<Value, ReadError> {
        let mut map = BTreeMap::new();
        let mut pos = self.base;
        for field in &self.schema.fields {
            let reader = ValueReader::new(&field.name, &field.kind, self.data, pos);
            map.insert(field.name.clone(), reader.to_value()?);
            pos = planner::advance(pos, reader.encoded_len()?, self.data)?;
        }

        Ok(Value::Struct(map))
    }
}

impl<'a, 's> ValueReader<'a, 's> {
    pub fn new(name: &'s str, kind: &'s CompiledKind, data: &'a [u8], offset: usize) -> Self {
        ValueReader {
            name,
            kind,
            data,
            offset,
        }
    }

    pub fn name(&self) -> &'s str {
        self.name
    }

    pub fn kind(&self) -> &'s CompiledKind {
        self.kind
    }

    /// Absolute offset of the value in the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn wrong_kind(&self) -> ReadError {
        ReadError::WrongKind(self.name.to_string())
    }

    /// Raw stored integer of a primitive, enum, constant or size field.
    fn raw(&self) -> Result<u64, ReadError> {
        let repr = match self.kind {
            CompiledKind::Primitive(repr) => repr,
            CompiledKind::Enum(e) => &e.repr,
            CompiledKind::Constant(constant) => &constant.repr,
            CompiledKind::Derived(derived) => &derived.repr,
            _ => return Err(self.wrong_kind()),
        };

        repr.read(self.data, self.offset)
    }

    /// Integer value, zero-extended. Signed fields must hold a non-negative value.
    pub fn as_u64(&self) -> Result<u64, ReadError> {
        let value = self.numeric()?;
        u64::try_from(value).map_err(|_| self.wrong_kind())
    }

    /// Integer value, sign-extended for signed fields.
    pub fn as_i64(&self) -> Result<i64, ReadError> {
        let value = self.numeric()?;
        i64::try_from(value).map_err(|_| self.wrong_kind())
    }

    fn numeric(&self) -> Result<i128, ReadError> {
        let raw = self.raw()?;
        Ok(match self.kind {
            CompiledKind::Primitive(repr) => repr.from_raw(raw),
            CompiledKind::Derived(derived) => derived.repr.from_raw(raw),
            _ => raw as i128,
        })
    }

    /// Name of the stored enum variant.
    pub fn as_enum(&self) -> Result<&'s str, ReadError> {
        let kind: &'s CompiledKind = self.kind;
        let CompiledKind::Enum(e) = kind else {
            return Err(self.wrong_kind());
        };
        let raw = self.raw()?;

        e.name_of(raw).ok_or(ReadError::UnknownEnumValue(raw))
    }

    pub fn as_mask(&self) -> Result<MaskReader<'a, 's>, ReadError> {
        match self.kind {
            CompiledKind::Mask(mask) => Ok(MaskReader::new(mask, self.data, self.offset)),
            _ => Err(self.wrong_kind()),
        }
    }

    pub fn as_struct(&self) -> Result<StructReader<'a, 's>, ReadError> {
        match self.kind {
            CompiledKind::Struct(st) => Ok(StructReader::new(st, self.data, self.offset)),
            _ => Err(self.wrong_kind()),
        }
    }

    pub fn as_array(&self) -> Result<ArrayReader<'a, 's>, ReadError> {
        match self.kind {
            CompiledKind::Array(array) => Ok(ArrayReader {
                name: self.name,
                array,
                data: self.data,
                offset: self.offset,
            }),
            _ => Err(self.wrong_kind()),
        }
    }

    pub fn as_view(&self) -> Result<ViewReader<'a, 's>, ReadError> {
        match self.kind {
            CompiledKind::View(view) => Ok(ViewReader {
                name: self.name,
                view,
                data: self.data,
                offset: self.offset,
            }),
            _ => Err(self.wrong_kind()),
        }
    }

    /// Encoded length of the value as found in the buffer.
    pub fn encoded_len(&self) -> Result<usize, ReadError> {
        planner::encoded_len(self.kind, self.data, self.offset)
    }

    /// Decodes the value into an owned [Value].
    pub fn to_value(&self) -> Result<Value, ReadError> {
        match self.kind {
            CompiledKind::Primitive(repr) if repr.signed => Ok(Value::I64(self.as_i64()?)),
            CompiledKind::Derived(derived) if derived.repr.signed => Ok(Value::I64(self.as_i64()?)),
            CompiledKind::Primitive(_) | CompiledKind::Constant(_) | CompiledKind::Derived(_) => {
                Ok(Value::U64(self.raw()?))
            }
            CompiledKind::Enum(_) => Ok(Value::Enum(self.as_enum()?.to_string())),
            CompiledKind::Mask(_) => Ok(Value::Mask(
                self.as_mask()?
                    .flags()?
                    .into_iter()
                    .map(|(name, on)| (name.to_string(), on))
                    .collect(),
            )),
            CompiledKind::Struct(_) => self.as_struct()?.to_value(),
            CompiledKind::Array(_) => Ok(Value::Array(
                self.as_array()?
                    .iter()?
                    .map(|element| element.and_then(|e| e.to_value()))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            CompiledKind::View(_) => {
                let (key, payload) = self.as_view()?.active()?;
                Ok(Value::View {
                    key,
                    variant: payload.name().to_string(),
                    value: Box::new(payload.to_value()?),
                })
            }
        }
    }
}

impl<'a, 's> ArrayReader<'a, 's> {
    fn prefix(&self) -> usize {
        match self.array.len {
            CompiledLen::Fixed(_) => 0,
            CompiledLen::Bounded { count, .. } => count.width,
        }
    }

    /// The fixed length, or the count stored in the buffer.
    pub fn len(&self) -> Result<usize, ReadError> {
        match self.array.len {
            CompiledLen::Fixed(count) => Ok(count),
            CompiledLen::Bounded { max, count } => {
                planner::read_count(max, &count, self.data, self.offset)
            }
        }
    }

    pub fn is_empty(&self) -> Result<bool, ReadError> {
        Ok(self.len()? == 0)
    }

    /// Reader for element `index`.
    pub fn get(&self, index: usize) -> Result<ValueReader<'a, 's>, ReadError> {
        let len = self.len()?;
        if index >= len {
            return Err(ReadError::IndexOutOfRange { index, len });
        }

        let start = planner::advance(self.offset, self.prefix(), self.data)?;
        let offset = match self.array.element.fixed_width() {
            Some(width) => {
                let skip = index.checked_mul(width).unwrap_or(usize::MAX);
                planner::advance(start, skip, self.data)?
            }
            None => {
                let mut pos = start;
                for _ in 0..index {
                    let len = planner::encoded_len(&self.array.element, self.data, pos)?;
                    pos = planner::advance(pos, len, self.data)?;
                }
                pos
            }
        };

        Ok(ValueReader::new(self.name, &self.array.element, self.data, offset))
    }

    /// Readers for every element, in order.
    pub fn iter(&self) -> Result<ArrayIter<'a, 's>, ReadError> {
        Ok(ArrayIter {
            reader: *self,
            remaining: self.len()?,
            pos: planner::advance(self.offset, self.prefix(), self.data)?,
        })
    }
}

/// Iterator over the elements of an [ArrayReader].
#[derive(Debug, Clone)]
pub struct ArrayIter<'a, 's> {
    reader: ArrayReader<'a, 's>,
    remaining: usize,
    pos: usize,
}

impl<'a, 's> Iterator for ArrayIter<'a, 's> {
    type Item = Result<ValueReader<'a, 's>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let array: &'s CompiledArray = self.reader.array;
        let element = ValueReader::new(self.reader.name, &array.element, self.reader.data, self.pos);
        match element
            .encoded_len()
            .and_then(|len| planner::advance(self.pos, len, self.reader.data))
        {
            Ok(next) => {
                self.pos = next;
                Some(Ok(element))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

impl<'a, 's> ViewReader<'a, 's> {
    /// Stored key. Fails with [ReadError::NotDeserializedYet] if the buffer ends before the view.
    pub fn key(&self) -> Result<u64, ReadError> {
        if self.offset >= self.data.len() {
            return Err(ReadError::NotDeserializedYet(self.name.to_string()));
        }

        self.view.key.read(self.data, self.offset)
    }

    fn payload(&self, index: usize) -> Result<ValueReader<'a, 's>, ReadError> {
        let view: &'s CompiledView = self.view;
        let variant = &view.variants[index];
        Ok(ValueReader::new(
            &variant.name,
            &variant.kind,
            self.data,
            planner::advance(self.offset, view.key.width, self.data)?,
        ))
    }

    /// Payload of the variant with `key`, which must be the stored one.
    pub fn read_as(&self, key: u64) -> Result<ValueReader<'a, 's>, ReadError> {
        let index = self
            .view
            .index_of_key(key)
            .ok_or(ReadError::UnknownVariant(key))?;
        let stored = self.key()?;
        if stored != key {
            if self.view.index_of_key(stored).is_none() {
                return Err(ReadError::UnknownVariant(stored));
            }
            return Err(ReadError::WrongVariant {
                requested: key,
                stored,
            });
        }

        self.payload(index)
    }

    /// Same as [ViewReader::read_as], addressing the variant by name.
    pub fn read_named(&self, name: &str) -> Result<ValueReader<'a, 's>, ReadError> {
        let index = self
            .view
            .index_of_name(name)
            .ok_or_else(|| ReadError::UnknownVariantName(name.to_string()))?;
        self.read_as(self.view.variants[index].key)
    }

    /// Stored key and the payload of the variant it selects.
    pub fn active(&self) -> Result<(u64, ValueReader<'a, 's>), ReadError> {
        let key = self.key()?;
        let index = self
            .view
            .index_of_key(key)
            .ok_or(ReadError::UnknownVariant(key))?;

        Ok((key, self.payload(index)?))
    }
}
