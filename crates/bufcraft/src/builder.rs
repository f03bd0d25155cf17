//! Typed, schema-checked construction of records.
//!
//! A [StructBuilder] holds one [ValueBuilder] per field. Values are checked
//! against their declared width as they are set, so an out-of-range value is
//! rejected at the call site and never truncated on the wire. Constants and
//! derived size fields are filled in by [StructBuilder::serialize].

use tracing::{debug, trace};

use crate::{
    compiled::{CompiledArray, CompiledDerived, CompiledKind, CompiledLen, CompiledStruct, CompiledView},
    cursor::Cursor,
    errors::WriteError,
    mask::MaskBuilder,
    primitive::Primitive,
    size::CompiledOperand,
};

/// Builder for one struct: the root record or a nested member.
#[derive(Debug, Clone)]
pub struct StructBuilder<'s> {
    schema: &'s CompiledStruct,
    slots: Vec<ValueBuilder<'s>>,
}

/// Builder for a single field, array element or view payload.
#[derive(Debug, Clone)]
pub struct ValueBuilder<'s> {
    name: &'s str,
    kind: &'s CompiledKind,
    state: Slot<'s>,
}

#[derive(Debug, Clone)]
enum Slot<'s> {
    /// Raw bit pattern of an integer or enum.
    Scalar(Option<u64>),
    Mask(MaskBuilder<'s>),
    Struct(StructBuilder<'s>),
    Array(ArrayBuilder<'s>),
    View(ViewBuilder<'s>),
    /// Constant or derived, filled in while serializing.
    Computed,
}

/// Builder for a fixed or bounded array.
#[derive(Debug, Clone)]
pub struct ArrayBuilder<'s> {
    name: &'s str,
    array: &'s CompiledArray,
    elements: Vec<ValueBuilder<'s>>,
}

/// Builder for a view. Holds at most one selected variant.
#[derive(Debug, Clone)]
pub struct ViewBuilder<'s> {
    name: &'s str,
    view: &'s CompiledView,
    selected: Option<(usize, Box<ValueBuilder<'s>>)>,
}

impl<'s> ValueBuilder<'s> {
    pub(crate) fn new(name: &'s str, kind: &'s CompiledKind) -> Self {
        let state = match kind {
            CompiledKind::Primitive(_) | CompiledKind::Enum(_) => Slot::Scalar(None),
            CompiledKind::Mask(mask) => Slot::Mask(MaskBuilder::new(mask)),
            CompiledKind::Struct(st) => Slot::Struct(StructBuilder::new(st)),
            CompiledKind::Array(array) => Slot::Array(ArrayBuilder::new(name, array)),
            CompiledKind::View(view) => Slot::View(ViewBuilder::new(name, view)),
            CompiledKind::Constant(_) | CompiledKind::Derived(_) => Slot::Computed,
        };

        ValueBuilder { name, kind, state }
    }

    pub fn name(&self) -> &'s str {
        self.name
    }

    pub fn kind(&self) -> &'s CompiledKind {
        self.kind
    }

    /// Stores an unsigned integer, or an enum by numeric value.
    pub fn set(&mut self, value: u64) -> Result<&mut Self, WriteError> {
        let kind: &'s CompiledKind = self.kind;
        match kind {
            CompiledKind::Primitive(repr) => self.store(*repr, value as i128),
            CompiledKind::Enum(e) => {
                if e.name_of(value).is_none() {
                    return Err(WriteError::UnknownEnumVariant(value.to_string()));
                }
                self.state = Slot::Scalar(Some(value));
                Ok(self)
            }
            CompiledKind::Constant(_) | CompiledKind::Derived(_) => {
                Err(WriteError::ReadOnly(self.name.to_string()))
            }
            _ => Err(WriteError::WrongKind(self.name.to_string())),
        }
    }

    /// Stores a signed integer.
    pub fn set_signed(&mut self, value: i64) -> Result<&mut Self, WriteError> {
        let kind: &'s CompiledKind = self.kind;
        match kind {
            CompiledKind::Primitive(repr) => self.store(*repr, value as i128),
            CompiledKind::Constant(_) | CompiledKind::Derived(_) => {
                Err(WriteError::ReadOnly(self.name.to_string()))
            }
            _ => Err(WriteError::WrongKind(self.name.to_string())),
        }
    }

    /// Stores an enum by variant name.
    pub fn set_enum(&mut self, variant: &str) -> Result<&mut Self, WriteError> {
        let CompiledKind::Enum(e) = self.kind else {
            return Err(WriteError::WrongKind(self.name.to_string()));
        };
        let value = e
            .value_of(variant)
            .ok_or_else(|| WriteError::UnknownEnumVariant(variant.to_string()))?;
        self.state = Slot::Scalar(Some(value));

        Ok(self)
    }

    fn store(&mut self, repr: Primitive, value: i128) -> Result<&mut Self, WriteError> {
        if !repr.fits(value) {
            return Err(WriteError::Overflow {
                field: self.name.to_string(),
                value,
                min: repr.min_value(),
                max: repr.max_value(),
            });
        }
        self.state = Slot::Scalar(Some(repr.to_raw(value)));

        Ok(self)
    }

    pub fn as_mask(&mut self) -> Result<&mut MaskBuilder<'s>, WriteError> {
        match &mut self.state {
            Slot::Mask(mask) => Ok(mask),
            _ => Err(WriteError::WrongKind(self.name.to_string())),
        }
    }

    pub fn as_struct(&mut self) -> Result<&mut StructBuilder<'s>, WriteError> {
        match &mut self.state {
            Slot::Struct(st) => Ok(st),
            _ => Err(WriteError::WrongKind(self.name.to_string())),
        }
    }

    pub fn as_array(&mut self) -> Result<&mut ArrayBuilder<'s>, WriteError> {
        match &mut self.state {
            Slot::Array(array) => Ok(array),
            _ => Err(WriteError::WrongKind(self.name.to_string())),
        }
    }

    pub fn as_view(&mut self) -> Result<&mut ViewBuilder<'s>, WriteError> {
        match &mut self.state {
            Slot::View(view) => Ok(view),
            _ => Err(WriteError::WrongKind(self.name.to_string())),
        }
    }

    /// Whether serializing would find a value for this field.
    pub fn is_set(&self) -> bool {
        !matches!(self.state, Slot::Scalar(None))
    }

    /// Encoded length of the current content.
    pub fn size(&self) -> usize {
        match &self.state {
            Slot::Mask(mask) => mask.size(),
            Slot::Struct(st) => st.size(),
            Slot::Array(array) => array.size(),
            Slot::View(view) => view.size(),
            Slot::Scalar(_) | Slot::Computed => self.kind.fixed_width().unwrap_or(0),
        }
    }

    /// Numeric value for size expressions, `None` if not set.
    fn numeric(&self) -> Option<i128> {
        match (&self.state, self.kind) {
            (Slot::Scalar(Some(raw)), CompiledKind::Primitive(repr)) => Some(repr.from_raw(*raw)),
            (Slot::Scalar(Some(raw)), CompiledKind::Enum(_)) => Some(*raw as i128),
            (Slot::Computed, CompiledKind::Constant(constant)) => Some(constant.value as i128),
            _ => None,
        }
    }

    fn count(&self) -> usize {
        match &self.state {
            Slot::Array(array) => array.len(),
            _ => 0,
        }
    }

    fn write(&self, cursor: &mut Cursor<'_>) -> Result<(), WriteError> {
        match (&self.state, self.kind) {
            (Slot::Scalar(Some(raw)), CompiledKind::Primitive(repr)) => {
                cursor.write_primitive(repr, *raw)
            }
            (Slot::Scalar(Some(raw)), CompiledKind::Enum(e)) => cursor.write_primitive(&e.repr, *raw),
            (Slot::Mask(mask), _) => cursor.write(mask.as_bytes()),
            (Slot::Struct(st), _) => st.write(cursor),
            (Slot::Array(array), _) => array.write(cursor),
            (Slot::View(view), _) => view.write(cursor),
            (Slot::Computed, CompiledKind::Constant(constant)) => {
                cursor.write_primitive(&constant.repr, constant.value)
            }
            _ => Err(WriteError::NotSet(self.name.to_string())),
        }
    }
}

impl<'s> StructBuilder<'s> {
    pub fn new(schema: &'s CompiledStruct) -> Self {
        StructBuilder {
            schema,
            slots: schema
                .fields
                .iter()
                .map(|f| ValueBuilder::new(&f.name, &f.kind))
                .collect(),
        }
    }

    /// Builder for the member `name`.
    pub fn field(&mut self, name: &str) -> Result<&mut ValueBuilder<'s>, WriteError> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| WriteError::UnknownField(name.to_string()))?;

        Ok(&mut self.slots[index])
    }

    pub fn with(&mut self, name: &str, value: u64) -> Result<&mut Self, WriteError> {
        self.field(name)?.set(value)?;
        Ok(self)
    }

    pub fn with_signed(&mut self, name: &str, value: i64) -> Result<&mut Self, WriteError> {
        self.field(name)?.set_signed(value)?;
        Ok(self)
    }

    pub fn with_enum(&mut self, name: &str, variant: &str) -> Result<&mut Self, WriteError> {
        self.field(name)?.set_enum(variant)?;
        Ok(self)
    }

    pub fn with_flag(&mut self, name: &str, flag: &str, on: bool) -> Result<&mut Self, WriteError> {
        self.mask(name)?.set(flag, on)?;
        Ok(self)
    }

    pub fn mask(&mut self, name: &str) -> Result<&mut MaskBuilder<'s>, WriteError> {
        self.field(name)?.as_mask()
    }

    pub fn nested(&mut self, name: &str) -> Result<&mut StructBuilder<'s>, WriteError> {
        self.field(name)?.as_struct()
    }

    pub fn array(&mut self, name: &str) -> Result<&mut ArrayBuilder<'s>, WriteError> {
        self.field(name)?.as_array()
    }

    pub fn view(&mut self, name: &str) -> Result<&mut ViewBuilder<'s>, WriteError> {
        self.field(name)?.as_view()
    }

    /// Encoded length of the record as currently built.
    pub fn size(&self) -> usize {
        self.slots.iter().map(ValueBuilder::size).sum()
    }

    /// Encodes the record into the front of `buf` and returns the number of bytes written.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, WriteError> {
        let needed = self.size();
        if needed > buf.len() {
            debug!(needed, available = buf.len(), "destination buffer too small");
            return Err(WriteError::WriteFailed {
                needed,
                available: buf.len(),
            });
        }

        let mut cursor = Cursor::new(buf);
        self.write(&mut cursor)?;
        trace!(len = cursor.position(), "serialized record");

        Ok(cursor.position())
    }

    /// Encodes the record into a new buffer of exactly [StructBuilder::size] bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>, WriteError> {
        let mut buf = vec![0u8; self.size()];
        let len = self.serialize(&mut buf)?;
        buf.truncate(len);

        Ok(buf)
    }

    fn write(&self, cursor: &mut Cursor<'_>) -> Result<(), WriteError> {
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(self.slots.len());
        let mut pending = Vec::new();

        for (index, (field, slot)) in self.schema.fields.iter().zip(&self.slots).enumerate() {
            let start = cursor.position();
            match &field.kind {
                CompiledKind::Derived(derived) if derived.expr.measures_region() => {
                    let reservation = cursor.reserve(derived.repr.width)?;
                    pending.push((index, reservation));
                }
                CompiledKind::Derived(derived) => {
                    let value = self.evaluate(&field.name, derived, &spans)?;
                    cursor.write_primitive(&derived.repr, derived.repr.to_raw(value))?;
                }
                _ => slot.write(cursor)?,
            }
            spans.push((start, cursor.position()));
        }

        for (index, reservation) in pending {
            let field = &self.schema.fields[index];
            if let CompiledKind::Derived(derived) = &field.kind {
                let value = self.evaluate(&field.name, derived, &spans)?;
                trace!(field = %field.name, at = reservation.at(), value = %value, "patched size field");
                cursor.patch(reservation, &derived.repr, derived.repr.to_raw(value));
            }
        }

        Ok(())
    }

    fn evaluate(
        &self,
        name: &str,
        derived: &CompiledDerived,
        spans: &[(usize, usize)],
    ) -> Result<i128, WriteError> {
        let value = derived.expr.evaluate(|operand| match operand {
            CompiledOperand::Const(value) => Ok(value as i128),
            CompiledOperand::ValueOf(index) => self.slots[index]
                .numeric()
                .ok_or_else(|| WriteError::NotSet(self.schema.fields[index].name.clone())),
            CompiledOperand::CountOf(index) => Ok(self.slots[index].count() as i128),
            CompiledOperand::SizeOf { from, to } => Ok((spans[to].1 - spans[from].0) as i128),
        })?;

        if !derived.repr.fits(value) {
            return Err(WriteError::Overflow {
                field: name.to_string(),
                value,
                min: derived.repr.min_value(),
                max: derived.repr.max_value(),
            });
        }

        Ok(value)
    }
}

impl<'s> ArrayBuilder<'s> {
    fn new(name: &'s str, array: &'s CompiledArray) -> Self {
        let elements = match array.len {
            CompiledLen::Fixed(count) => (0..count)
                .map(|_| ValueBuilder::new(name, &array.element))
                .collect(),
            CompiledLen::Bounded { .. } => Vec::new(),
        };

        ArrayBuilder {
            name,
            array,
            elements,
        }
    }

    /// Number of elements present: the fixed length, or the elements pushed so far.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn capacity(&self) -> usize {
        match self.array.len {
            CompiledLen::Fixed(count) => count,
            CompiledLen::Bounded { max, .. } => max,
        }
    }

    /// Builder for element `index`, which must already exist.
    pub fn get(&mut self, index: usize) -> Result<&mut ValueBuilder<'s>, WriteError> {
        let len = self.elements.len();
        self.elements
            .get_mut(index)
            .ok_or(WriteError::IndexOutOfRange { index, len })
    }

    /// Appends an element to a bounded array. Existing elements are untouched on failure.
    pub fn push(&mut self) -> Result<&mut ValueBuilder<'s>, WriteError> {
        let full = match self.array.len {
            CompiledLen::Fixed(_) => true,
            CompiledLen::Bounded { max, .. } => self.elements.len() >= max,
        };
        if full {
            debug!(field = self.name, max = self.capacity(), "array at capacity");
            return Err(WriteError::CapacityExceeded {
                field: self.name.to_string(),
                max: self.capacity(),
            });
        }

        let array: &'s CompiledArray = self.array;
        let index = self.elements.len();
        self.elements.push(ValueBuilder::new(self.name, &array.element));

        Ok(&mut self.elements[index])
    }

    /// Appends an unsigned integer element.
    pub fn push_value(&mut self, value: u64) -> Result<&mut Self, WriteError> {
        self.push()?.set(value)?;
        Ok(self)
    }

    pub fn size(&self) -> usize {
        let prefix = match self.array.len {
            CompiledLen::Fixed(_) => 0,
            CompiledLen::Bounded { count, .. } => count.width,
        };
        prefix + self.elements.iter().map(ValueBuilder::size).sum::<usize>()
    }

    fn write(&self, cursor: &mut Cursor<'_>) -> Result<(), WriteError> {
        if let CompiledLen::Bounded { count, .. } = self.array.len {
            cursor.write_primitive(&count, self.elements.len() as u64)?;
        }
        for element in &self.elements {
            element.write(cursor)?;
        }

        Ok(())
    }
}

impl<'s> ViewBuilder<'s> {
    fn new(name: &'s str, view: &'s CompiledView) -> Self {
        ViewBuilder {
            name,
            view,
            selected: None,
        }
    }

    /// Selects the variant with `key` and returns its payload builder.
    ///
    /// Selecting the already selected key returns the same payload; selecting
    /// a different one fails with [WriteError::AlreadySelected].
    pub fn select(&mut self, key: u64) -> Result<&mut ValueBuilder<'s>, WriteError> {
        let index = self
            .view
            .index_of_key(key)
            .ok_or(WriteError::UnknownVariant(key))?;
        self.select_index(index)
    }

    /// Same as [ViewBuilder::select], addressing the variant by name.
    pub fn select_named(&mut self, name: &str) -> Result<&mut ValueBuilder<'s>, WriteError> {
        let index = self
            .view
            .index_of_name(name)
            .ok_or_else(|| WriteError::UnknownVariantName(name.to_string()))?;
        self.select_index(index)
    }

    fn select_index(&mut self, index: usize) -> Result<&mut ValueBuilder<'s>, WriteError> {
        let view: &'s CompiledView = self.view;
        if let Some((current, _)) = &self.selected {
            if *current != index {
                return Err(WriteError::AlreadySelected {
                    selected: view.variants[*current].key,
                    requested: view.variants[index].key,
                });
            }
        }

        let (_, payload) = self.selected.get_or_insert_with(|| {
            let variant = &view.variants[index];
            (index, Box::new(ValueBuilder::new(&variant.name, &variant.kind)))
        });

        Ok(payload.as_mut())
    }

    /// Key of the selected variant.
    pub fn selected_key(&self) -> Option<u64> {
        self.selected
            .as_ref()
            .map(|(index, _)| self.view.variants[*index].key)
    }

    /// Key width plus the selected payload; an unselected view counts its key only.
    pub fn size(&self) -> usize {
        self.view.key.width
            + self
                .selected
                .as_ref()
                .map_or(0, |(_, payload)| payload.size())
    }

    fn write(&self, cursor: &mut Cursor<'_>) -> Result<(), WriteError> {
        let Some((index, payload)) = &self.selected else {
            return Err(WriteError::NotSet(self.name.to_string()));
        };
        cursor.write_primitive(&self.view.key, self.view.variants[*index].key)?;
        payload.write(cursor)
    }
}
