//! Offset planning.
//!
//! Fields preceded only by fixed-width siblings get an offset at compile time.
//! Everything after the first variable-width field is located by walking the
//! encoded sizes actually present in the buffer.

use crate::{
    compiled::{CompiledField, CompiledKind, CompiledLen, CompiledStruct},
    errors::{CompileError, ReadError},
    primitive::Primitive,
};

/// Offsets known without looking at data, one per field, followed by the
/// struct's total width if every field is fixed.
pub fn static_offsets(
    fields: &[CompiledField],
) -> Result<(Vec<Option<usize>>, Option<usize>), CompileError> {
    let mut offsets = Vec::with_capacity(fields.len());
    let mut next = Some(0usize);
    for field in fields {
        offsets.push(next);
        next = match (next, field.kind.fixed_width()) {
            (Some(offset), Some(width)) => Some(
                offset
                    .checked_add(width)
                    .ok_or_else(|| CompileError::LayoutTooLarge(field.name.clone()))?,
            ),
            _ => None,
        };
    }

    Ok((offsets, next))
}

/// `pos + by`, or [ReadError::NotEnoughData] if that is past any addressable buffer.
pub fn advance(pos: usize, by: usize, data: &[u8]) -> Result<usize, ReadError> {
    pos.checked_add(by).ok_or(ReadError::NotEnoughData {
        needed: usize::MAX,
        available: data.len(),
    })
}

/// Reads the element count of a bounded array whose prefix starts at `offset`.
pub fn read_count(
    max: usize,
    count: &Primitive,
    data: &[u8],
    offset: usize,
) -> Result<usize, ReadError> {
    let stored = count.read(data, offset)?;
    if stored > max as u64 {
        return Err(ReadError::InvalidCount { count: stored, max });
    }

    Ok(stored as usize)
}

/// Encoded length of the `kind` value stored at `offset`.
pub fn encoded_len(kind: &CompiledKind, data: &[u8], offset: usize) -> Result<usize, ReadError> {
    if let Some(width) = kind.fixed_width() {
        return Ok(width);
    }

    match kind {
        CompiledKind::Struct(st) => {
            let mut pos = offset;
            for field in &st.fields {
                pos = advance(pos, encoded_len(&field.kind, data, pos)?, data)?;
            }
            Ok(pos - offset)
        }
        CompiledKind::Array(array) => {
            let (count, mut pos) = match array.len {
                CompiledLen::Fixed(count) => (count, offset),
                CompiledLen::Bounded { max, count } => (
                    read_count(max, &count, data, offset)?,
                    advance(offset, count.width, data)?,
                ),
            };
            for _ in 0..count {
                pos = advance(pos, encoded_len(&array.element, data, pos)?, data)?;
            }
            Ok(pos - offset)
        }
        CompiledKind::View(view) => {
            let key = view.key.read(data, offset)?;
            let index = view
                .index_of_key(key)
                .ok_or(ReadError::UnknownVariant(key))?;
            let payload = advance(offset, view.key.width, data)?;
            advance(
                view.key.width,
                encoded_len(&view.variants[index].kind, data, payload)?,
                data,
            )
        }
        // every other kind has a fixed width
        _ => Ok(0),
    }
}

/// Absolute offset of field `index` of `st`, for a struct starting at `base`.
pub fn field_offset(
    st: &CompiledStruct,
    index: usize,
    data: &[u8],
    base: usize,
) -> Result<usize, ReadError> {
    if let Some(offset) = st.offsets[index] {
        return advance(base, offset, data);
    }

    let (start, offset) = st.offsets[..index]
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, offset)| offset.map(|o| (i, o)))
        .unwrap_or((0, 0));

    let mut pos = advance(base, offset, data)?;
    for field in &st.fields[start..index] {
        pos = advance(pos, encoded_len(&field.kind, data, pos)?, data)?;
    }

    Ok(pos)
}
