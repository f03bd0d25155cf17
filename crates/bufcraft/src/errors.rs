//! Error types for schema compilation, building and reading.

use thiserror::Error;

/// Errors produced when compiling a list of [crate::field::Field]s into a [crate::schema::Schema].
///
/// These are configuration errors: they are detected once, when the descriptor
/// is accepted, and never surface from individual field accesses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Integer width is not one of 1, 2, 3, 4 or 8 bytes.
    #[error("invalid integer width: {0} bytes")]
    InvalidWidth(usize),
    /// Mask width is outside 1..=8 bytes.
    #[error("invalid mask width: {0} bytes")]
    InvalidMaskWidth(usize),
    /// Field, flag, variant or enum name is empty.
    #[error("empty name")]
    EmptyName,
    /// Two siblings share a name.
    #[error("duplicate name `{0}`")]
    DuplicateName(String),
    /// Flag bit position does not fit in the mask.
    #[error("flag `{flag}` uses bit {bit} of a {bits}-bit mask")]
    FlagBitOutOfRange { flag: String, bit: usize, bits: usize },
    /// Two flags share a bit position.
    #[error("flags `{0}` and `{1}` share a bit")]
    DuplicateFlagBit(String, String),
    /// Implication or exclusion refers to a flag the mask does not declare.
    #[error("unknown flag `{0}`")]
    UnknownFlag(String),
    /// Implications form a cycle through the named flag.
    #[error("cyclic implication through flag `{0}`")]
    CyclicImplication(String),
    /// Setting the named flag would both set and clear another flag.
    #[error("flag `{flag}` both implies and excludes `{other}`")]
    ConflictingFlags { flag: String, other: String },
    /// View declares no variants.
    #[error("view `{0}` has no variants")]
    EmptyView(String),
    /// Two variants of one view share a key.
    #[error("duplicate variant key {0}")]
    DuplicateVariantKey(u64),
    /// Variant key cannot be represented by the view's key width.
    #[error("variant key {key} does not fit in {width} bytes")]
    VariantKeyOutOfDomain { key: u64, width: usize },
    /// Enum declares no variants.
    #[error("enum `{0}` has no variants")]
    EmptyEnum(String),
    /// Two enum variants share a value.
    #[error("duplicate enum value {0}")]
    DuplicateEnumValue(u64),
    /// Constant or enum value does not fit in its representation.
    #[error("value {value} does not fit in {width} bytes")]
    ValueOutOfRange { value: u64, width: usize },
    /// Array capacity or count is zero.
    #[error("array `{0}` has zero capacity")]
    InvalidArrayCount(String),
    /// Bounded array capacity cannot be represented by its count width.
    #[error("array capacity {max} does not fit in {width} bytes")]
    CapacityOutOfDomain { max: usize, width: usize },
    /// Size expression names a sibling that does not exist.
    #[error("size expression refers to unknown field `{0}`")]
    UnknownReference(String),
    /// Size expression names a sibling of the wrong kind.
    #[error("size expression cannot use field `{0}` that way")]
    InvalidReference(String),
    /// Size expression range runs backwards.
    #[error("size range `{from}..={to}` is reversed")]
    ReversedRange { from: String, to: String },
    /// Statically known size expression does not fit its declared width.
    #[error("size field `{field}` evaluates to {value}, outside 0..={max}")]
    SizeExceedsWidth { field: String, value: i128, max: u64 },
    /// Static width of the named field or struct does not fit in `usize`.
    #[error("layout of `{0}` is too large to address")]
    LayoutTooLarge(String),
    /// Size field declared as an array element or view variant.
    #[error("size field `{0}` must be a struct member")]
    DetachedSize(String),
}

/// Errors produced by a [crate::reader::StructReader] and the readers it hands out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Buffer is shorter than the span the field needs.
    #[error("not enough data: need {needed} bytes, have {available}")]
    NotEnoughData { needed: usize, available: usize },
    /// Field is structurally absent from the data actually present.
    #[error("field `{0}` is not present in the buffer")]
    NotDeserializedYet(String),
    /// View holds a different variant than the one requested.
    #[error("wrong variant: requested key {requested}, stored key {stored}")]
    WrongVariant { requested: u64, stored: u64 },
    /// Array index beyond the fixed length or the observed count.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// Bounded array count stored in the buffer exceeds its capacity.
    #[error("stored count {count} exceeds capacity {max}")]
    InvalidCount { count: u64, max: usize },
    /// Key does not name a declared variant.
    #[error("unknown variant key {0}")]
    UnknownVariant(u64),
    /// Stored value does not name a declared enum variant.
    #[error("unknown enum value {0}")]
    UnknownEnumValue(u64),
    /// No field with this name.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// No flag with this name.
    #[error("unknown flag `{0}`")]
    UnknownFlag(String),
    /// No variant with this name.
    #[error("unknown variant `{0}`")]
    UnknownVariantName(String),
    /// Field exists but is not of the requested kind.
    #[error("field `{0}` is not of the requested kind")]
    WrongKind(String),
}

/// Errors produced by a [crate::builder::StructBuilder] and the builders it hands out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// Destination buffer is too small.
    #[error("write failed: need {needed} bytes, have {available}")]
    WriteFailed { needed: usize, available: usize },
    /// Bounded array is already at capacity.
    #[error("array `{field}` is at capacity {max}")]
    CapacityExceeded { field: String, max: usize },
    /// Value does not fit the field's declared width.
    #[error("value {value} for `{field}` is outside {min}..={max}")]
    Overflow {
        field: String,
        value: i128,
        min: i128,
        max: i128,
    },
    /// Required field was never given a value.
    #[error("field `{0}` is not set")]
    NotSet(String),
    /// Fixed array index beyond its length.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// A different variant was already selected.
    #[error("view already holds variant key {selected}, cannot select {requested}")]
    AlreadySelected { selected: u64, requested: u64 },
    /// Key does not name a declared variant.
    #[error("unknown variant key {0}")]
    UnknownVariant(u64),
    /// No variant with this name.
    #[error("unknown variant `{0}`")]
    UnknownVariantName(String),
    /// No enum variant with this name.
    #[error("unknown enum variant `{0}`")]
    UnknownEnumVariant(String),
    /// No field with this name.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// No flag with this name.
    #[error("unknown flag `{0}`")]
    UnknownFlag(String),
    /// Field exists but is not of the requested kind.
    #[error("field `{0}` is not of the requested kind")]
    WrongKind(String),
    /// Field value is fixed by the schema (constant or derived).
    #[error("field `{0}` is computed by the schema and cannot be set")]
    ReadOnly(String),
}
