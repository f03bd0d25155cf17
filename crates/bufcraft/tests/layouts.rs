use bufcraft::{
    CompileError, ReadError, Schema, Value, WriteError,
    field::{
        ArraySpec, ConstantSpec, DerivedSpec, EnumSpec, Field, FieldKind, FlagSpec, MaskSpec,
        PrimitiveSpec, StructSpec, ViewSpec,
    },
    primitive::Endian,
    size::{Operand, SizeExpr},
};

fn u8_kind() -> FieldKind {
    FieldKind::Primitive(PrimitiveSpec::unsigned(1))
}

fn number_view() -> FieldKind {
    FieldKind::View(
        ViewSpec::new(PrimitiveSpec::unsigned(1))
            .variant("u8", 0, u8_kind())
            .variant("u16", 1, FieldKind::Primitive(PrimitiveSpec::unsigned(2)))
            .variant("u32", 2, FieldKind::Primitive(PrimitiveSpec::unsigned(4))),
    )
}

fn colors() -> MaskSpec {
    MaskSpec::new(1)
        .flag(FlagSpec::new("white", 0))
        .flag(FlagSpec::new("green", 1))
        .flag(FlagSpec::new("orange", 2).implies(&["green"]))
        .flag(FlagSpec::new("blue", 3))
        .flag(FlagSpec::new("red", 4).excludes(&["blue"]).implies(&["white"]))
        .flag(FlagSpec::new("gray", 5))
}

#[test]
fn test_date() {
    let schema = Schema::compile(&[
        Field::uint("year", 2),
        Field::uint("month", 1),
        Field::uint("day", 1),
    ])
    .unwrap();
    assert_eq!(schema.fixed_width(), Some(4));

    let mut builder = schema.builder();
    builder
        .with("year", 2023)
        .unwrap()
        .with("month", 12)
        .unwrap()
        .with("day", 24)
        .unwrap();
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![0x07, 0xe7, 12, 24]);

    let reader = schema.reader(&bytes);
    assert_eq!(reader.get_u64("year"), Ok(2023));
    assert_eq!(reader.get_u64("month"), Ok(12));
    assert_eq!(reader.get_u64("day"), Ok(24));
}

#[test]
fn test_mixed_endian_siblings() {
    let schema = Schema::compile(&[
        Field::uint("inherited", 2),
        Field::new(
            "big",
            FieldKind::Primitive(PrimitiveSpec::unsigned(2).with_endian(Endian::Big)),
        ),
        Field::new(
            "little",
            FieldKind::Primitive(PrimitiveSpec::unsigned(2).with_endian(Endian::Little)),
        ),
    ])
    .unwrap();

    let mut builder = schema.builder();
    builder
        .with("inherited", 3)
        .unwrap()
        .with("big", 3)
        .unwrap()
        .with("little", 3)
        .unwrap();
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![0, 3, 0, 3, 3, 0]);

    let reader = schema.reader(&bytes);
    for name in ["inherited", "big", "little"] {
        assert_eq!(reader.get_u64(name), Ok(3));
    }
}

#[test]
fn test_mask_derivation() {
    let schema = Schema::compile(&[Field::new("colors", FieldKind::Mask(colors()))]).unwrap();

    let mut builder = schema.builder();
    builder
        .with_flag("colors", "blue", true)
        .unwrap()
        .with_flag("colors", "orange", true)
        .unwrap()
        .with_flag("colors", "red", true)
        .unwrap();
    let bytes = builder.to_vec().unwrap();
    // white, green, orange, red
    assert_eq!(bytes, vec![0b1110_1000]);

    let reader = schema.reader(&bytes);
    assert_eq!(reader.get_flag("colors", "white"), Ok(true));
    assert_eq!(reader.get_flag("colors", "green"), Ok(true));
    assert_eq!(reader.get_flag("colors", "blue"), Ok(false));
    assert_eq!(reader.get_flag("colors", "gray"), Ok(false));
    assert_eq!(
        reader.get_flag("colors", "purple"),
        Err(ReadError::UnknownFlag("purple".to_string()))
    );
}

#[test]
fn test_view_exclusivity() {
    let schema = Schema::compile(&[Field::new("number", number_view())]).unwrap();

    let mut builder = schema.builder();
    builder
        .view("number")
        .unwrap()
        .select_named("u16")
        .unwrap()
        .set(12500)
        .unwrap();
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![1, 0x30, 0xd4]);

    let view = schema.reader(&bytes).view("number").unwrap();
    assert_eq!(view.read_named("u16").unwrap().as_u64(), Ok(12500));
    assert_eq!(
        view.read_named("u8").unwrap_err(),
        ReadError::WrongVariant {
            requested: 0,
            stored: 1
        }
    );
    assert_eq!(
        view.read_named("u32").unwrap_err(),
        ReadError::WrongVariant {
            requested: 2,
            stored: 1
        }
    );
}

#[test]
fn test_fixed_array_bounds() {
    let schema = Schema::compile(&[Field::new(
        "whl",
        FieldKind::Array(ArraySpec::fixed(u8_kind(), 2)),
    )])
    .unwrap();

    let mut builder = schema.builder();
    let whl = builder.array("whl").unwrap();
    whl.get(0).unwrap().set(10).unwrap();
    whl.get(1).unwrap().set(20).unwrap();
    assert_eq!(
        whl.get(2).unwrap_err(),
        WriteError::IndexOutOfRange { index: 2, len: 2 }
    );
    let bytes = builder.to_vec().unwrap();

    let whl = schema.reader(&bytes).array("whl").unwrap();
    assert_eq!(whl.get(1).unwrap().as_u64(), Ok(20));
    assert_eq!(
        whl.get(2).unwrap_err(),
        ReadError::IndexOutOfRange { index: 2, len: 2 }
    );
}

#[test]
fn test_unset_fixed_array_element() {
    let schema = Schema::compile(&[Field::new(
        "whl",
        FieldKind::Array(ArraySpec::fixed(u8_kind(), 2)),
    )])
    .unwrap();

    let mut builder = schema.builder();
    builder.array("whl").unwrap().get(0).unwrap().set(1).unwrap();
    assert_eq!(
        builder.to_vec().unwrap_err(),
        WriteError::NotSet("whl".to_string())
    );
}

#[test]
fn test_capacity_overflow_keeps_elements() {
    let schema = Schema::compile(&[Field::new(
        "list",
        FieldKind::Array(ArraySpec::bounded(u8_kind(), 3, PrimitiveSpec::unsigned(1))),
    )])
    .unwrap();

    let mut builder = schema.builder();
    let list = builder.array("list").unwrap();
    for value in [7, 8, 9] {
        list.push_value(value).unwrap();
    }
    assert_eq!(
        list.push().unwrap_err(),
        WriteError::CapacityExceeded {
            field: "list".to_string(),
            max: 3
        }
    );

    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![3, 7, 8, 9]);
}

#[test]
fn test_array_of_views_then_trailing_field() {
    let schema = Schema::compile(&[
        Field::new(
            "numbers",
            FieldKind::Array(ArraySpec::bounded(number_view(), 3, PrimitiveSpec::unsigned(1))),
        ),
        Field::uint("tail", 1),
    ])
    .unwrap();
    assert_eq!(schema.fixed_width(), None);

    let mut builder = schema.builder();
    let numbers = builder.array("numbers").unwrap();
    numbers
        .push()
        .unwrap()
        .as_view()
        .unwrap()
        .select(0)
        .unwrap()
        .set(7)
        .unwrap();
    numbers
        .push()
        .unwrap()
        .as_view()
        .unwrap()
        .select(2)
        .unwrap()
        .set(70000)
        .unwrap();
    builder.with("tail", 0x55).unwrap();

    let bytes = builder.to_vec().unwrap();
    assert_eq!(builder.size(), bytes.len());
    assert_eq!(bytes, vec![2, 0, 7, 2, 0x00, 0x01, 0x11, 0x70, 0x55]);

    let reader = schema.reader(&bytes);
    let numbers = reader.array("numbers").unwrap();
    assert_eq!(numbers.len(), Ok(2));
    let second = numbers.get(1).unwrap().as_view().unwrap();
    assert_eq!(second.read_as(2).unwrap().as_u64(), Ok(70000));
    assert_eq!(reader.get_u64("tail"), Ok(0x55));
    assert_eq!(reader.span_of("tail"), Ok(8..9));
}

#[test]
fn test_trailing_field_after_view() {
    let schema = Schema::compile(&[
        Field::new("number", number_view()),
        Field::int("after", 2),
    ])
    .unwrap();

    for (key, value, len) in [(0u64, 200u64, 2usize), (1, 60000, 3), (2, 1 << 30, 5)] {
        let mut builder = schema.builder();
        builder
            .view("number")
            .unwrap()
            .select(key)
            .unwrap()
            .set(value)
            .unwrap();
        builder.with_signed("after", -300).unwrap();
        let bytes = builder.to_vec().unwrap();
        assert_eq!(bytes.len(), len + 2);

        let reader = schema.reader(&bytes);
        assert_eq!(reader.get_i64("after"), Ok(-300));
        let (stored, payload) = reader.view("number").unwrap().active().unwrap();
        assert_eq!(stored, key);
        assert_eq!(payload.as_u64(), Ok(value));
    }
}

#[test]
fn test_size_reference() {
    let schema = Schema::compile(&[
        Field::new(
            "volume_size",
            FieldKind::DerivedSize(DerivedSpec {
                repr: PrimitiveSpec::unsigned(1),
                expr: SizeExpr::new().plus(Operand::size_of_range("volume_size", "volume")),
            }),
        ),
        Field::uint("width", 2),
        Field::uint("height", 2),
        Field::uint("volume", 2),
    ])
    .unwrap();

    let mut builder = schema.builder();
    builder
        .with("width", 2)
        .unwrap()
        .with("height", 3)
        .unwrap()
        .with("volume", 6)
        .unwrap();
    assert_eq!(
        builder.with("volume_size", 1).unwrap_err(),
        WriteError::ReadOnly("volume_size".to_string())
    );

    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![7, 0, 2, 0, 3, 0, 6]);
    assert_eq!(schema.reader(&bytes).get_u64("volume_size"), Ok(7));
}

#[test]
fn test_measured_region_exceeds_size_width() {
    let schema = Schema::compile(&[
        Field::new(
            "len",
            FieldKind::DerivedSize(DerivedSpec {
                repr: PrimitiveSpec::unsigned(1),
                expr: SizeExpr::new().plus(Operand::size_of("payload")),
            }),
        ),
        Field::new(
            "payload",
            FieldKind::Array(ArraySpec::bounded(u8_kind(), 400, PrimitiveSpec::unsigned(2))),
        ),
    ])
    .unwrap();

    let mut builder = schema.builder();
    for i in 0..253 {
        builder.array("payload").unwrap().push_value(i % 256).unwrap();
    }
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes.len(), 256);
    assert_eq!(schema.reader(&bytes).get_u64("len"), Ok(255));

    for i in 253..300 {
        builder.array("payload").unwrap().push_value(i % 256).unwrap();
    }
    assert_eq!(
        builder.to_vec().unwrap_err(),
        WriteError::Overflow {
            field: "len".to_string(),
            value: 302,
            min: 0,
            max: 255
        }
    );
}

#[test]
fn test_size_of_nested_struct() {
    let schema = Schema::compile(&[
        Field::new(
            "volume_size",
            FieldKind::DerivedSize(DerivedSpec {
                repr: PrimitiveSpec::unsigned(1),
                expr: SizeExpr::new().plus(Operand::size_of_range("volume_size", "volume")),
            }),
        ),
        Field::new(
            "volume",
            FieldKind::Struct(StructSpec::new(vec![
                Field::uint("x", 2),
                Field::uint("y", 2),
                Field::uint("z", 2),
            ])),
        ),
    ])
    .unwrap();

    let mut builder = schema.builder();
    builder
        .nested("volume")
        .unwrap()
        .with("x", 1)
        .unwrap()
        .with("y", 2)
        .unwrap()
        .with("z", 3)
        .unwrap();

    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![7, 0, 1, 0, 2, 0, 3]);
    let reader = schema.reader(&bytes);
    assert_eq!(reader.get_u64("volume_size"), Ok(7));
    assert_eq!(reader.nested("volume").unwrap().get_u64("z"), Ok(3));
}

#[test]
fn test_size_arithmetic() {
    let schema = Schema::compile(&[
        Field::uint("b", 1),
        Field::new(
            "ab_size",
            FieldKind::DerivedSize(DerivedSpec {
                repr: PrimitiveSpec::unsigned(2),
                expr: SizeExpr::new()
                    .plus(Operand::Const(100))
                    .minus(Operand::Const(50))
                    .plus(Operand::value_of("b"))
                    .plus(Operand::size_of("payload")),
            }),
        ),
        Field::new(
            "payload",
            FieldKind::Array(ArraySpec::bounded(u8_kind(), 4, PrimitiveSpec::unsigned(1))),
        ),
    ])
    .unwrap();

    let mut builder = schema.builder();
    builder.with("b", 5).unwrap();
    builder
        .array("payload")
        .unwrap()
        .push_value(1)
        .unwrap()
        .push_value(2)
        .unwrap();

    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![5, 0, 58, 2, 1, 2]);
}

#[test]
fn test_constant_bytes() {
    let schema = Schema::compile(&[
        Field::new(
            "magic",
            FieldKind::Constant(ConstantSpec {
                repr: PrimitiveSpec::unsigned(2),
                value: 0xcafe,
            }),
        ),
        Field::uint("a", 1),
    ])
    .unwrap();

    let mut builder = schema.builder();
    builder.with("a", 1).unwrap();
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![0xca, 0xfe, 1]);
    assert_eq!(schema.reader(&bytes).get_u64("magic"), Ok(0xcafe));
}

#[test]
fn test_enum_round_trip() {
    let schema = Schema::compile(&[Field::new(
        "car",
        FieldKind::Enum(
            EnumSpec::new(PrimitiveSpec::unsigned(1))
                .variant("Skoda", 1)
                .variant("Volvo", 2)
                .variant("Audi", 3),
        ),
    )])
    .unwrap();

    let mut builder = schema.builder();
    builder.with_enum("car", "Volvo").unwrap();
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![2]);
    assert_eq!(schema.reader(&bytes).get_enum("car"), Ok("Volvo"));
    assert_eq!(
        schema.reader(&[9]).get_enum("car"),
        Err(ReadError::UnknownEnumValue(9))
    );
}

#[test]
fn test_nested_struct_endian() {
    let schema = Schema::compile(&[
        Field::uint("outer", 2),
        Field::new(
            "inner",
            FieldKind::Struct(StructSpec {
                fields: vec![Field::uint("x", 2), Field::uint("y", 3)],
                endian: Some(Endian::Little),
            }),
        ),
    ])
    .unwrap();

    let mut builder = schema.builder();
    builder.with("outer", 1).unwrap();
    builder
        .nested("inner")
        .unwrap()
        .with("x", 2)
        .unwrap()
        .with("y", 0x030201)
        .unwrap();
    let bytes = builder.to_vec().unwrap();
    assert_eq!(bytes, vec![0, 1, 2, 0, 1, 2, 3]);

    let inner = schema.reader(&bytes).nested("inner").unwrap();
    assert_eq!(inner.get_u64("y"), Ok(0x030201));
}

#[test]
fn test_parse_into_value() {
    let schema = Schema::compile(&[
        Field::new("colors", FieldKind::Mask(colors())),
        Field::new(
            "list",
            FieldKind::Array(ArraySpec::bounded(u8_kind(), 2, PrimitiveSpec::unsigned(1))),
        ),
    ])
    .unwrap();

    let value = schema.parse(&[0b0100_0000, 1, 9]).unwrap();
    assert_eq!(
        value.get("list"),
        Some(&Value::Array(vec![Value::U64(9)]))
    );
    match value.get("colors") {
        Some(Value::Mask(flags)) => {
            assert_eq!(flags.len(), 6);
            assert_eq!(flags.get("green"), Some(&true));
            assert_eq!(flags.get("white"), Some(&false));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_buffer_too_small() {
    let schema = Schema::compile(&[Field::uint("a", 4)]).unwrap();
    let mut builder = schema.builder();
    builder.with("a", 1).unwrap();

    let mut buf = [0u8; 3];
    assert_eq!(
        builder.serialize(&mut buf).unwrap_err(),
        WriteError::WriteFailed {
            needed: 4,
            available: 3
        }
    );
}

#[test]
fn test_configuration_errors() {
    let cyclic = MaskSpec::new(1)
        .flag(FlagSpec::new("a", 0).implies(&["b"]))
        .flag(FlagSpec::new("b", 1).implies(&["a"]));
    assert!(matches!(
        Schema::compile(&[Field::new("m", FieldKind::Mask(cyclic))]),
        Err(CompileError::CyclicImplication(_))
    ));

    let unknown = SizeExpr::new().plus(Operand::size_of("nothing"));
    assert_eq!(
        Schema::compile(&[Field::new(
            "s",
            FieldKind::DerivedSize(DerivedSpec {
                repr: PrimitiveSpec::unsigned(1),
                expr: unknown,
            }),
        )])
        .unwrap_err(),
        CompileError::UnknownReference("nothing".to_string())
    );

    assert_eq!(
        Schema::compile(&[Field::uint("", 1)]).unwrap_err(),
        CompileError::EmptyName
    );
}
