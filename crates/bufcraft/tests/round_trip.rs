use bufcraft::{
    Schema,
    field::{ArraySpec, Field, FieldKind, FlagSpec, MaskSpec, PrimitiveSpec, ViewSpec},
    primitive::Endian,
};
use proptest::prelude::*;

fn record_schema() -> Schema {
    Schema::compile(&[
        Field::uint("a", 1),
        Field::new(
            "b",
            FieldKind::Primitive(PrimitiveSpec::signed(2).with_endian(Endian::Little)),
        ),
        Field::uint("c", 3),
        Field::uint("d", 8),
        Field::new(
            "list",
            FieldKind::Array(ArraySpec::bounded(
                FieldKind::Primitive(PrimitiveSpec::unsigned(2)),
                8,
                PrimitiveSpec::unsigned(1),
            )),
        ),
        Field::new(
            "v",
            FieldKind::View(
                ViewSpec::new(PrimitiveSpec::unsigned(1))
                    .variant("small", 0, FieldKind::Primitive(PrimitiveSpec::signed(1)))
                    .variant("wide", 1, FieldKind::Primitive(PrimitiveSpec::signed(4))),
            ),
        ),
        Field::int("tail", 4),
    ])
    .unwrap()
}

const COLORS: [&str; 6] = ["white", "green", "orange", "blue", "red", "gray"];

fn colors_schema() -> Schema {
    Schema::compile(&[
        Field::uint("before", 1),
        Field::new(
            "colors",
            FieldKind::Mask(
                MaskSpec::new(1)
                    .flag(FlagSpec::new("white", 0))
                    .flag(FlagSpec::new("green", 1))
                    .flag(FlagSpec::new("orange", 2).implies(&["green"]))
                    .flag(FlagSpec::new("blue", 3))
                    .flag(FlagSpec::new("red", 4).excludes(&["blue"]).implies(&["white"]))
                    .flag(FlagSpec::new("gray", 5)),
            ),
        ),
        Field::uint("after", 1),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn record_round_trip(
        a in any::<u8>(),
        b in any::<i16>(),
        c in 0u64..(1 << 24),
        d in any::<u64>(),
        list in proptest::collection::vec(any::<u16>(), 0..=8),
        wide in any::<bool>(),
        v in any::<i32>(),
        tail in any::<i32>(),
    ) {
        let schema = record_schema();
        let mut builder = schema.builder();
        builder
            .with("a", a as u64).unwrap()
            .with_signed("b", b as i64).unwrap()
            .with("c", c).unwrap()
            .with("d", d).unwrap()
            .with_signed("tail", tail as i64).unwrap();
        for value in &list {
            builder.array("list").unwrap().push_value(*value as u64).unwrap();
        }
        let (key, v) = if wide { (1, v as i64) } else { (0, v as i8 as i64) };
        builder.view("v").unwrap().select(key).unwrap().set_signed(v).unwrap();

        let bytes = builder.to_vec().unwrap();
        prop_assert_eq!(bytes.len(), builder.size());

        let reader = schema.reader(&bytes);
        prop_assert_eq!(reader.get_u64("a"), Ok(a as u64));
        prop_assert_eq!(reader.get_i64("b"), Ok(b as i64));
        prop_assert_eq!(reader.get_u64("c"), Ok(c));
        prop_assert_eq!(reader.get_u64("d"), Ok(d));
        prop_assert_eq!(reader.get_i64("tail"), Ok(tail as i64));
        prop_assert_eq!(reader.size(), Ok(bytes.len()));

        let stored: Vec<u64> = reader
            .array("list")
            .unwrap()
            .iter()
            .unwrap()
            .map(|e| e.and_then(|e| e.as_u64()).unwrap())
            .collect();
        prop_assert_eq!(stored, list.iter().map(|v| *v as u64).collect::<Vec<_>>());

        let payload = reader.view("v").unwrap().read_as(key).unwrap();
        prop_assert_eq!(payload.as_i64(), Ok(v));
    }

    #[test]
    fn overflow_is_never_truncated(width in prop::sample::select(vec![1usize, 2, 3, 4]), excess in 0u64..1000) {
        let schema = Schema::compile(&[Field::uint("x", width)]).unwrap();
        let mut builder = schema.builder();
        let value = (1u64 << (width * 8)) + excess;

        prop_assert!(builder.with("x", value).is_err());
        prop_assert!(builder.to_vec().is_err());
    }

    #[test]
    fn mask_round_trip(ops in proptest::collection::vec((0..COLORS.len(), any::<bool>()), 0..12)) {
        let schema = colors_schema();
        let mut builder = schema.builder();
        builder.with("before", 1).unwrap().with("after", 2).unwrap();
        for (flag, on) in &ops {
            builder.with_flag("colors", COLORS[*flag], *on).unwrap();
        }

        let bytes = builder.to_vec().unwrap();
        prop_assert_eq!(bytes.len(), 3);
        prop_assert_eq!(bytes.len(), builder.size());

        let reader = schema.reader(&bytes);
        let mask = builder.mask("colors").unwrap();
        let stored = reader.mask("colors").unwrap().flags().unwrap();
        prop_assert_eq!(stored.len(), COLORS.len());
        for (name, on) in stored {
            prop_assert_eq!(Ok(on), mask.get(name));
        }
        prop_assert_eq!(reader.get_u64("before"), Ok(1));
        prop_assert_eq!(reader.get_u64("after"), Ok(2));
    }
}
