//! Named flags packed into a fixed-width bit vector.
//!
//! Each flag owns one bit, addressed MSB-first across the vector (see [crate::bits]).
//! Setting a flag clears the flags it excludes and then sets the flags it
//! implies, transitively. Reading a flag never re-derives anything: it reports
//! the stored bit.

use tracing::trace;

use crate::{
    bits::{read_bit_at, write_bit_at},
    errors::{CompileError, ReadError, WriteError},
    field::MaskSpec,
};

/// Largest mask, in bytes.
pub const MAX_MASK_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFlag {
    pub name: String,
    pub bit: usize,
    pub implies: Vec<usize>,
    pub excludes: Vec<usize>,
}

/// A validated [MaskSpec]: relations resolved to flag indices, acyclic and non-contradictory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMask {
    pub width: usize,
    pub flags: Vec<CompiledFlag>,
}

impl TryFrom<&MaskSpec> for CompiledMask {
    type Error = CompileError;

    fn try_from(spec: &MaskSpec) -> Result<Self, Self::Error> {
        if spec.width == 0 || spec.width > MAX_MASK_WIDTH {
            return Err(CompileError::InvalidMaskWidth(spec.width));
        }

        let bits = spec.width * 8;
        for (i, flag) in spec.flags.iter().enumerate() {
            if flag.name.is_empty() {
                return Err(CompileError::EmptyName);
            }
            if flag.bit >= bits {
                return Err(CompileError::FlagBitOutOfRange {
                    flag: flag.name.clone(),
                    bit: flag.bit,
                    bits,
                });
            }
            for other in &spec.flags[..i] {
                if other.name == flag.name {
                    return Err(CompileError::DuplicateName(flag.name.clone()));
                }
                if other.bit == flag.bit {
                    return Err(CompileError::DuplicateFlagBit(
                        other.name.clone(),
                        flag.name.clone(),
                    ));
                }
            }
        }

        let resolve = |names: &[String]| -> Result<Vec<usize>, CompileError> {
            names
                .iter()
                .map(|name| {
                    spec.flags
                        .iter()
                        .position(|f| &f.name == name)
                        .ok_or_else(|| CompileError::UnknownFlag(name.clone()))
                })
                .collect()
        };

        let mut flags = Vec::with_capacity(spec.flags.len());
        for flag in &spec.flags {
            flags.push(CompiledFlag {
                name: flag.name.clone(),
                bit: flag.bit,
                implies: resolve(&flag.implies)?,
                excludes: resolve(&flag.excludes)?,
            });
        }

        let mask = CompiledMask {
            width: spec.width,
            flags,
        };
        mask.check_relations()?;

        Ok(mask)
    }
}

impl CompiledMask {
    pub fn index_of(&self, flag: &str) -> Option<usize> {
        self.flags.iter().position(|f| f.name == flag)
    }

    /// Rejects implication cycles and flags whose closure both sets and clears a flag.
    fn check_relations(&self) -> Result<(), CompileError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(mask: &CompiledMask, i: usize, marks: &mut [Mark]) -> Result<(), CompileError> {
            match marks[i] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(CompileError::CyclicImplication(mask.flags[i].name.clone()));
                }
                Mark::New => {}
            }

            marks[i] = Mark::Active;
            for &next in &mask.flags[i].implies {
                visit(mask, next, marks)?;
            }
            marks[i] = Mark::Done;

            Ok(())
        }

        let mut marks = vec![Mark::New; self.flags.len()];
        for i in 0..self.flags.len() {
            visit(self, i, &mut marks)?;
        }

        for i in 0..self.flags.len() {
            let closure = self.closure(i);
            for &member in &closure {
                for &excluded in &self.flags[member].excludes {
                    if closure.contains(&excluded) {
                        return Err(CompileError::ConflictingFlags {
                            flag: self.flags[i].name.clone(),
                            other: self.flags[excluded].name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// `flag` and every flag it implies, transitively. Requires acyclic implications.
    fn closure(&self, flag: usize) -> Vec<usize> {
        let mut seen = vec![flag];
        let mut stack = vec![flag];
        while let Some(i) = stack.pop() {
            for &next in &self.flags[i].implies {
                if !seen.contains(&next) {
                    seen.push(next);
                    stack.push(next);
                }
            }
        }

        seen
    }

    /// Applies `set(flag, on)` to `bytes`, including exclusions and implications.
    pub fn apply(&self, bytes: &mut [u8], flag: usize, on: bool) {
        let compiled = &self.flags[flag];
        write_bit_at(bytes, compiled.bit, on);
        if !on {
            return;
        }

        for &excluded in &compiled.excludes {
            trace!(flag = %compiled.name, excluded = %self.flags[excluded].name, "clearing excluded flag");
            write_bit_at(bytes, self.flags[excluded].bit, false);
        }
        for &implied in &compiled.implies {
            self.apply(bytes, implied, true);
        }
    }
}

/// Builder-side mask value. Always [CompiledMask::width] bytes long.
#[derive(Debug, Clone)]
pub struct MaskBuilder<'s> {
    mask: &'s CompiledMask,
    bytes: [u8; MAX_MASK_WIDTH],
}

impl<'s> MaskBuilder<'s> {
    /// All flags cleared.
    pub fn new(mask: &'s CompiledMask) -> Self {
        MaskBuilder {
            mask,
            bytes: [0; MAX_MASK_WIDTH],
        }
    }

    /// Sets or clears `flag`. Setting also applies the flag's exclusions and implications.
    pub fn set(&mut self, flag: &str, on: bool) -> Result<&mut Self, WriteError> {
        let index = self
            .mask
            .index_of(flag)
            .ok_or_else(|| WriteError::UnknownFlag(flag.to_string()))?;
        self.mask.apply(&mut self.bytes[..self.mask.width], index, on);

        Ok(self)
    }

    /// Current stored bit of `flag`.
    pub fn get(&self, flag: &str) -> Result<bool, WriteError> {
        let index = self
            .mask
            .index_of(flag)
            .ok_or_else(|| WriteError::UnknownFlag(flag.to_string()))?;

        Ok(read_bit_at(self.as_bytes(), self.mask.flags[index].bit).unwrap_or(false))
    }

    /// Encoded width, independent of which flags are set.
    pub fn size(&self) -> usize {
        self.mask.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.mask.width]
    }
}

/// Reader-side mask over a borrowed buffer.
#[derive(Debug, Clone, Copy)]
pub struct MaskReader<'a, 's> {
    mask: &'s CompiledMask,
    data: &'a [u8],
    offset: usize,
}

impl<'a, 's> MaskReader<'a, 's> {
    pub fn new(mask: &'s CompiledMask, data: &'a [u8], offset: usize) -> Self {
        MaskReader { mask, data, offset }
    }

    /// The mask's bytes, failing if the buffer is too short to hold them.
    pub fn as_bytes(&self) -> Result<&'a [u8], ReadError> {
        let end = self.offset.checked_add(self.mask.width).unwrap_or(usize::MAX);
        self.data
            .get(self.offset..end)
            .ok_or(ReadError::NotEnoughData {
                needed: end,
                available: self.data.len(),
            })
    }

    /// Stored bit of `flag`.
    pub fn get(&self, flag: &str) -> Result<bool, ReadError> {
        let index = self
            .mask
            .index_of(flag)
            .ok_or_else(|| ReadError::UnknownFlag(flag.to_string()))?;

        read_bit_at(self.as_bytes()?, self.mask.flags[index].bit)
    }

    /// Every declared flag with its stored bit, in declaration order.
    pub fn flags(&self) -> Result<Vec<(&'s str, bool)>, ReadError> {
        let mask: &'s CompiledMask = self.mask;
        let bytes = self.as_bytes()?;
        Ok(mask
            .flags
            .iter()
            .map(|f| (f.name.as_str(), read_bit_at(bytes, f.bit).unwrap_or(false)))
            .collect())
    }

    pub fn size(&self) -> usize {
        self.mask.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FlagSpec;

    fn colors() -> CompiledMask {
        let spec = MaskSpec::new(1)
            .flag(FlagSpec::new("white", 0))
            .flag(FlagSpec::new("green", 1))
            .flag(FlagSpec::new("orange", 2).implies(&["green"]))
            .flag(FlagSpec::new("blue", 3))
            .flag(FlagSpec::new("red", 4).excludes(&["blue"]).implies(&["white"]))
            .flag(FlagSpec::new("gray", 5));
        CompiledMask::try_from(&spec).unwrap()
    }

    #[test]
    fn test_implication() {
        let mask = colors();
        let mut builder = MaskBuilder::new(&mask);
        builder.set("orange", true).unwrap();

        assert!(builder.get("orange").unwrap());
        assert!(builder.get("green").unwrap());
        assert!(!builder.get("white").unwrap());
        assert_eq!(builder.as_bytes(), &[0b0110_0000]);
    }

    #[test]
    fn test_exclusion_and_implication() {
        let mask = colors();
        let mut builder = MaskBuilder::new(&mask);
        builder.set("blue", true).unwrap().set("red", true).unwrap();

        assert!(builder.get("red").unwrap());
        assert!(!builder.get("blue").unwrap());
        assert!(builder.get("white").unwrap());
    }

    #[test]
    fn test_clear_does_not_propagate() {
        let mask = colors();
        let mut builder = MaskBuilder::new(&mask);
        builder.set("orange", true).unwrap();
        builder.set("orange", false).unwrap();

        assert!(!builder.get("orange").unwrap());
        assert!(builder.get("green").unwrap());
    }

    #[test]
    fn test_size_is_constant() {
        let mask = colors();
        let mut builder = MaskBuilder::new(&mask);
        assert_eq!(builder.size(), 1);
        for flag in ["white", "green", "orange", "blue", "red", "gray"] {
            builder.set(flag, true).unwrap();
            assert_eq!(builder.size(), 1);
            assert_eq!(builder.as_bytes().len(), 1);
        }
    }

    #[test]
    fn test_unknown_flag() {
        let mask = colors();
        let mut builder = MaskBuilder::new(&mask);
        assert_eq!(
            builder.set("purple", true).unwrap_err(),
            WriteError::UnknownFlag("purple".to_string())
        );
    }

    #[test]
    fn test_reader() {
        let mask = colors();
        let data = [0xff, 0b0110_0000];
        let reader = MaskReader::new(&mask, &data, 1);

        assert!(reader.get("green").unwrap());
        assert!(reader.get("orange").unwrap());
        assert!(!reader.get("gray").unwrap());

        let set: Vec<&str> = reader
            .flags()
            .unwrap()
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(set, vec!["green", "orange"]);
    }

    #[test]
    fn test_reader_not_enough_data() {
        let mask = colors();
        let data = [0xff];
        let reader = MaskReader::new(&mask, &data, 1);
        assert_eq!(
            reader.get("green").unwrap_err(),
            ReadError::NotEnoughData {
                needed: 2,
                available: 1
            }
        );

        let reader = MaskReader::new(&mask, &data, usize::MAX);
        assert_eq!(
            reader.as_bytes().unwrap_err(),
            ReadError::NotEnoughData {
                needed: usize::MAX,
                available: 1
            }
        );
    }

    #[test]
    fn test_three_byte_mask() {
        let spec = MaskSpec::new(3)
            .flag(FlagSpec::new("first_0", 0))
            .flag(FlagSpec::new("first_1", 1))
            .flag(FlagSpec::new("first_2", 2))
            .flag(FlagSpec::new("firsts", 3).implies(&["first_0", "first_1", "first_2"]))
            .flag(FlagSpec::new("second_0", 8))
            .flag(FlagSpec::new("second_1", 15))
            .flag(FlagSpec::new("second_2", 23));
        let mask = CompiledMask::try_from(&spec).unwrap();

        let mut builder = MaskBuilder::new(&mask);
        builder.set("second_2", true).unwrap();
        assert_eq!(builder.as_bytes(), &[0, 0, 0b0000_0001]);

        builder.set("firsts", true).unwrap();
        builder.set("second_1", true).unwrap();
        assert_eq!(builder.as_bytes(), &[0b1111_0000, 0b0000_0001, 0b0000_0001]);
        assert_eq!(builder.size(), 3);
    }

    #[test]
    fn test_rejects_cycle() {
        let spec = MaskSpec::new(1)
            .flag(FlagSpec::new("a", 0).implies(&["b"]))
            .flag(FlagSpec::new("b", 1).implies(&["c"]))
            .flag(FlagSpec::new("c", 2).implies(&["a"]));
        assert_eq!(
            CompiledMask::try_from(&spec).unwrap_err(),
            CompileError::CyclicImplication("a".to_string())
        );
    }

    #[test]
    fn test_rejects_conflict() {
        let spec = MaskSpec::new(1)
            .flag(FlagSpec::new("a", 0).implies(&["b"]).excludes(&["c"]))
            .flag(FlagSpec::new("b", 1).implies(&["c"]))
            .flag(FlagSpec::new("c", 2));
        assert_eq!(
            CompiledMask::try_from(&spec).unwrap_err(),
            CompileError::ConflictingFlags {
                flag: "a".to_string(),
                other: "c".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_bad_layout() {
        let wide = MaskSpec::new(9);
        assert_eq!(
            CompiledMask::try_from(&wide).unwrap_err(),
            CompileError::InvalidMaskWidth(9)
        );

        let out_of_range = MaskSpec::new(1).flag(FlagSpec::new("a", 8));
        assert_eq!(
            CompiledMask::try_from(&out_of_range).unwrap_err(),
            CompileError::FlagBitOutOfRange {
                flag: "a".to_string(),
                bit: 8,
                bits: 8
            }
        );

        let shared = MaskSpec::new(1)
            .flag(FlagSpec::new("a", 1))
            .flag(FlagSpec::new("b", 1));
        assert_eq!(
            CompiledMask::try_from(&shared).unwrap_err(),
            CompileError::DuplicateFlagBit("a".to_string(), "b".to_string())
        );

        let unknown = MaskSpec::new(1).flag(FlagSpec::new("a", 1).implies(&["z"]));
        assert_eq!(
            CompiledMask::try_from(&unknown).unwrap_err(),
            CompileError::UnknownFlag("z".to_string())
        );
    }
}
