//! Fixed-width integer encoding with a configurable byte order.

use crate::{
    bits::sign_extend,
    errors::{CompileError, ReadError},
};

/// Byte order of a multi-byte integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Most significant byte first.
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Widths an integer field may occupy, in bytes.
pub const SUPPORTED_WIDTHS: [usize; 5] = [1, 2, 3, 4, 8];

/// A resolved integer representation: width, signedness and byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    pub width: usize,
    pub signed: bool,
    pub endian: Endian,
}

impl Primitive {
    /// Validates `width` and builds the representation.
    pub fn new(width: usize, signed: bool, endian: Endian) -> Result<Self, CompileError> {
        if !SUPPORTED_WIDTHS.contains(&width) {
            return Err(CompileError::InvalidWidth(width));
        }

        Ok(Primitive {
            width,
            signed,
            endian,
        })
    }

    /// Largest value this representation can hold.
    pub fn max_value(&self) -> i128 {
        let bits = self.width * 8;
        if self.signed {
            (1i128 << (bits - 1)) - 1
        } else {
            (1i128 << bits) - 1
        }
    }

    /// Smallest value this representation can hold.
    pub fn min_value(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.width * 8 - 1))
        } else {
            0
        }
    }

    /// Whether `value` lies within [Primitive::min_value]..=[Primitive::max_value].
    pub fn fits(&self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Raw bit pattern of `value`, truncated to the width. Caller checks [Primitive::fits].
    pub fn to_raw(&self, value: i128) -> u64 {
        (value as u64) & mask(self.width)
    }

    /// Numeric value of a raw bit pattern, sign-extended when signed.
    pub fn from_raw(&self, raw: u64) -> i128 {
        if self.signed {
            sign_extend(raw, self.width * 8) as i128
        } else {
            raw as i128
        }
    }

    /// Encodes `raw` into `out`, which must be exactly `width` bytes long.
    pub fn encode_into(&self, out: &mut [u8], raw: u64) {
        encode_into(out, raw, self.endian);
    }

    /// Decodes `width` bytes from the front of `bytes`. Caller checks the length.
    pub fn decode(&self, bytes: &[u8]) -> u64 {
        decode(&bytes[..self.width], self.endian)
    }

    /// Reads the raw value stored at `offset` in `data`.
    pub fn read(&self, data: &[u8], offset: usize) -> Result<u64, ReadError> {
        let end = offset.checked_add(self.width).unwrap_or(usize::MAX);
        match data.get(offset..end) {
            Some(bytes) => Ok(decode(bytes, self.endian)),
            None => Err(ReadError::NotEnoughData {
                needed: end,
                available: data.len(),
            }),
        }
    }
}

fn mask(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width * 8)) - 1
    }
}

/// Encodes the low `out.len()` bytes of `value` into `out`.
pub fn encode_into(out: &mut [u8], value: u64, endian: Endian) {
    let width = out.len();
    for (i, byte) in out.iter_mut().enumerate() {
        let shift = match endian {
            Endian::Big => (width - 1 - i) * 8,
            Endian::Little => i * 8,
        };
        *byte = (value >> shift) as u8;
    }
}

/// Encodes `value` into a `width`-byte prefix of the returned array.
pub fn encode(value: u64, width: usize, endian: Endian) -> [u8; 8] {
    let mut out = [0u8; 8];
    encode_into(&mut out[..width.min(8)], value, endian);
    out
}

/// Decodes all of `bytes` (at most 8) as one integer.
pub fn decode(bytes: &[u8], endian: Endian) -> u64 {
    let mut value = 0u64;
    match endian {
        Endian::Big => {
            for &b in bytes {
                value = (value << 8) | b as u64;
            }
        }
        Endian::Little => {
            for &b in bytes.iter().rev() {
                value = (value << 8) | b as u64;
            }
        }
    }

    value
}
