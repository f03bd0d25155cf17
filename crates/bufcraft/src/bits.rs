//! Low-level bit access for byte slices.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first byte.

use crate::errors::ReadError;

/// Reads the bit at `bit_pos` (0 = MSB of first byte).
pub fn read_bit_at(data: &[u8], bit_pos: usize) -> Result<bool, ReadError> {
    let byte_index = bit_pos / 8;
    let bit_index = bit_pos % 8;

    let byte = data.get(byte_index).ok_or(ReadError::NotEnoughData {
        needed: byte_index + 1,
        available: data.len(),
    })?;

    Ok((byte >> (7 - bit_index)) & 1 == 1)
}

/// Sets or clears the bit at `bit_pos`. Positions past the end of `data` are ignored.
pub fn write_bit_at(data: &mut [u8], bit_pos: usize, on: bool) {
    let bit = 0x80u8 >> (bit_pos % 8);

    if let Some(byte) = data.get_mut(bit_pos / 8) {
        if on {
            *byte |= bit;
        } else {
            *byte &= !bit;
        }
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
