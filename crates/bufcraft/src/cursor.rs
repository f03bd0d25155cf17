//! Forward-only write cursor over a caller-provided buffer.

use crate::{errors::WriteError, primitive::Primitive};

#[derive(Debug)]
pub struct Cursor<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

/// A zeroed slot claimed by [Cursor::reserve], filled in later by [Cursor::patch].
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    at: usize,
    len: usize,
}

impl Reservation {
    pub fn at(&self) -> usize {
        self.at
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<'b> Cursor<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn claim(&mut self, len: usize) -> Result<usize, WriteError> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(WriteError::WriteFailed {
                needed: end,
                available: self.buf.len(),
            });
        }

        let at = self.pos;
        self.pos = end;
        Ok(at)
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let at = self.claim(bytes.len())?;
        self.buf[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_primitive(&mut self, repr: &Primitive, raw: u64) -> Result<(), WriteError> {
        let at = self.claim(repr.width)?;
        repr.encode_into(&mut self.buf[at..at + repr.width], raw);
        Ok(())
    }

    pub fn reserve(&mut self, len: usize) -> Result<Reservation, WriteError> {
        let at = self.claim(len)?;
        self.buf[at..at + len].fill(0);
        Ok(Reservation { at, len })
    }

    /// Writes `raw` into a slot reserved with `repr.width` bytes.
    pub fn patch(&mut self, reservation: Reservation, repr: &Primitive, raw: u64) {
        let end = reservation.at + reservation.len.min(repr.width);
        repr.encode_into(&mut self.buf[reservation.at..end], raw);
    }
}
