//! Region-bounded bit cursor over an immutable byte slice.
//!
//! Bits are addressed MSB-first: bit 0 is the high bit of the first byte.
//! A reader covers a `[start, end)` bit region; framed subtypes and
//! positioned instances get independent bounded views over the same bytes.

use crate::builtin::EndianHint;
use crate::errors::ReadError;

/// Byte (or bit) order of a multi-unit read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Applies a type-name endian suffix over the cursor's current setting.
    pub fn with_hint(self, hint: EndianHint) -> ByteOrder {
        match hint {
            EndianHint::Current => self,
            EndianHint::Little => ByteOrder::Little,
            EndianHint::Big => ByteOrder::Big,
        }
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    start: usize,
    end: usize,
    pos: usize,
    /// Byte order for multi-byte integer and float reads.
    pub endian: ByteOrder,
    /// Bit order for bit-field reads.
    pub bit_endian: ByteOrder,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader {
            data,
            start: 0,
            end: data.len() * 8,
            pos: 0,
            endian: ByteOrder::Big,
            bit_endian: ByteOrder::Big,
        }
    }

    /// A bounded view over the same bytes, positioned at `start_bit`,
    /// inheriting the current endianness.
    pub fn view(&self, start_bit: usize, end_bit: usize) -> Reader<'a> {
        let end = end_bit.min(self.data.len() * 8);
        let start = start_bit.min(end);
        Reader {
            data: self.data,
            start,
            end,
            pos: start,
            endian: self.endian,
            bit_endian: self.bit_endian,
        }
    }

    /// Current absolute bit position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Region bounds as absolute bit offsets.
    pub fn region(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn bits_left(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.end
    }

    /// Skips ahead to the next byte boundary, if not already on one.
    pub fn align_to_byte(&mut self) {
        let rem = self.pos % 8;
        if rem != 0 {
            self.pos += 8 - rem;
        }
    }

    /// Advances past `n` bits, used by framed reads that consume their whole
    /// declared extent.
    pub fn skip(&mut self, n: usize) -> Result<(), ReadError> {
        self.claim(n)?;
        Ok(())
    }

    /// Checks that `n` bits are available and advances, returning the
    /// position the read starts at.
    fn claim(&mut self, n: usize) -> Result<usize, ReadError> {
        if self
            .pos
            .checked_add(n)
            .map_or(true, |after| after > self.end)
        {
            return Err(ReadError::OutOfBounds);
        }
        let at = self.pos;
        self.pos += n;
        Ok(at)
    }

    fn bit_at_msb(&self, bit_pos: usize) -> u64 {
        let byte = self.data[bit_pos / 8];
        ((byte >> (7 - bit_pos % 8)) & 1) as u64
    }

    fn bit_at_lsb(&self, bit_pos: usize) -> u64 {
        let byte = self.data[bit_pos / 8];
        ((byte >> (bit_pos % 8)) & 1) as u64
    }

    /// Reads `n` bits MSB-first as an unsigned value (max 64).
    pub fn read_bits(&mut self, n: u32) -> Result<u64, ReadError> {
        if n > 64 {
            return Err(ReadError::TooManyBitsRead);
        }
        let at = self.claim(n as usize)?;

        let mut value = 0u64;
        for i in 0..n as usize {
            value = (value << 1) | self.bit_at_msb(at + i);
        }
        Ok(value)
    }

    /// Reads `n` bits taking bits from the low end of each byte first.
    fn read_bits_lsb(&mut self, n: u32) -> Result<u64, ReadError> {
        if n > 64 {
            return Err(ReadError::TooManyBitsRead);
        }
        let at = self.claim(n as usize)?;

        let mut value = 0u64;
        for i in 0..n as usize {
            value |= self.bit_at_lsb(at + i) << i;
        }
        Ok(value)
    }

    /// Reads an `n`-bit bit field in the given bit order.
    pub fn read_bitfield(&mut self, n: u32, bit_order: ByteOrder) -> Result<u64, ReadError> {
        match bit_order {
            ByteOrder::Big => self.read_bits(n),
            ByteOrder::Little => self.read_bits_lsb(n),
        }
    }

    pub fn read_bool(&mut self, bit_order: ByteOrder) -> Result<bool, ReadError> {
        Ok(self.read_bitfield(1, bit_order)? != 0)
    }

    /// Reads an unsigned integer of `n` bits in the given byte order.
    /// Little-endian assembly applies to whole-byte widths.
    pub fn read_uint(&mut self, n: u32, order: ByteOrder) -> Result<u64, ReadError> {
        let v = self.read_bits(n)?;
        if order == ByteOrder::Little && n > 8 && n % 8 == 0 {
            return Ok(v.swap_bytes() >> (64 - n));
        }
        Ok(v)
    }

    pub fn read_sint(&mut self, n: u32, order: ByteOrder) -> Result<i64, ReadError> {
        Ok(sign_extend(self.read_uint(n, order)?, n))
    }

    pub fn read_f32(&mut self, order: ByteOrder) -> Result<f32, ReadError> {
        Ok(f32::from_bits(self.read_uint(32, order)? as u32))
    }

    pub fn read_f64(&mut self, order: ByteOrder) -> Result<f64, ReadError> {
        Ok(f64::from_bits(self.read_uint(64, order)?))
    }

    /// Reads `n` bytes. Works at any bit offset; bytes are taken MSB-first.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ReadError> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_bits(8)? as u8);
        }
        Ok(out)
    }

    /// Reads a UTF-8 string of exactly `n` bytes.
    pub fn read_utf8(&mut self, n: usize) -> Result<String, ReadError> {
        String::from_utf8(self.read_bytes(n)?).map_err(|_| ReadError::InvalidUtf8)
    }

    /// Reads a UTF-8 string up to and consuming a null terminator.
    pub fn read_utf8_z(&mut self) -> Result<String, ReadError> {
        let mut bytes = Vec::new();
        loop {
            if self.is_end() {
                return Err(ReadError::UnterminatedString);
            }
            match self.read_bits(8)? as u8 {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| ReadError::InvalidUtf8)
    }
}
