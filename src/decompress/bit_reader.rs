//! Bit reader for LZX compressed data.
//!
//! LZX feeds its bit stream in 16-bit little-endian words; within each word
//! bits are consumed most-significant first. The reader keeps a 32-bit
//! left-justified accumulator, so `peek` is a single shift.

/// Bit reader over one block's compressed bytes.
///
/// Reads past the end of the slice supply zero bits; the decoder checks
/// [`bytes_consumed`](Self::bytes_consumed) against the declared input size
/// to enforce the format's 16-bit overrun tolerance.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Pending bits, left-justified.
    buffer: u32,
    /// Bits valid in `buffer`.
    bits_in_buffer: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Discard buffered bits. The next `ensure` starts at the current byte
    /// position; used when the stream realigns after an uncompressed block.
    pub fn init(&mut self) {
        self.buffer = 0;
        self.bits_in_buffer = 0;
    }

    #[inline]
    fn next_byte(&mut self) -> u8 {
        let b = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    /// Guarantee at least `n` buffered bits (n <= 16) by pulling 16-bit
    /// little-endian words.
    #[inline]
    pub fn ensure(&mut self, n: u32) {
        debug_assert!(n <= 16);
        while self.bits_in_buffer < n {
            let lo = self.next_byte() as u32;
            let hi = self.next_byte() as u32;
            self.buffer |= ((hi << 8) | lo) << (16 - self.bits_in_buffer);
            self.bits_in_buffer += 16;
        }
    }

    /// Top `n` bits without consuming them. Requires `n` bits buffered.
    #[inline]
    pub fn peek(&self, n: u32) -> u32 {
        debug_assert!(n <= 16);
        if n == 0 {
            return 0;
        }
        self.buffer >> (32 - n)
    }

    /// Consume `n` buffered bits.
    #[inline]
    pub fn remove(&mut self, n: u32) {
        self.buffer <<= n;
        self.bits_in_buffer = self.bits_in_buffer.saturating_sub(n);
    }

    /// ensure + peek + remove. A 0-bit read is a no-op returning 0.
    #[inline]
    pub fn read(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.ensure(n);
        let v = self.peek(n);
        self.remove(n);
        v
    }

    /// Bits currently buffered.
    pub fn bits_available(&self) -> u32 {
        self.bits_in_buffer
    }

    /// Bytes pulled from the slice so far, including zero-fill past the end.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// Step the byte cursor back. Used to un-read an over-buffered word when
    /// realigning for an uncompressed block.
    pub fn rewind(&mut self, bytes: usize) {
        self.pos = self.pos.saturating_sub(bytes);
    }

    /// Skip one raw byte (odd-length uncompressed block padding).
    pub fn skip_byte(&mut self) {
        self.pos += 1;
    }

    /// Read a raw little-endian u32 at the byte cursor, bypassing the bit
    /// buffer. Valid only after `init`.
    pub fn read_u32_le(&mut self) -> Option<u32> {
        let bytes = self.data.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Copy `dst.len()` raw bytes at the byte cursor, bypassing the bit
    /// buffer. Valid only after `init`.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Option<()> {
        let bytes = self.data.get(self.pos..self.pos + dst.len())?;
        dst.copy_from_slice(bytes);
        self.pos += dst.len();
        Some(())
    }
}
