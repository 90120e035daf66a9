//! Huffman coding for JPEG entropy-coded data.
//!
//! Decode tables follow ITU T.81 Annex C and F.2.2.3 (MAXCODE/VALPTR), with an
//! 8-bit lookup table in front for the common short codes. The bit reader
//! and writer handle byte stuffing and restart markers.

use super::parser::HuffmanTable;
use crate::error::{CorruptMeError, Result};

/// Lookup table size (8-bit fast path).
const LUT_BITS: u8 = 8;
const LUT_SIZE: usize = 1 << LUT_BITS;

/// Compiled Huffman table for decoding.
#[derive(Debug, Clone)]
pub struct HuffmanLookup {
    /// Fast lookup table: (symbol, code_length) for codes ≤ 8 bits.
    /// Entry is (0, 0) if code is longer than 8 bits.
    lut: [(u8, u8); LUT_SIZE],
    /// Largest code of each length, -1 if there is none (index 1-16).
    maxcode: [i32; 17],
    /// Smallest code of each length (index 1-16).
    mincode: [i32; 17],
    /// Index into `values` of the first code of each length (index 1-16).
    valptr: [usize; 17],
    /// Symbol values in code-length order.
    values: Vec<u8>,
}

impl HuffmanLookup {
    /// Build lookup tables from a parsed Huffman table.
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        let (code_sizes, codes) = derive_huffman_codes(&table.code_lengths)?;
        if table.values.len() < codes.len() {
            return Err(CorruptMeError::format(
                "Huffman table has fewer symbols than codes",
            ));
        }

        let mut lookup = HuffmanLookup {
            lut: [(0, 0); LUT_SIZE],
            maxcode: [-1; 17],
            mincode: [0; 17],
            valptr: [0; 17],
            values: table.values.clone(),
        };

        let mut k = 0;
        for len in 1..=16usize {
            let count = table.code_lengths[len - 1] as usize;
            if count > 0 {
                lookup.valptr[len] = k;
                lookup.mincode[len] = codes[k] as i32;
                k += count;
                lookup.maxcode[len] = codes[k - 1] as i32;
            }
        }

        for (idx, (&code, &len)) in codes.iter().zip(code_sizes.iter()).enumerate() {
            if len <= LUT_BITS {
                let symbol = lookup.values[idx];
                // Fill all LUT entries that start with this code
                let shift = LUT_BITS - len;
                let base = (code as usize) << shift;
                for entry in &mut lookup.lut[base..base + (1 << shift)] {
                    *entry = (symbol, len);
                }
            }
        }

        Ok(lookup)
    }
}

/// Compiled Huffman table for encoding.
///
/// Maps symbols to (code, length) pairs for O(1) encoding lookup.
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    /// symbol → (code, code_length), None if the symbol is not in the table.
    encode_map: [Option<(u16, u8)>; 256],
}

impl HuffmanEncoder {
    /// Build encoder lookup from a parsed Huffman table.
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        let (code_sizes, codes) = derive_huffman_codes(&table.code_lengths)?;

        let mut encode_map = [None; 256];
        for ((&code, &len), &symbol) in codes.iter().zip(code_sizes.iter()).zip(&table.values) {
            encode_map[symbol as usize] = Some((code, len));
        }

        Ok(HuffmanEncoder { encode_map })
    }

    /// Get code and length for a symbol.
    #[inline]
    pub fn encode(&self, symbol: u8) -> Option<(u16, u8)> {
        self.encode_map[symbol as usize]
    }
}

/// Derive Huffman codes from code length counts.
///
/// Implements ITU T.81 Figures C.1 and C.2.
pub(crate) fn derive_huffman_codes(code_lengths: &[u8; 16]) -> Result<(Vec<u8>, Vec<u16>)> {
    let total: usize = code_lengths.iter().map(|&n| n as usize).sum();
    if total > 256 {
        return Err(CorruptMeError::format(
            "Huffman table has more than 256 symbols",
        ));
    }

    // HUFFSIZE: list of code lengths
    let mut huffsize = Vec::with_capacity(total);
    for (len, &count) in code_lengths.iter().enumerate() {
        for _ in 0..count {
            huffsize.push((len + 1) as u8);
        }
    }

    // HUFFCODE: canonical code for each symbol
    let mut huffcode = Vec::with_capacity(total);
    let mut code: u32 = 0;
    let mut si = huffsize.first().copied().unwrap_or(0);

    for &size in &huffsize {
        while si < size {
            code <<= 1;
            si += 1;
        }
        if code >= (1u32 << size) {
            return Err(CorruptMeError::format("invalid Huffman code lengths (overflow)"));
        }
        huffcode.push(code as u16);
        code += 1;
    }

    Ok((huffsize, huffcode))
}

/// Bit reader for entropy-coded data.
///
/// Removes byte stuffing (0xFF00 → 0xFF) and stops at the first marker. Past
/// the marker, peeks are padded with zero bits but consuming them fails, so a
/// truncated scan surfaces as an error instead of made-up coefficients.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Bit buffer, valid bits are the lowest `num_bits`.
    bits: u64,
    num_bits: u8,
    /// A marker or the end of data was reached while filling.
    at_marker: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            pos: 0,
            bits: 0,
            num_bits: 0,
            at_marker: false,
        }
    }

    /// Current byte position in the data.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn fill_bits(&mut self) {
        while self.num_bits <= 48 && !self.at_marker {
            let Some(&byte) = self.data.get(self.pos) else {
                self.at_marker = true;
                break;
            };

            if byte == 0xFF {
                if self.data.get(self.pos + 1) == Some(&0x00) {
                    self.pos += 2;
                } else {
                    // RST, fill byte or any other marker: leave it for read_restart_marker
                    self.at_marker = true;
                    break;
                }
            } else {
                self.pos += 1;
            }

            self.bits = (self.bits << 8) | byte as u64;
            self.num_bits += 8;
        }
    }

    /// Peek at the next `count` (≤ 16) bits without consuming them.
    #[inline]
    pub fn peek_bits(&mut self, count: u8) -> u16 {
        debug_assert!(count <= 16);
        if self.num_bits < count {
            self.fill_bits();
        }
        let mask = (1u64 << count) - 1;
        let value = if self.num_bits >= count {
            self.bits >> (self.num_bits - count)
        } else {
            self.bits << (count - self.num_bits)
        };
        (value & mask) as u16
    }

    /// Consume `count` bits, failing if they lie beyond the data.
    #[inline]
    pub fn consume_bits(&mut self, count: u8) -> Result<()> {
        if count > self.num_bits {
            return Err(CorruptMeError::format(format!(
                "unexpected end of entropy-coded data at byte {}",
                self.pos
            )));
        }
        self.num_bits -= count;
        Ok(())
    }

    /// Read `count` (≤ 16) bits.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u16> {
        let value = self.peek_bits(count);
        self.consume_bits(count)?;
        Ok(value)
    }

    /// Decode one Huffman symbol.
    pub fn decode_huffman(&mut self, table: &HuffmanLookup) -> Result<u8> {
        let peek = self.peek_bits(LUT_BITS);
        let (symbol, len) = table.lut[peek as usize];
        if len > 0 {
            self.consume_bits(len)?;
            return Ok(symbol);
        }

        // Slow path: codes longer than 8 bits (F.2.2.3)
        for len in (LUT_BITS + 1)..=16 {
            let code = self.peek_bits(len) as i32;
            if code <= table.maxcode[len as usize] {
                self.consume_bits(len)?;
                let idx = table.valptr[len as usize] + (code - table.mincode[len as usize]) as usize;
                return table.values.get(idx).copied().ok_or_else(|| {
                    CorruptMeError::format("Huffman code without symbol")
                });
            }
        }

        Err(CorruptMeError::format(format!(
            "invalid Huffman code at byte {}",
            self.pos
        )))
    }

    /// Read and sign-extend a value of `size` (≤ 16) bits.
    ///
    /// JPEG uses a sign-magnitude representation where the first bit
    /// indicates sign (0 = negative, 1 = positive).
    pub fn receive_extend(&mut self, size: u8) -> Result<i32> {
        if size == 0 {
            return Ok(0);
        }

        let value = self.read_bits(size)? as i32;

        // Sign extension (T.81 Figure F.12)
        let vt = 1 << (size - 1);
        if value < vt {
            Ok(value + (-1 << size) + 1)
        } else {
            Ok(value)
        }
    }

    /// Skip to the next restart marker and consume it.
    ///
    /// Buffered bits are byte padding at this point and get dropped. Returns
    /// the marker number (0-7).
    pub fn read_restart_marker(&mut self) -> Result<u8> {
        self.bits = 0;
        self.num_bits = 0;

        // fill bytes may precede the marker
        while self.data.get(self.pos) == Some(&0xFF) && self.data.get(self.pos + 1) == Some(&0xFF)
        {
            self.pos += 1;
        }

        match (self.data.get(self.pos), self.data.get(self.pos + 1)) {
            (Some(0xFF), Some(&code @ 0xD0..=0xD7)) => {
                self.pos += 2;
                self.at_marker = false;
                Ok(code - 0xD0)
            }
            _ => Err(CorruptMeError::format(format!(
                "missing restart marker at byte {}",
                self.pos
            ))),
        }
    }
}

/// Bit writer for entropy-coded data.
///
/// Handles:
/// - Bit-level writing to byte stream
/// - Byte stuffing (0xFF → 0xFF 0x00)
/// - Padding to byte boundary with 1 bits
pub struct BitWriter {
    data: Vec<u8>,
    /// Bit accumulator, valid bits are the lowest `num_bits` (< 8 between calls).
    bits: u32,
    num_bits: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter {
            data: Vec::with_capacity(capacity),
            bits: 0,
            num_bits: 0,
        }
    }

    /// Write the lowest `count` (≤ 16) bits of `value`, MSB first.
    #[inline]
    pub fn write_bits(&mut self, value: u16, count: u8) {
        debug_assert!(count <= 16);
        if count == 0 {
            return;
        }

        let mask = (1u32 << count) - 1;
        self.bits = (self.bits << count) | (value as u32 & mask);
        self.num_bits += count;

        while self.num_bits >= 8 {
            self.num_bits -= 8;
            let byte = (self.bits >> self.num_bits) as u8;
            self.write_byte(byte);
        }

        self.bits &= (1u32 << self.num_bits) - 1;
    }

    /// Write a Huffman-encoded symbol.
    #[inline]
    pub fn write_huffman(&mut self, symbol: u8, table: &HuffmanEncoder) -> Result<()> {
        let (code, len) = table.encode(symbol).ok_or_else(|| {
            CorruptMeError::unencodable(format!("symbol 0x{:02X} not in Huffman table", symbol))
        })?;
        self.write_bits(code, len);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) {
        self.data.push(byte);
        if byte == 0xFF {
            self.data.push(0x00);
        }
    }

    /// Pad to byte boundary with 1 bits.
    pub fn flush(&mut self) {
        if self.num_bits > 0 {
            let padding = 8 - self.num_bits;
            let value = (self.bits << padding) | ((1u32 << padding) - 1);
            self.write_byte(value as u8);
            self.num_bits = 0;
            self.bits = 0;
        }
    }

    /// Pad to byte boundary and emit restart marker `n` (0-7) unstuffed.
    pub fn write_restart_marker(&mut self, n: u8) {
        self.flush();
        self.data.push(0xFF);
        self.data.push(0xD0 + (n & 0x07));
    }

    /// Get the written data, consuming the writer.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush();
        self.data
    }

    /// Length of the data written so far (complete bytes only).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.num_bits == 0
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the magnitude category and additional bits for a value.
///
/// Returns (size, bits) where size is the number of bits needed and bits is
/// the value itself if positive, or `value + 2^size - 1` if negative. This is
/// the inverse of [`BitReader::receive_extend`].
#[inline]
pub fn encode_coefficient(value: i32) -> (u8, u16) {
    if value == 0 {
        return (0, 0);
    }

    let abs_value = value.unsigned_abs();
    let size = (32 - abs_value.leading_zeros()) as u8;

    let bits = if value < 0 {
        ((1u32 << size) - 1) - abs_value
    } else {
        abs_value
    };

    (size, bits as u16)
}
