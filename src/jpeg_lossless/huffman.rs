//! Huffman coding for the JPEG Lossless (Process 14) scan.
//!
//! Tables follow the standard DHT derivation (ITU-T T.81 Annex C): codes
//! are assigned canonically from the per-length symbol counts. Decoding
//! consults an 8-bit lookup table for short codes and falls back to the
//! MINCODE/MAXCODE walk for longer ones.

use crate::bit_io::{BitReader, BitWriter};
use crate::error::CodecError;

/// Highest DPCM difference category: SSSS = 16 carries no extra bits and
/// stands for a difference of 32768.
pub const MAX_CATEGORY: u8 = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct HuffmanCode {
    pub code: u16,
    pub length: u8,
}

#[derive(Clone)]
pub struct HuffmanTable {
    min_code: [i32; 16],
    max_code: [i32; 16],
    value_offset: [i32; 16],
    values: Vec<u8>,
    /// Fast path: 8-bit prefix → (symbol, code length); length 0 = miss.
    lookup: Box<[(u8, u8); 256]>,
    /// Encode side: symbol → code.
    codes: [HuffmanCode; 256],
}

impl HuffmanTable {
    /// Builds a table from a DHT segment's BITS and HUFFVAL arrays.
    pub fn build_from_dht(lengths: &[u8; 16], values: &[u8]) -> Result<Self, CodecError> {
        let total: usize = lengths.iter().map(|&count| count as usize).sum();
        if total != values.len() || total == 0 {
            return Err(CodecError::InvalidSegmentLength);
        }

        let mut table = Self {
            min_code: [0; 16],
            max_code: [-1; 16],
            value_offset: [0; 16],
            values: values.to_vec(),
            lookup: Box::new([(0, 0); 256]),
            codes: [HuffmanCode::default(); 256],
        };

        let mut code = 0u32;
        let mut value_index = 0usize;
        for bit_length in 1..=16 {
            let count = lengths[bit_length - 1] as usize;
            if count > 0 {
                if code + count as u32 > (1 << bit_length) {
                    return Err(CodecError::InvalidHuffmanCode);
                }
                table.min_code[bit_length - 1] = code as i32;
                table.value_offset[bit_length - 1] = value_index as i32;
                for _ in 0..count {
                    let symbol = values[value_index];
                    table.codes[symbol as usize] = HuffmanCode {
                        code: code as u16,
                        length: bit_length as u8,
                    };
                    if bit_length <= 8 {
                        let shift = 8 - bit_length;
                        let base = (code << shift) as usize;
                        for entry in &mut table.lookup[base..base + (1 << shift)] {
                            *entry = (symbol, bit_length as u8);
                        }
                    }
                    code += 1;
                    value_index += 1;
                }
                table.max_code[bit_length - 1] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(table)
    }

    /// Decodes one symbol from the bit stream.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u8, CodecError> {
        if let Ok(prefix) = reader.peek_bits(8) {
            let (symbol, length) = self.lookup[prefix as usize];
            if length > 0 {
                reader.read_bits(length)?;
                return Ok(symbol);
            }
        }
        // Long code, or near the end of the stream.
        let mut code = 0i32;
        for bit_length in 0..16 {
            code = (code << 1) | reader.read_bit()? as i32;
            if code <= self.max_code[bit_length] {
                let index = self.value_offset[bit_length] + (code - self.min_code[bit_length]);
                return Ok(self.values[index as usize]);
            }
        }
        Err(CodecError::InvalidHuffmanCode)
    }

    pub fn encode(&self, writer: &mut BitWriter, symbol: u8) -> Result<(), CodecError> {
        let entry = self.codes[symbol as usize];
        if entry.length == 0 {
            return Err(CodecError::InvalidHuffmanCode);
        }
        writer.write_bits(entry.code as u32, entry.length);
        Ok(())
    }
}

/// Difference category (SSSS) of a DPCM value in `[-32768, 32767]`.
pub fn category(difference: i32) -> u8 {
    if difference == -32768 {
        return MAX_CATEGORY;
    }
    (32 - difference.unsigned_abs().leading_zeros()) as u8
}

/// The `SSSS` appended bits of a difference (T.81 table H.2 convention:
/// negative values store `value - 1` in the low bits).
pub fn difference_bits(difference: i32, ssss: u8) -> u16 {
    if difference >= 0 {
        difference as u16
    } else {
        (difference - 1) as u16 & ((1u32 << ssss) - 1) as u16
    }
}

/// Inverse of [`difference_bits`]: sign-extends `ssss` appended bits.
pub fn extend_difference(bits: u16, ssss: u8) -> i32 {
    if ssss == 0 {
        return 0;
    }
    if ssss == MAX_CATEGORY {
        return 32768;
    }
    let threshold = 1u16 << (ssss - 1);
    if bits < threshold {
        bits as i32 - (1 << ssss) + 1
    } else {
        bits as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_io::BitPadding;

    fn sample_table() -> HuffmanTable {
        // Three symbols: 0 → "0", 2 → "10", 3 → "110".
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        lengths[1] = 1;
        lengths[2] = 1;
        HuffmanTable::build_from_dht(&lengths, &[0, 2, 3]).unwrap()
    }

    #[test]
    fn decode_uses_canonical_codes() {
        let table = sample_table();
        // Bits: 0 | 10 | 110 | 0 → 0101 1000.
        let data = [0b0101_1000];
        let mut reader = BitReader::new(&data);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
        assert_eq!(table.decode(&mut reader).unwrap(), 2);
        assert_eq!(table.decode(&mut reader).unwrap(), 3);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn encode_decode_symbols() {
        let table = sample_table();
        let mut writer = BitWriter::new();
        for symbol in [3u8, 0, 2, 2, 3] {
            table.encode(&mut writer, symbol).unwrap();
        }
        let bytes = writer.finish(BitPadding::Ones);
        let mut reader = BitReader::new(&bytes);
        for expected in [3u8, 0, 2, 2, 3] {
            assert_eq!(table.decode(&mut reader).unwrap(), expected);
        }
    }

    #[test]
    fn oversubscribed_table_is_rejected() {
        let mut lengths = [0u8; 16];
        lengths[0] = 3; // three 1-bit codes cannot exist
        assert!(HuffmanTable::build_from_dht(&lengths, &[0, 1, 2]).is_err());
    }

    #[test]
    fn categories_and_extension_are_inverse() {
        for difference in [-255, -128, -32, -1, 0, 1, 5, 127, 255, 1024, -32768, 32767] {
            let ssss = category(difference);
            if ssss == MAX_CATEGORY {
                assert_eq!(extend_difference(0, ssss), 32768);
                continue;
            }
            let bits = difference_bits(difference, ssss);
            assert_eq!(extend_difference(bits, ssss), difference, "diff {difference}");
        }
    }

    #[test]
    fn category_boundaries() {
        assert_eq!(category(0), 0);
        assert_eq!(category(1), 1);
        assert_eq!(category(-1), 1);
        assert_eq!(category(2), 2);
        assert_eq!(category(-3), 2);
        assert_eq!(category(255), 8);
        assert_eq!(category(-255), 8);
        assert_eq!(category(-32768), 16);
    }
}
