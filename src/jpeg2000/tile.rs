//! Tile-level coefficient coding.
//!
//! A tile is transformed with the multi-level 5/3 DWT and serialised as a
//! four-byte geometry header followed by every coefficient as a signed
//! 32-bit big-endian integer. That serialisation keeps the payload
//! byte-exactly reversible; the EBCOT block path operates on the same
//! partition geometry defined here.

use super::dwt;
use crate::bit_io::{ByteReader, ByteWriter};
use crate::error::CodecError;

/// A code-block rectangle inside a subband, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlockRect {
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
}

/// Splits a subband into code-blocks of the nominal size; the last row and
/// column are truncated to the band boundary. Nominal dimensions must be
/// powers of two no smaller than four.
pub fn partition_code_blocks(
    band: dwt::SubbandRect,
    nominal_width: u32,
    nominal_height: u32,
) -> Vec<CodeBlockRect> {
    debug_assert!(nominal_width.is_power_of_two() && nominal_width >= 4);
    debug_assert!(nominal_height.is_power_of_two() && nominal_height >= 4);

    let mut blocks = Vec::new();
    let mut y = band.y0;
    while y < band.y1 {
        let height = nominal_height.min(band.y1 - y);
        let mut x = band.x0;
        while x < band.x1 {
            let width = nominal_width.min(band.x1 - x);
            blocks.push(CodeBlockRect {
                x0: x,
                y0: y,
                width,
                height,
            });
            x += nominal_width;
        }
        y += nominal_height;
    }
    blocks
}

/// Copies a code-block out of the coefficient frame.
pub fn extract_block(data: &[i32], stride: usize, rect: CodeBlockRect) -> Vec<i32> {
    let mut block = Vec::with_capacity((rect.width * rect.height) as usize);
    for y in rect.y0..rect.y0 + rect.height {
        let row = y as usize * stride + rect.x0 as usize;
        block.extend_from_slice(&data[row..row + rect.width as usize]);
    }
    block
}

/// Writes a code-block back into the coefficient frame.
pub fn insert_block(data: &mut [i32], stride: usize, rect: CodeBlockRect, block: &[i32]) {
    debug_assert_eq!(block.len(), (rect.width * rect.height) as usize);
    for (row_index, row) in block.chunks_exact(rect.width as usize).enumerate() {
        let offset = (rect.y0 as usize + row_index) * stride + rect.x0 as usize;
        data[offset..offset + row.len()].copy_from_slice(row);
    }
}

/// Largest level count that keeps the smallest LL subband at least 2×2
/// for this tile.
pub fn effective_levels(width: usize, height: usize, requested: u8) -> u8 {
    let mut levels = requested;
    while levels > 0 {
        let divisor = 1usize << levels;
        if width.div_ceil(divisor) >= 2 && height.div_ceil(divisor) >= 2 {
            break;
        }
        levels -= 1;
    }
    levels
}

/// Transforms the component in place and serialises it. `pixels` must
/// already be level-shifted/colour-transformed by the caller.
pub fn encode_tile(pixels: &[i32], width: usize, height: usize, levels: u8) -> Vec<u8> {
    debug_assert_eq!(pixels.len(), width * height);
    let mut coefficients = pixels.to_vec();
    dwt::forward_multi(&mut coefficients, width, height, levels);

    let mut writer = ByteWriter::new();
    writer.write_u16(width as u16);
    writer.write_u16(height as u16);
    for coefficient in &coefficients {
        writer.write_i32(*coefficient);
    }
    writer.into_bytes()
}

/// Parses a tile payload and reconstructs the component samples.
pub fn decode_tile(payload: &[u8], levels: u8) -> Result<(Vec<i32>, usize, usize), CodecError> {
    let mut reader = ByteReader::new(payload);
    let width = reader.read_u16()? as usize;
    let height = reader.read_u16()? as usize;
    if payload.len() < 4 + width * height * 4 {
        return Err(CodecError::DimensionMismatch);
    }
    let mut coefficients = Vec::with_capacity(width * height);
    for _ in 0..width * height {
        coefficients.push(reader.read_i32()?);
    }
    dwt::inverse_multi(&mut coefficients, width, height, levels);
    Ok((coefficients, width, height))
}

/// Serialised size of a tile payload for the given geometry.
pub fn tile_payload_len(width: usize, height: usize) -> usize {
    4 + width * height * 4
}
