//! DICOM RLE Lossless (PS3.5 Annex G): PackBits segments behind a 64-byte
//! little-endian header.
//!
//! Grayscale only: one segment for 8-bit data, two segments for 16-bit
//! data split into the most-significant and least-significant byte
//! planes. Each segment is padded to even length.

pub mod packbits;

use log::trace;

use crate::error::CodecError;

const HEADER_LEN: usize = 64;
const MAX_SEGMENTS: usize = 15;

#[derive(Debug, Clone, Copy, Default)]
pub struct RleCodec;

impl RleCodec {
    /// Encodes a grayscale frame into an RLE fragment.
    pub fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        if !(2..=16).contains(&precision) {
            return Err(CodecError::UnsupportedPrecision);
        }
        let sample_count = width as usize * height as usize;
        if pixels.len() != sample_count {
            return Err(CodecError::DimensionMismatch);
        }

        let planes: Vec<Vec<u8>> = if precision <= 8 {
            vec![pixels.iter().map(|&value| value as u8).collect()]
        } else {
            vec![
                pixels.iter().map(|&value| (value >> 8) as u8).collect(),
                pixels.iter().map(|&value| value as u8).collect(),
            ]
        };

        let mut offsets = [0u32; MAX_SEGMENTS];
        let mut body = Vec::new();
        for (index, plane) in planes.iter().enumerate() {
            offsets[index] = (HEADER_LEN + body.len()) as u32;
            let mut segment = packbits::pack(plane);
            if segment.len() % 2 != 0 {
                segment.push(0);
            }
            body.extend_from_slice(&segment);
        }

        let mut output = Vec::with_capacity(HEADER_LEN + body.len());
        output.extend_from_slice(&(planes.len() as u32).to_le_bytes());
        for offset in offsets {
            output.extend_from_slice(&offset.to_le_bytes());
        }
        output.extend_from_slice(&body);
        trace!(
            "rle: {} segment(s), {} -> {} bytes",
            planes.len(),
            sample_count * if precision <= 8 { 1 } else { 2 },
            output.len()
        );
        Ok(output)
    }

    /// Decodes an RLE fragment. Width and height are authoritative; the
    /// fragment itself carries no geometry.
    pub fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::TruncatedInput);
        }
        let segment_count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        if segment_count == 0 || segment_count > MAX_SEGMENTS {
            return Err(CodecError::InvalidSegmentLength);
        }
        if segment_count > 2 {
            // Three or more segments means colour data.
            return Err(CodecError::UnsupportedComponentCount);
        }

        let mut offsets = Vec::with_capacity(segment_count + 1);
        for index in 0..segment_count {
            let start = 4 + index * 4;
            let offset = u32::from_le_bytes(data[start..start + 4].try_into().unwrap()) as usize;
            if offset < HEADER_LEN || offset > data.len() {
                return Err(CodecError::InvalidSegmentLength);
            }
            offsets.push(offset);
        }
        offsets.push(data.len());

        let sample_count = width as usize * height as usize;
        let mut planes = Vec::with_capacity(segment_count);
        for window in offsets.windows(2) {
            if window[1] < window[0] {
                return Err(CodecError::InvalidSegmentLength);
            }
            planes.push(packbits::unpack(&data[window[0]..window[1]], sample_count)?);
        }

        let pixels = match planes.as_slice() {
            [plane] => plane.iter().map(|&byte| byte as u16).collect(),
            [high, low] => high
                .iter()
                .zip(low.iter())
                .map(|(&msb, &lsb)| u16::from_be_bytes([msb, lsb]))
                .collect(),
            _ => unreachable!(),
        };
        Ok(pixels)
    }
}
