//! Whole-image JPEG 2000 encoding and decoding.
//!
//! The codestream layout is `SOC SIZ COD QCD (SOT SOD <tile body>)+ EOC`.
//! Each tile body holds one section per component: a four-byte
//! width/height header followed by the EBCOT-coded code-blocks of every
//! subband, each prefixed with its magnitude bit-plane count and codeword
//! length. Subbands are walked coarsest first (final LL, then HL/LH/HH
//! per level down to the finest), blocks in partition order, so the
//! geometry is fully determined by the main header and never repeated in
//! the stream.

use log::trace;

use super::block_coder::{decode_block, encode_block};
use super::codestream::{CodestreamReader, CodestreamWriter};
use super::dwt::{self, SubbandOrientation, SubbandRect};
use super::markers::{CodSegment, ComponentSiz, QcdSegment, SizSegment, SotSegment, TransformKind};
use super::rct;
use super::tile::{effective_levels, extract_block, insert_block, partition_code_blocks, CodeBlockRect};
use crate::bit_io::ByteReader;
use crate::error::CodecError;
use crate::jpeg_marker_code::J2kMarkerCode;

/// Reversible JPEG 2000 codec with a single-layer LRCP layout.
#[derive(Debug, Clone, Copy)]
pub struct Jpeg2000Codec {
    pub decomposition_levels: u8,
    pub guard_bits: u8,
    pub code_block_width: u32,
    pub code_block_height: u32,
    /// Nominal tile size; zero means one tile covering the frame.
    pub tile_width: u32,
    pub tile_height: u32,
}

impl Default for Jpeg2000Codec {
    fn default() -> Self {
        Self {
            decomposition_levels: 5,
            guard_bits: 2,
            code_block_width: 64,
            code_block_height: 64,
            tile_width: 0,
            tile_height: 0,
        }
    }
}

impl Jpeg2000Codec {
    /// A codec that splits the frame into tiles of the given nominal size.
    pub fn tiled(tile_width: u32, tile_height: u32) -> Self {
        Self {
            tile_width,
            tile_height,
            ..Self::default()
        }
    }
}

/// Fully reconstructed image: one plane per component.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub planes: Vec<Vec<u16>>,
    pub width: u32,
    pub height: u32,
    pub precision: u8,
}

impl Jpeg2000Codec {
    /// Encodes a single grayscale component.
    pub fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let plane = self.level_shift(pixels, width, height, precision)?;
        self.encode_planes(vec![plane], width, height, precision, false)
    }

    /// Encodes three equally sized components through the reversible
    /// colour transform.
    pub fn encode_rgb(
        &self,
        red: &[u16],
        green: &[u16],
        blue: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let mut r = self.level_shift(red, width, height, precision)?;
        let mut g = self.level_shift(green, width, height, precision)?;
        let mut b = self.level_shift(blue, width, height, precision)?;
        rct::forward(&mut r, &mut g, &mut b);
        self.encode_planes(vec![r, g, b], width, height, precision, true)
    }

    fn level_shift(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<i32>, CodecError> {
        if !(2..=16).contains(&precision) {
            return Err(CodecError::UnsupportedPrecision);
        }
        if width == 0 || height == 0 || pixels.len() != (width as usize) * (height as usize) {
            return Err(CodecError::DimensionMismatch);
        }
        let offset = 1i32 << (precision - 1);
        Ok(pixels.iter().map(|&value| value as i32 - offset).collect())
    }

    fn encode_planes(
        &self,
        planes: Vec<Vec<i32>>,
        width: u32,
        height: u32,
        precision: u8,
        multi_component: bool,
    ) -> Result<Vec<u8>, CodecError> {
        let (tile_width, tile_height) = if self.tile_width == 0 || self.tile_height == 0 {
            (width, height)
        } else {
            (self.tile_width.min(width), self.tile_height.min(height))
        };
        let levels = effective_levels(
            tile_width as usize,
            tile_height as usize,
            self.decomposition_levels,
        );

        let mut cod = CodSegment::reversible_default(levels, multi_component);
        cod.code_block_width_exp = self.code_block_width.ilog2() as u8 - 2;
        cod.code_block_height_exp = self.code_block_height.ilog2() as u8 - 2;

        let siz = SizSegment {
            width,
            height,
            tile_width,
            tile_height,
            components: vec![ComponentSiz::unsigned(precision); planes.len()],
            ..SizSegment::default()
        };
        let qcd = QcdSegment::reversible_default(levels, precision, self.guard_bits);

        let mut writer = CodestreamWriter::new();
        writer.write_soc();
        writer.write_siz(&siz);
        writer.write_cod(&cod);
        writer.write_qcd(&qcd);

        for (tile_index, tile) in tile_grid(&siz).into_iter().enumerate() {
            let mut body = Vec::new();
            for plane in &planes {
                let mut region = extract_block(plane, width as usize, tile);
                dwt::forward_multi(
                    &mut region,
                    tile.width as usize,
                    tile.height as usize,
                    levels,
                );
                self.serialize_tile_component(
                    &region,
                    tile.width,
                    tile.height,
                    levels,
                    &mut body,
                );
            }
            writer.write_sot(&SotSegment {
                tile_index: tile_index as u16,
                tile_part_length: 14 + body.len() as u32,
                tile_part_index: 0,
                tile_part_count: 1,
            });
            writer.write_sod();
            writer.write_bytes(&body);
        }
        writer.write_eoc();
        Ok(writer.into_bytes())
    }

    fn serialize_tile_component(
        &self,
        coefficients: &[i32],
        width: u32,
        height: u32,
        levels: u8,
        body: &mut Vec<u8>,
    ) {
        body.extend_from_slice(&(width as u16).to_be_bytes());
        body.extend_from_slice(&(height as u16).to_be_bytes());
        for band in subband_sequence(width, height, levels) {
            for rect in partition_code_blocks(band, self.code_block_width, self.code_block_height)
            {
                let block = extract_block(coefficients, width as usize, rect);
                let encoded = encode_block(&block, rect.width as usize, rect.height as usize);
                body.push(encoded.bit_planes);
                body.extend_from_slice(&(encoded.data.len() as u16).to_be_bytes());
                body.extend_from_slice(&encoded.data);
            }
        }
    }

    /// Decodes a codestream produced by this codec.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let mut reader = CodestreamReader::new(bytes);
        let (header, stop) = reader.read_main_header()?;

        let cod = header.cod.ok_or(CodecError::InvalidCodestream)?;
        if cod.transform != TransformKind::Reversible53 {
            return Err(CodecError::UnsupportedTransform);
        }
        let component_count = header.siz.components.len();
        if component_count != 1 && component_count != 3 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        let width = header.siz.width;
        let height = header.siz.height;
        let precision = header.siz.components[0].precision;
        if !(2..=16).contains(&precision) {
            return Err(CodecError::UnsupportedPrecision);
        }
        let levels = cod.decomposition_levels;

        let plane_len = (width as usize) * (height as usize);
        let mut planes = vec![vec![0i32; plane_len]; component_count];

        if stop == J2kMarkerCode::StartOfData {
            // Untiled stream: the single body covers the frame.
            let frame = CodeBlockRect {
                x0: 0,
                y0: 0,
                width,
                height,
            };
            self.decode_tile_body(&mut reader, &mut planes, frame, width, levels, &cod)?;
            reader.expect_marker(J2kMarkerCode::EndOfCodestream)?;
        } else {
            let grid = tile_grid(&header.siz);
            let mut tiles_seen = 0usize;
            loop {
                let sot = reader.read_sot()?;
                trace!("tile {} part length {}", sot.tile_index, sot.tile_part_length);
                reader.expect_marker(J2kMarkerCode::StartOfData)?;
                let tile = *grid
                    .get(sot.tile_index as usize)
                    .ok_or(CodecError::InvalidSegmentLength)?;
                self.decode_tile_body(&mut reader, &mut planes, tile, width, levels, &cod)?;
                tiles_seen += 1;

                match reader.read_tile_marker()? {
                    J2kMarkerCode::StartOfTile => continue,
                    J2kMarkerCode::EndOfCodestream => break,
                    _ => return Err(CodecError::InvalidMarker),
                }
            }
            if tiles_seen != grid.len() {
                return Err(CodecError::TruncatedInput);
            }
        }

        if component_count == 3 && cod.multi_component_transform != 0 {
            let (first, rest) = planes.split_at_mut(1);
            let (second, third) = rest.split_at_mut(1);
            rct::inverse(&mut first[0], &mut second[0], &mut third[0]);
        }

        let offset = 1i32 << (precision - 1);
        let max_value = (1i32 << precision) - 1;
        let planes = planes
            .into_iter()
            .map(|plane| {
                plane
                    .into_iter()
                    .map(|value| (value + offset).clamp(0, max_value) as u16)
                    .collect()
            })
            .collect();

        Ok(DecodedImage {
            planes,
            width,
            height,
            precision,
        })
    }

    /// Reads one tile body (every component section) and scatters the
    /// reconstructed samples into the frame planes.
    fn decode_tile_body(
        &self,
        reader: &mut CodestreamReader<'_>,
        planes: &mut [Vec<i32>],
        tile: CodeBlockRect,
        frame_width: u32,
        levels: u8,
        cod: &CodSegment,
    ) -> Result<(), CodecError> {
        let mut body = ByteReader::new(reader.remaining());
        for plane in planes.iter_mut() {
            let region = self.deserialize_tile_component(&mut body, tile, levels, cod)?;
            insert_block(plane, frame_width as usize, tile, &region);
        }
        reader.advance(body.position())
    }

    fn deserialize_tile_component(
        &self,
        body: &mut ByteReader<'_>,
        tile: CodeBlockRect,
        levels: u8,
        cod: &CodSegment,
    ) -> Result<Vec<i32>, CodecError> {
        let stored_width = body.read_u16()? as u32;
        let stored_height = body.read_u16()? as u32;
        if stored_width != tile.width || stored_height != tile.height {
            return Err(CodecError::DimensionMismatch);
        }

        let width = tile.width as usize;
        let height = tile.height as usize;
        let mut coefficients = vec![0i32; width * height];
        for band in subband_sequence(tile.width, tile.height, levels) {
            for rect in partition_code_blocks(band, cod.code_block_width(), cod.code_block_height())
            {
                let bit_planes = body.read_u8()?;
                let data_len = body.read_u16()? as usize;
                let remaining = body.remaining();
                if remaining.len() < data_len {
                    return Err(CodecError::TruncatedInput);
                }
                let block = decode_block(
                    &remaining[..data_len],
                    rect.width as usize,
                    rect.height as usize,
                    bit_planes,
                );
                body.advance(data_len)?;
                insert_block(&mut coefficients, width, rect, &block);
            }
        }
        dwt::inverse_multi(&mut coefficients, width, height, levels);
        Ok(coefficients)
    }
}

/// Row-major tile rectangles covering the frame, derived from SIZ.
fn tile_grid(siz: &SizSegment) -> Vec<CodeBlockRect> {
    let mut tiles = Vec::new();
    let mut y = siz.tile_y_offset;
    while y < siz.height {
        let tile_height = siz.tile_height.min(siz.height - y);
        let mut x = siz.tile_x_offset;
        while x < siz.width {
            let tile_width = siz.tile_width.min(siz.width - x);
            tiles.push(CodeBlockRect {
                x0: x,
                y0: y,
                width: tile_width,
                height: tile_height,
            });
            x += siz.tile_width;
        }
        y += siz.tile_height;
    }
    tiles
}

/// Coarsest-first subband walk shared by the serializer and the parser.
fn subband_sequence(width: u32, height: u32, levels: u8) -> Vec<SubbandRect> {
    if levels == 0 {
        return vec![SubbandRect {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }];
    }
    let mut bands = vec![dwt::subband_bounds(width, height, levels, SubbandOrientation::LL)];
    for level in (1..=levels).rev() {
        bands.push(dwt::subband_bounds(width, height, level, SubbandOrientation::HL));
        bands.push(dwt::subband_bounds(width, height, level, SubbandOrientation::LH));
        bands.push(dwt::subband_bounds(width, height, level, SubbandOrientation::HH));
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_with(codec: &Jpeg2000Codec, pixels: &[u16], width: u32, height: u32, precision: u8) -> Vec<u8> {
        let encoded = codec.encode(pixels, width, height, precision).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.width, width);
        assert_eq!(decoded.height, height);
        assert_eq!(decoded.planes.len(), 1);
        assert_eq!(decoded.planes[0], pixels);
        encoded
    }

    fn roundtrip(pixels: &[u16], width: u32, height: u32, precision: u8) -> Vec<u8> {
        roundtrip_with(&Jpeg2000Codec::default(), pixels, width, height, precision)
    }

    #[test]
    fn gradient_16x16_roundtrip() {
        let pixels: Vec<u16> = (0..256).map(|i| (i as u16 % 16) * 17).collect();
        roundtrip(&pixels, 16, 16, 8);
    }

    #[test]
    fn xor_32x32_roundtrip() {
        let pixels: Vec<u16> = (0..32u16 * 32)
            .map(|i| ((i / 32) ^ (i % 32)) * 8)
            .collect();
        roundtrip(&pixels, 32, 32, 8);
    }

    #[test]
    fn non_power_of_two_roundtrip() {
        let pixels: Vec<u16> = (0..33 * 27).map(|i| (i * 7 % 4096) as u16).collect();
        roundtrip(&pixels, 33, 27, 12);
    }

    #[test]
    fn solid_64x64_compresses() {
        let pixels = vec![128u16; 64 * 64];
        let encoded = roundtrip(&pixels, 64, 64, 8);
        assert!(
            encoded.len() < 64 * 64 * 2,
            "solid frame should compress, got {} bytes",
            encoded.len()
        );
    }

    #[test]
    fn sixteen_bit_roundtrip() {
        let pixels: Vec<u16> = (0..64u32 * 64)
            .map(|i| (i * 211 % 65536) as u16)
            .collect();
        roundtrip(&pixels, 64, 64, 16);
    }

    #[test]
    fn tiled_roundtrip_with_partial_edge_tiles() {
        // 100x80 with 32x32 tiles: a 4x3 grid whose right column and
        // bottom row are truncated.
        let pixels: Vec<u16> = (0..100u32 * 80)
            .map(|i| ((i % 100) * (i / 100) % 256) as u16)
            .collect();
        let codec = Jpeg2000Codec::tiled(32, 32);
        let encoded = roundtrip_with(&codec, &pixels, 100, 80, 8);

        // One SOT per tile.
        let sot_count = encoded.windows(2).filter(|pair| pair == &[0xFF, 0x90]).count();
        assert_eq!(sot_count, 12);
    }

    #[test]
    fn tiled_stream_decodes_with_default_codec() {
        let pixels: Vec<u16> = (0..48u32 * 48).map(|i| (i % 251) as u16).collect();
        let encoded = Jpeg2000Codec::tiled(16, 16)
            .encode(&pixels, 48, 48, 8)
            .unwrap();
        // Tiling is carried entirely by the codestream.
        let decoded = Jpeg2000Codec::default().decode(&encoded).unwrap();
        assert_eq!(decoded.planes[0], pixels);
    }

    #[test]
    fn rgb_32x32_roundtrip() {
        let red: Vec<u16> = (0..1024).map(|i| (i % 256) as u16).collect();
        let green: Vec<u16> = (0..1024).map(|i| (255 - i % 256) as u16).collect();
        let blue: Vec<u16> = (0..1024).map(|i| (i / 4 % 256) as u16).collect();

        let codec = Jpeg2000Codec::default();
        let encoded = codec
            .encode_rgb(&red, &green, &blue, 32, 32, 8)
            .unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.planes.len(), 3);
        assert_eq!(decoded.planes[0], red);
        assert_eq!(decoded.planes[1], green);
        assert_eq!(decoded.planes[2], blue);
    }

    #[test]
    fn tiled_rgb_roundtrip() {
        let red: Vec<u16> = (0..40u32 * 24).map(|i| (i % 256) as u16).collect();
        let green: Vec<u16> = (0..40u32 * 24).map(|i| (i * 3 % 256) as u16).collect();
        let blue: Vec<u16> = (0..40u32 * 24).map(|i| (255 - i % 256) as u16).collect();

        let codec = Jpeg2000Codec::tiled(16, 16);
        let encoded = codec.encode_rgb(&red, &green, &blue, 40, 24, 8).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.planes[0], red);
        assert_eq!(decoded.planes[1], green);
        assert_eq!(decoded.planes[2], blue);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let codec = Jpeg2000Codec::default();
        assert_eq!(
            codec.encode(&[0u16; 10], 4, 4, 8).unwrap_err(),
            CodecError::DimensionMismatch
        );
    }

    #[test]
    fn truncated_tile_body_is_rejected() {
        let pixels: Vec<u16> = (0..256).map(|i| i as u16).collect();
        let codec = Jpeg2000Codec::default();
        let encoded = codec.encode(&pixels, 16, 16, 8).unwrap();
        assert!(codec.decode(&encoded[..encoded.len() / 2]).is_err());
    }
}
