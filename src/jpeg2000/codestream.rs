//! JPEG 2000 codestream marker segment I/O.
//!
//! The reader scans the main header, populating the SIZ/COD/QCD records
//! and skipping unknown segments by their declared length; it stops at the
//! first SOT (tiled codestreams) or SOD (untiled). The writer is the
//! symmetric producer. Marker words and all multi-byte fields are
//! big-endian, and every segment length includes its own two bytes.

use log::trace;

use super::markers::{
    CodSegment, ComponentSiz, ProgressionOrder, QcdSegment, SizSegment, SotSegment,
    TransformKind,
};
use crate::bit_io::{ByteReader, ByteWriter};
use crate::error::CodecError;
use crate::jpeg_marker_code::{J2kMarkerCode, JPEG_MARKER_START_BYTE};

/// Everything the main header carries ahead of the first tile-part.
#[derive(Debug, Clone, Default)]
pub struct MainHeader {
    pub siz: SizSegment,
    pub cod: Option<CodSegment>,
    pub qcd: Option<QcdSegment>,
}

pub struct CodestreamReader<'a> {
    reader: ByteReader<'a>,
}

impl<'a> CodestreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(source),
        }
    }

    /// Bytes that follow the last consumed marker segment.
    pub fn remaining(&self) -> &'a [u8] {
        self.reader.remaining()
    }

    /// Parses SOC through the marker that opens the tile data. The SOT/SOD
    /// marker itself is consumed; which one was found is returned.
    pub fn read_main_header(&mut self) -> Result<(MainHeader, J2kMarkerCode), CodecError> {
        let soc = u16::from_be_bytes([
            JPEG_MARKER_START_BYTE,
            J2kMarkerCode::StartOfCodestream.into(),
        ]);
        if self.reader.read_u16()? != soc {
            return Err(CodecError::InvalidCodestream);
        }

        let mut header = MainHeader::default();
        loop {
            let marker = self.read_marker()?;
            match marker {
                J2kMarkerCode::ImageAndTileSize => header.siz = self.read_siz()?,
                J2kMarkerCode::CodingStyleDefault => header.cod = Some(self.read_cod()?),
                J2kMarkerCode::QuantizationDefault => header.qcd = Some(self.read_qcd()?),
                J2kMarkerCode::StartOfTile | J2kMarkerCode::StartOfData => {
                    trace!(
                        "main header complete: {}x{}, {} component(s)",
                        header.siz.width,
                        header.siz.height,
                        header.siz.component_count()
                    );
                    return Ok((header, marker));
                }
                J2kMarkerCode::EndOfCodestream => return Err(CodecError::TruncatedInput),
                _ => self.skip_segment()?,
            }
        }
    }

    fn read_marker(&mut self) -> Result<J2kMarkerCode, CodecError> {
        if self.reader.read_u8()? != JPEG_MARKER_START_BYTE {
            return Err(CodecError::InvalidMarker);
        }
        let code = self.reader.read_u8()?;
        J2kMarkerCode::try_from(code).map_err(|_| CodecError::InvalidMarker)
    }

    fn skip_segment(&mut self) -> Result<(), CodecError> {
        let length = self.reader.read_u16()?;
        if length < 2 {
            return Err(CodecError::InvalidSegmentLength);
        }
        self.reader.advance(length as usize - 2)
    }

    fn read_siz(&mut self) -> Result<SizSegment, CodecError> {
        let length = self.reader.read_u16()?;
        if length < 41 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let capabilities = self.reader.read_u16()?;
        let width = self.reader.read_u32()?;
        let height = self.reader.read_u32()?;
        let x_offset = self.reader.read_u32()?;
        let y_offset = self.reader.read_u32()?;
        let tile_width = self.reader.read_u32()?;
        let tile_height = self.reader.read_u32()?;
        let tile_x_offset = self.reader.read_u32()?;
        let tile_y_offset = self.reader.read_u32()?;
        let component_count = self.reader.read_u16()?;
        if length as usize != 38 + 3 * component_count as usize {
            return Err(CodecError::InvalidSegmentLength);
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let mut components = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            let depth = self.reader.read_u8()?;
            let dx = self.reader.read_u8()?;
            let dy = self.reader.read_u8()?;
            components.push(ComponentSiz {
                precision: (depth & 0x7F) + 1,
                signed: depth & 0x80 != 0,
                dx,
                dy,
            });
        }
        Ok(SizSegment {
            capabilities,
            width,
            height,
            x_offset,
            y_offset,
            tile_width,
            tile_height,
            tile_x_offset,
            tile_y_offset,
            components,
        })
    }

    fn read_cod(&mut self) -> Result<CodSegment, CodecError> {
        let length = self.reader.read_u16()?;
        if length < 12 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let coding_style = self.reader.read_u8()?;
        let progression_order = ProgressionOrder::try_from(self.reader.read_u8()?)
            .map_err(|_| CodecError::InvalidSegmentLength)?;
        let layer_count = self.reader.read_u16()?;
        let multi_component_transform = self.reader.read_u8()?;
        let decomposition_levels = self.reader.read_u8()?;
        if decomposition_levels > 32 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let code_block_width_exp = self.reader.read_u8()?;
        let code_block_height_exp = self.reader.read_u8()?;
        // T.800 caps code-blocks at 2^10 per side.
        if code_block_width_exp > 8 || code_block_height_exp > 8 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let code_block_style = self.reader.read_u8()?;
        let transform = TransformKind::try_from(self.reader.read_u8()?)
            .map_err(|_| CodecError::UnsupportedTransform)?;

        let mut precinct_sizes = Vec::new();
        if coding_style & 0x01 != 0 {
            for _ in 0..=decomposition_levels {
                precinct_sizes.push(self.reader.read_u8()?);
            }
        }
        let consumed = 12 + precinct_sizes.len();
        if (length as usize) < consumed {
            return Err(CodecError::InvalidSegmentLength);
        }
        self.reader.advance(length as usize - consumed)?;

        Ok(CodSegment {
            coding_style,
            progression_order,
            layer_count,
            multi_component_transform,
            decomposition_levels,
            code_block_width_exp,
            code_block_height_exp,
            code_block_style,
            transform,
            precinct_sizes,
        })
    }

    fn read_qcd(&mut self) -> Result<QcdSegment, CodecError> {
        let length = self.reader.read_u16()?;
        if length < 3 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let sqcd = self.reader.read_u8()?;
        let guard_bits = sqcd >> 5;
        if sqcd & 0x1F != 0 {
            return Err(CodecError::UnsupportedQuantization);
        }
        let mut exponents = Vec::with_capacity(length as usize - 3);
        for _ in 0..length - 3 {
            exponents.push(self.reader.read_u8()? >> 3);
        }
        Ok(QcdSegment {
            guard_bits,
            exponents,
        })
    }

    /// Parses the SOT payload; the marker word itself was consumed by
    /// [`Self::read_main_header`].
    pub fn read_sot(&mut self) -> Result<SotSegment, CodecError> {
        let length = self.reader.read_u16()?;
        if length != 10 {
            return Err(CodecError::InvalidSegmentLength);
        }
        Ok(SotSegment {
            tile_index: self.reader.read_u16()?,
            tile_part_length: self.reader.read_u32()?,
            tile_part_index: self.reader.read_u8()?,
            tile_part_count: self.reader.read_u8()?,
        })
    }

    /// Consumes an expected marker such as SOD or EOC.
    pub fn expect_marker(&mut self, expected: J2kMarkerCode) -> Result<(), CodecError> {
        if self.read_marker()? != expected {
            return Err(CodecError::InvalidMarker);
        }
        Ok(())
    }

    /// Reads the marker that separates tile-parts (SOT or EOC).
    pub fn read_tile_marker(&mut self) -> Result<J2kMarkerCode, CodecError> {
        self.read_marker()
    }

    /// Skips over bytes consumed out-of-band (tile bodies).
    pub fn advance(&mut self, count: usize) -> Result<(), CodecError> {
        self.reader.advance(count)
    }
}

#[derive(Default)]
pub struct CodestreamWriter {
    writer: ByteWriter,
}

impl CodestreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    fn write_marker(&mut self, marker: J2kMarkerCode) {
        self.writer.write_u8(JPEG_MARKER_START_BYTE);
        self.writer.write_u8(marker.into());
    }

    pub fn write_soc(&mut self) {
        self.write_marker(J2kMarkerCode::StartOfCodestream);
    }

    pub fn write_eoc(&mut self) {
        self.write_marker(J2kMarkerCode::EndOfCodestream);
    }

    pub fn write_sod(&mut self) {
        self.write_marker(J2kMarkerCode::StartOfData);
    }

    pub fn write_siz(&mut self, siz: &SizSegment) {
        self.write_marker(J2kMarkerCode::ImageAndTileSize);
        self.writer.write_u16(38 + 3 * siz.component_count());
        self.writer.write_u16(siz.capabilities);
        self.writer.write_u32(siz.width);
        self.writer.write_u32(siz.height);
        self.writer.write_u32(siz.x_offset);
        self.writer.write_u32(siz.y_offset);
        self.writer.write_u32(siz.tile_width);
        self.writer.write_u32(siz.tile_height);
        self.writer.write_u32(siz.tile_x_offset);
        self.writer.write_u32(siz.tile_y_offset);
        self.writer.write_u16(siz.component_count());
        for component in &siz.components {
            let mut depth = component.precision - 1;
            if component.signed {
                depth |= 0x80;
            }
            self.writer.write_u8(depth);
            self.writer.write_u8(component.dx);
            self.writer.write_u8(component.dy);
        }
    }

    pub fn write_cod(&mut self, cod: &CodSegment) {
        self.write_marker(J2kMarkerCode::CodingStyleDefault);
        self.writer.write_u16(12 + cod.precinct_sizes.len() as u16);
        self.writer.write_u8(cod.coding_style);
        self.writer.write_u8(cod.progression_order.into());
        self.writer.write_u16(cod.layer_count);
        self.writer.write_u8(cod.multi_component_transform);
        self.writer.write_u8(cod.decomposition_levels);
        self.writer.write_u8(cod.code_block_width_exp);
        self.writer.write_u8(cod.code_block_height_exp);
        self.writer.write_u8(cod.code_block_style);
        self.writer.write_u8(cod.transform.into());
        for &size in &cod.precinct_sizes {
            self.writer.write_u8(size);
        }
    }

    pub fn write_qcd(&mut self, qcd: &QcdSegment) {
        self.write_marker(J2kMarkerCode::QuantizationDefault);
        self.writer.write_u16(3 + qcd.exponents.len() as u16);
        self.writer.write_u8(qcd.guard_bits << 5);
        for &exponent in &qcd.exponents {
            self.writer.write_u8(exponent << 3);
        }
    }

    pub fn write_sot(&mut self, sot: &SotSegment) {
        self.write_marker(J2kMarkerCode::StartOfTile);
        self.writer.write_u16(10);
        self.writer.write_u16(sot.tile_index);
        self.writer.write_u32(sot.tile_part_length);
        self.writer.write_u8(sot.tile_part_index);
        self.writer.write_u8(sot.tile_part_count);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.writer.write_bytes(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_header_write_then_read() {
        let siz = SizSegment::untiled(256, 256, vec![ComponentSiz::unsigned(12)]);
        let cod = CodSegment::reversible_default(3, false);
        let qcd = QcdSegment::reversible_default(3, 12, 2);

        let mut writer = CodestreamWriter::new();
        writer.write_soc();
        writer.write_siz(&siz);
        writer.write_cod(&cod);
        writer.write_qcd(&qcd);
        writer.write_sod();
        let bytes = writer.into_bytes();

        let mut reader = CodestreamReader::new(&bytes);
        let (header, stop) = reader.read_main_header().unwrap();
        assert_eq!(stop, J2kMarkerCode::StartOfData);
        assert_eq!(header.siz, siz);
        assert_eq!(header.cod, Some(cod));
        assert_eq!(header.qcd, Some(qcd));
    }

    #[test]
    fn tiled_header_with_defaults() {
        // 512x256, three 8-bit components, 128x128 tiles, L=5, MCT on.
        let siz = SizSegment {
            width: 512,
            height: 256,
            tile_width: 128,
            tile_height: 128,
            components: vec![ComponentSiz::unsigned(8); 3],
            ..SizSegment::default()
        };
        let cod = CodSegment::reversible_default(5, true);
        let qcd = QcdSegment::reversible_default(5, 8, 2);
        let sot = SotSegment {
            tile_index: 0,
            tile_part_length: 14,
            tile_part_index: 0,
            tile_part_count: 1,
        };

        let mut writer = CodestreamWriter::new();
        writer.write_soc();
        writer.write_siz(&siz);
        writer.write_cod(&cod);
        writer.write_qcd(&qcd);
        writer.write_sot(&sot);
        let bytes = writer.into_bytes();

        let mut reader = CodestreamReader::new(&bytes);
        let (header, stop) = reader.read_main_header().unwrap();
        assert_eq!(stop, J2kMarkerCode::StartOfTile);
        assert_eq!(header.siz.width, 512);
        assert_eq!(header.siz.height, 256);
        assert_eq!(header.siz.tile_width, 128);
        assert_eq!(header.siz.component_count(), 3);
        assert_eq!(header.siz.tiles_across(), 4);
        assert_eq!(header.siz.tiles_down(), 2);
        let cod = header.cod.unwrap();
        assert_eq!(cod.transform, TransformKind::Reversible53);
        assert_eq!(cod.multi_component_transform, 1);
        assert_eq!(cod.decomposition_levels, 5);
        assert_eq!(header.qcd.unwrap().guard_bits, 2);
        assert_eq!(reader.read_sot().unwrap(), sot);
    }

    #[test]
    fn unknown_segments_are_skipped() {
        let siz = SizSegment::untiled(8, 8, vec![ComponentSiz::unsigned(8)]);
        let mut writer = CodestreamWriter::new();
        writer.write_soc();
        writer.write_siz(&siz);
        // COM segment with a short payload.
        writer.write_bytes(&[0xFF, 0x64, 0x00, 0x06, 0x00, 0x01, 0x68, 0x69]);
        writer.write_sod();
        let bytes = writer.into_bytes();

        let mut reader = CodestreamReader::new(&bytes);
        let (header, stop) = reader.read_main_header().unwrap();
        assert_eq!(stop, J2kMarkerCode::StartOfData);
        assert_eq!(header.siz.width, 8);
    }

    #[test]
    fn missing_soc_is_rejected() {
        let mut reader = CodestreamReader::new(&[0xFF, 0xD8, 0x00, 0x00]);
        assert_eq!(
            reader.read_main_header().unwrap_err(),
            CodecError::InvalidCodestream
        );
    }

    #[test]
    fn expounded_quantization_is_rejected() {
        let siz = SizSegment::untiled(8, 8, vec![ComponentSiz::unsigned(8)]);
        let mut writer = CodestreamWriter::new();
        writer.write_soc();
        writer.write_siz(&siz);
        // QCD with Sqcd = 0x42: guard bits 2, scalar-expounded style.
        writer.write_bytes(&[0xFF, 0x5C, 0x00, 0x05, 0x42, 0x10, 0x00]);
        writer.write_sod();
        let bytes = writer.into_bytes();

        let mut reader = CodestreamReader::new(&bytes);
        assert_eq!(
            reader.read_main_header().unwrap_err(),
            CodecError::UnsupportedQuantization
        );
    }
}
