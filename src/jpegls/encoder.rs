//! JPEG-LS interchange-format encoder: marker framing around the scan.

use super::scan_encoder::ScanEncoder;
use super::PresetParameters;
use crate::bit_io::ByteWriter;
use crate::error::CodecError;
use crate::jpeg_marker_code::{JpegMarkerCode, JPEG_MARKER_START_BYTE};
use crate::FrameInfo;

#[derive(Debug, Clone, Copy, Default)]
pub struct JpeglsEncoder;

impl JpeglsEncoder {
    /// Produces a complete SOI..EOI codestream for one grayscale frame.
    pub fn encode(&self, frame: FrameInfo, pixels: &[u16]) -> Result<Vec<u8>, CodecError> {
        if frame.component_count != 1 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        if !(2..=16).contains(&frame.bits_per_sample) {
            return Err(CodecError::UnsupportedPrecision);
        }

        let presets = PresetParameters::for_bits_per_sample(frame.bits_per_sample);
        let scan = ScanEncoder::new(frame, presets).encode(pixels)?;

        let mut writer = ByteWriter::new();
        write_marker(&mut writer, JpegMarkerCode::StartOfImage);

        write_marker(&mut writer, JpegMarkerCode::StartOfFrameJpegls);
        writer.write_u16(11);
        writer.write_u8(frame.bits_per_sample);
        writer.write_u16(frame.height as u16);
        writer.write_u16(frame.width as u16);
        writer.write_u8(1);
        writer.write_u8(1); // component id
        writer.write_u8(0x11); // 1x1 sampling
        writer.write_u8(0); // Tq, unused in JPEG-LS

        write_marker(&mut writer, JpegMarkerCode::StartOfScan);
        writer.write_u16(8);
        writer.write_u8(1);
        writer.write_u8(1); // component selector
        writer.write_u8(0); // mapping table selector
        writer.write_u8(0); // NEAR: lossless
        writer.write_u8(0); // interleave mode: none
        writer.write_u8(0); // point transform

        writer.write_bytes(&scan);
        write_marker(&mut writer, JpegMarkerCode::EndOfImage);
        Ok(writer.into_bytes())
    }
}

fn write_marker(writer: &mut ByteWriter, marker: JpegMarkerCode) {
    writer.write_u8(JPEG_MARKER_START_BYTE);
    writer.write_u8(marker.into());
}
