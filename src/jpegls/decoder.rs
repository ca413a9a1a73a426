//! JPEG-LS interchange-format decoder.
//!
//! Parses SOI, SOF55, an optional LSE preset-parameter override, and SOS,
//! then hands the remaining bytes to the scan decoder.

use log::trace;

use super::scan_decoder::ScanDecoder;
use super::PresetParameters;
use crate::bit_io::ByteReader;
use crate::error::CodecError;
use crate::jpeg_marker_code::{JpegMarkerCode, JPEG_MARKER_START_BYTE};
use crate::FrameInfo;

pub struct JpeglsDecoder<'a> {
    reader: ByteReader<'a>,
    frame: FrameInfo,
    presets: Option<PresetParameters>,
}

impl<'a> JpeglsDecoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(source),
            frame: FrameInfo::default(),
            presets: None,
        }
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.frame
    }

    /// Parses markers through SOS and decodes the scan.
    pub fn decode(mut self) -> Result<(FrameInfo, Vec<u16>), CodecError> {
        self.read_header()?;
        let frame = self.frame;
        let presets = self
            .presets
            .unwrap_or_else(|| PresetParameters::for_bits_per_sample(frame.bits_per_sample));
        let pixels = ScanDecoder::new(frame, presets, self.reader.remaining()).decode()?;
        Ok((frame, pixels))
    }

    fn read_header(&mut self) -> Result<(), CodecError> {
        if self.reader.read_u16()? != 0xFFD8 {
            return Err(CodecError::InvalidMarker);
        }
        loop {
            match self.read_marker()? {
                JpegMarkerCode::StartOfFrameJpegls => self.read_start_of_frame()?,
                JpegMarkerCode::JpeglsPresetParameters => self.read_preset_parameters()?,
                JpegMarkerCode::StartOfScan => {
                    self.read_start_of_scan()?;
                    return Ok(());
                }
                JpegMarkerCode::Comment | JpegMarkerCode::DefineRestartInterval => {
                    self.skip_segment()?
                }
                marker if marker.is_application_data() => self.skip_segment()?,
                JpegMarkerCode::EndOfImage => return Err(CodecError::TruncatedInput),
                _ => return Err(CodecError::InvalidMarker),
            }
        }
    }

    fn read_marker(&mut self) -> Result<JpegMarkerCode, CodecError> {
        if self.reader.read_u8()? != JPEG_MARKER_START_BYTE {
            return Err(CodecError::InvalidMarker);
        }
        let mut code = self.reader.read_u8()?;
        // 0xFF bytes before a marker code are fill.
        while code == JPEG_MARKER_START_BYTE {
            code = self.reader.read_u8()?;
        }
        JpegMarkerCode::try_from(code).map_err(|_| CodecError::InvalidMarker)
    }

    fn skip_segment(&mut self) -> Result<(), CodecError> {
        let length = self.reader.read_u16()?;
        if length < 2 {
            return Err(CodecError::InvalidSegmentLength);
        }
        self.reader.advance(length as usize - 2)
    }

    fn read_start_of_frame(&mut self) -> Result<(), CodecError> {
        let length = self.reader.read_u16()?;
        let precision = self.reader.read_u8()?;
        let height = self.reader.read_u16()?;
        let width = self.reader.read_u16()?;
        let component_count = self.reader.read_u8()?;
        if length as usize != 8 + 3 * component_count as usize {
            return Err(CodecError::InvalidSegmentLength);
        }
        if component_count != 1 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        if !(2..=16).contains(&precision) {
            return Err(CodecError::UnsupportedPrecision);
        }
        self.reader.advance(3)?; // id, sampling, Tq of the only component
        self.frame = FrameInfo::grayscale(width as u32, height as u32, precision);
        trace!("SOF55: {}x{} {} bpp", width, height, precision);
        Ok(())
    }

    fn read_preset_parameters(&mut self) -> Result<(), CodecError> {
        let length = self.reader.read_u16()?;
        if length < 3 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let parameter_type = self.reader.read_u8()?;
        if parameter_type != 1 {
            // Mapping tables and extensions are not used by this profile.
            return self.reader.advance(length as usize - 3);
        }
        if length != 13 {
            return Err(CodecError::InvalidSegmentLength);
        }
        let maximum_sample_value = self.reader.read_u16()? as i32;
        let threshold1 = self.reader.read_u16()? as i32;
        let threshold2 = self.reader.read_u16()? as i32;
        let threshold3 = self.reader.read_u16()? as i32;
        let reset_threshold = self.reader.read_u16()? as i32;
        let defaults = PresetParameters::for_maximum_sample_value(maximum_sample_value.max(1));
        self.presets = Some(PresetParameters {
            maximum_sample_value: maximum_sample_value.max(1),
            threshold1: if threshold1 == 0 { defaults.threshold1 } else { threshold1 },
            threshold2: if threshold2 == 0 { defaults.threshold2 } else { threshold2 },
            threshold3: if threshold3 == 0 { defaults.threshold3 } else { threshold3 },
            reset_threshold: if reset_threshold == 0 {
                defaults.reset_threshold
            } else {
                reset_threshold
            },
        });
        Ok(())
    }

    fn read_start_of_scan(&mut self) -> Result<(), CodecError> {
        let length = self.reader.read_u16()?;
        let component_count = self.reader.read_u8()?;
        if length as usize != 6 + 2 * component_count as usize {
            return Err(CodecError::InvalidSegmentLength);
        }
        if component_count != 1 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        self.reader.advance(2)?; // component selector + mapping table
        let near = self.reader.read_u8()?;
        if near != 0 {
            return Err(CodecError::UnsupportedNearLossless);
        }
        let interleave = self.reader.read_u8()?;
        if interleave != 0 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        let point_transform = self.reader.read_u8()?;
        if point_transform != 0 {
            return Err(CodecError::UnsupportedPrecision);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::encoder::JpeglsEncoder;
    use super::*;

    #[test]
    fn encode_decode_gradient() {
        // Pixel (x, y) = 8 * (x + y).
        let frame = FrameInfo::grayscale(8, 8, 8);
        let pixels: Vec<u16> = (0..64).map(|i| 8 * ((i % 8) + (i / 8)) as u16).collect();
        let encoded = JpeglsEncoder.encode(frame, &pixels).unwrap();
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded[2..4], &[0xFF, 0xF7]);
        assert_eq!(&encoded[encoded.len() - 2..], &[0xFF, 0xD9]);

        let (info, decoded) = JpeglsDecoder::new(&encoded).decode().unwrap();
        assert_eq!(info, frame);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn twelve_bit_roundtrip() {
        let frame = FrameInfo::grayscale(16, 12, 12);
        let pixels: Vec<u16> = (0..192).map(|i| (i * 21) as u16).collect();
        let encoded = JpeglsEncoder.encode(frame, &pixels).unwrap();
        let (info, decoded) = JpeglsDecoder::new(&encoded).decode().unwrap();
        assert_eq!(info.bits_per_sample, 12);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn missing_soi_is_rejected() {
        assert_eq!(
            JpeglsDecoder::new(&[0x00, 0xD8, 0xFF, 0xF7]).decode().unwrap_err(),
            CodecError::InvalidMarker
        );
    }

    #[test]
    fn near_lossless_scan_is_rejected() {
        let frame = FrameInfo::grayscale(4, 4, 8);
        let pixels = vec![0u16; 16];
        let mut encoded = JpeglsEncoder.encode(frame, &pixels).unwrap();
        // Patch the NEAR byte inside SOS (SOI + SOF55 segment + SOS header).
        let near_offset = 2 + 2 + 11 + 2 + 2 + 1 + 2;
        assert_eq!(encoded[near_offset], 0);
        encoded[near_offset] = 2;
        assert_eq!(
            JpeglsDecoder::new(&encoded).decode().unwrap_err(),
            CodecError::UnsupportedNearLossless
        );
    }
}
