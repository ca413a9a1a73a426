//! JPEG Lossless (Process 14) decoder for single-component scans.

use log::trace;

use super::huffman::{extend_difference, HuffmanTable, MAX_CATEGORY};
use crate::bit_io::{BitReader, ByteReader};
use crate::error::CodecError;
use crate::jpeg_marker_code::{JpegMarkerCode, JPEG_MARKER_START_BYTE};
use crate::FrameInfo;

/// Prediction functions selectable in the scan header (T.81 H.1.2.1).
/// `Ra` is the sample to the left, `Rb` above, `Rc` above-left.
pub fn predict(selection: u8, ra: i32, rb: i32, rc: i32) -> i32 {
    match selection {
        1 => ra,
        2 => rb,
        3 => rc,
        4 => ra + rb - rc,
        5 => ra + ((rb - rc) >> 1),
        6 => rb + ((ra - rc) >> 1),
        7 => (ra + rb) >> 1,
        _ => 0,
    }
}

pub struct JpegLosslessDecoder<'a> {
    reader: ByteReader<'a>,
    frame: FrameInfo,
    dc_tables: [Option<HuffmanTable>; 4],
    restart_interval: u16,
    predictor: u8,
    point_transform: u8,
    scan_table: usize,
}

impl<'a> JpegLosslessDecoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(source),
            frame: FrameInfo::default(),
            dc_tables: [const { None }; 4],
            restart_interval: 0,
            predictor: 1,
            point_transform: 0,
            scan_table: 0,
        }
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.frame
    }

    pub fn decode(mut self) -> Result<(FrameInfo, Vec<u16>), CodecError> {
        self.read_header()?;
        let frame = self.frame;
        let table = self.dc_tables[self.scan_table]
            .take()
            .ok_or(CodecError::InvalidHuffmanCode)?;
        let pixels = self.decode_scan(&table)?;
        Ok((frame, pixels))
    }

    fn read_header(&mut self) -> Result<(), CodecError> {
        if self.reader.read_u16()? != 0xFFD8 {
            return Err(CodecError::InvalidMarker);
        }
        loop {
            match self.read_marker()? {
                JpegMarkerCode::StartOfFrameLossless => self.read_start_of_frame()?,
                JpegMarkerCode::DefineHuffmanTable => self.read_huffman_tables()?,
                JpegMarkerCode::DefineRestartInterval => {
                    let length = self.reader.read_u16()?;
                    if length != 4 {
                        return Err(CodecError::InvalidSegmentLength);
                    }
                    self.restart_interval = self.reader.read_u16()?;
                }
                JpegMarkerCode::StartOfScan => return self.read_start_of_scan(),
                JpegMarkerCode::Comment => self.skip_segment()?,
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
        self.reader.advance(3)?;
        self.frame = FrameInfo::grayscale(width as u32, height as u32, precision);
        trace!("SOF3: {}x{} {} bpp", width, height, precision);
        Ok(())
    }

    /// A DHT segment may define several tables. Class 0 (DC) tables carry
    /// the difference categories; class 1 tables belong to DCT scans and
    /// are skipped.
    fn read_huffman_tables(&mut self) -> Result<(), CodecError> {
        let length = self.reader.read_u16()?;
        let mut remaining = (length as usize)
            .checked_sub(2)
            .ok_or(CodecError::InvalidSegmentLength)?;
        while remaining > 0 {
            if remaining < 17 {
                return Err(CodecError::InvalidSegmentLength);
            }
            let class_and_id = self.reader.read_u8()?;
            let mut lengths = [0u8; 16];
            for entry in &mut lengths {
                *entry = self.reader.read_u8()?;
            }
            let value_count: usize = lengths.iter().map(|&count| count as usize).sum();
            if remaining < 17 + value_count {
                return Err(CodecError::InvalidSegmentLength);
            }
            let values = self
                .reader
                .remaining()
                .get(..value_count)
                .ok_or(CodecError::TruncatedInput)?
                .to_vec();
            self.reader.advance(value_count)?;
            remaining -= 17 + value_count;

            let class = class_and_id >> 4;
            let id = (class_and_id & 0x0F) as usize;
            if class == 0 && id < 4 {
                self.dc_tables[id] = Some(HuffmanTable::build_from_dht(&lengths, &values)?);
            }
        }
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
        self.reader.read_u8()?; // component selector
        self.scan_table = (self.reader.read_u8()? >> 4) as usize;
        let predictor = self.reader.read_u8()?; // Ss doubles as the predictor id
        if !(1..=7).contains(&predictor) {
            return Err(CodecError::InvalidMarker);
        }
        self.predictor = predictor;
        self.reader.read_u8()?; // Se, unused in lossless
        self.point_transform = self.reader.read_u8()? & 0x0F;
        Ok(())
    }

    fn decode_scan(&mut self, table: &HuffmanTable) -> Result<Vec<u16>, CodecError> {
        let width = self.frame.width as usize;
        let height = self.frame.height as usize;
        let precision = self.frame.bits_per_sample;
        let max_value = self.frame.max_sample_value();
        let default_prediction = 1i32 << (precision - 1);

        // With a restart interval the entropy stream is a sequence of
        // independent segments separated by byte-aligned RSTn markers.
        let segments = split_restart_segments(self.reader.remaining(), self.restart_interval);
        let mut pixels = vec![0u16; width * height];
        let mut samples_done = 0usize;

        for segment in segments {
            let mut reader = BitReader::marker_aware(segment);
            let limit = if self.restart_interval > 0 {
                (samples_done + self.restart_interval as usize).min(width * height)
            } else {
                width * height
            };
            let mut restarted = true;
            while samples_done < limit {
                let x = samples_done % width;
                let y = samples_done / width;

                let ssss = table.decode(&mut reader)?;
                let bits = if ssss == 0 || ssss == MAX_CATEGORY {
                    0
                } else {
                    reader.read_bits(ssss)? as u16
                };
                let difference = extend_difference(bits, ssss);

                let prediction = if restarted || (x == 0 && y == 0) {
                    default_prediction
                } else if y == 0 {
                    pixels[samples_done - 1] as i32
                } else if x == 0 {
                    pixels[samples_done - width] as i32
                } else {
                    let ra = pixels[samples_done - 1] as i32;
                    let rb = pixels[samples_done - width] as i32;
                    let rc = pixels[samples_done - width - 1] as i32;
                    predict(self.predictor, ra, rb, rc)
                };

                let value = (prediction + difference) & 0xFFFF;
                pixels[samples_done] = value.clamp(0, max_value) as u16;
                samples_done += 1;
                restarted = false;
            }
            if samples_done >= width * height {
                break;
            }
        }
        if samples_done < width * height {
            return Err(CodecError::TruncatedInput);
        }
        Ok(pixels)
    }
}

/// Splits entropy-coded data at byte-aligned RSTn markers. Inside the
/// entropy stream a data 0xFF is always followed by 0x00, so `FF D0..D7`
/// is unambiguous.
fn split_restart_segments(data: &[u8], restart_interval: u16) -> Vec<&[u8]> {
    if restart_interval == 0 {
        return vec![data];
    }
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;
    while index + 1 < data.len() {
        if data[index] == 0xFF && (0xD0..=0xD7).contains(&data[index + 1]) {
            segments.push(&data[start..index]);
            index += 2;
            start = index;
        } else {
            index += 1;
        }
    }
    segments.push(&data[start..]);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictor_functions() {
        assert_eq!(predict(1, 100, 200, 50), 100);
        assert_eq!(predict(2, 100, 200, 50), 200);
        assert_eq!(predict(3, 100, 200, 50), 50);
        assert_eq!(predict(4, 100, 200, 50), 250);
        assert_eq!(predict(5, 100, 200, 50), 175);
        assert_eq!(predict(6, 100, 200, 50), 225);
        assert_eq!(predict(7, 100, 200, 50), 150);
    }

    #[test]
    fn restart_segment_split() {
        let data = [0x12, 0xFF, 0xD0, 0x34, 0x56, 0xFF, 0xD1, 0x78];
        let segments = split_restart_segments(&data, 4);
        assert_eq!(segments, vec![&[0x12][..], &[0x34, 0x56][..], &[0x78][..]]);
    }

    #[test]
    fn stuffed_ff_is_not_a_restart() {
        let data = [0xFF, 0x00, 0xAB];
        let segments = split_restart_segments(&data, 4);
        assert_eq!(segments, vec![&data[..]]);
    }

    #[test]
    fn missing_soi_is_rejected() {
        let result = JpegLosslessDecoder::new(&[0x89, 0x50, 0x4E, 0x47]).decode();
        assert_eq!(result.unwrap_err(), CodecError::InvalidMarker);
    }
}
