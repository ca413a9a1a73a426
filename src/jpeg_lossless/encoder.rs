//! Minimal JPEG Lossless (Process 14, SV1) encoder.
//!
//! Emits a single-component frame with predictor 1 and one fixed Huffman
//! table covering every difference category, which keeps the stream
//! decodable by any Process 14 decoder.

use super::huffman::{category, difference_bits, HuffmanTable, MAX_CATEGORY};
use crate::bit_io::{BitPadding, BitWriter, ByteWriter};
use crate::error::CodecError;
use crate::jpeg_marker_code::{JpegMarkerCode, JPEG_MARKER_START_BYTE};
use crate::FrameInfo;

/// BITS array of the fixed category table: three 2-bit codes, then one
/// code per length up to 16 bits, covering the 17 categories.
const TABLE_LENGTHS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
const TABLE_VALUES: [u8; 17] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegLosslessEncoder;

impl JpegLosslessEncoder {
    pub fn encode(&self, frame: FrameInfo, pixels: &[u16]) -> Result<Vec<u8>, CodecError> {
        if frame.component_count != 1 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        if !(2..=16).contains(&frame.bits_per_sample) {
            return Err(CodecError::UnsupportedPrecision);
        }
        let width = frame.width as usize;
        let height = frame.height as usize;
        if pixels.len() != width * height {
            return Err(CodecError::DimensionMismatch);
        }

        let table = HuffmanTable::build_from_dht(&TABLE_LENGTHS, &TABLE_VALUES)?;
        let scan = self.encode_scan(frame, pixels, &table)?;

        let mut writer = ByteWriter::new();
        write_marker(&mut writer, JpegMarkerCode::StartOfImage);

        write_marker(&mut writer, JpegMarkerCode::StartOfFrameLossless);
        writer.write_u16(11);
        writer.write_u8(frame.bits_per_sample);
        writer.write_u16(frame.height as u16);
        writer.write_u16(frame.width as u16);
        writer.write_u8(1);
        writer.write_u8(1); // component id
        writer.write_u8(0x11);
        writer.write_u8(0);

        write_marker(&mut writer, JpegMarkerCode::DefineHuffmanTable);
        writer.write_u16(2 + 1 + 16 + TABLE_VALUES.len() as u16);
        writer.write_u8(0x00); // class 0, id 0
        for count in TABLE_LENGTHS {
            writer.write_u8(count);
        }
        for value in TABLE_VALUES {
            writer.write_u8(value);
        }

        write_marker(&mut writer, JpegMarkerCode::StartOfScan);
        writer.write_u16(8);
        writer.write_u8(1);
        writer.write_u8(1); // component selector
        writer.write_u8(0x00); // DC table 0
        writer.write_u8(1); // Ss: predictor 1 (Ra)
        writer.write_u8(0); // Se
        writer.write_u8(0); // Ah/Al: no point transform

        writer.write_bytes(&scan);
        write_marker(&mut writer, JpegMarkerCode::EndOfImage);
        Ok(writer.into_bytes())
    }

    fn encode_scan(
        &self,
        frame: FrameInfo,
        pixels: &[u16],
        table: &HuffmanTable,
    ) -> Result<Vec<u8>, CodecError> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let default_prediction = 1i32 << (frame.bits_per_sample - 1);
        let mut writer = BitWriter::with_stuffing();

        for index in 0..width * height {
            let x = index % width;
            let y = index / width;
            let prediction = if index == 0 {
                default_prediction
            } else if x == 0 {
                pixels[index - width] as i32
            } else {
                pixels[index - 1] as i32
            };

            // Reduce modulo 2^16 so every difference fits a category.
            let difference = (pixels[index] as i32 - prediction) as i16 as i32;
            let ssss = category(difference);
            table.encode(&mut writer, ssss)?;
            if ssss > 0 && ssss < MAX_CATEGORY {
                writer.write_bits(difference_bits(difference, ssss) as u32, ssss);
            }
        }
        // Pad with ones so the tail cannot emulate a zero-length code.
        Ok(writer.finish(BitPadding::Ones))
    }
}

fn write_marker(writer: &mut ByteWriter, marker: JpegMarkerCode) {
    writer.write_u8(JPEG_MARKER_START_BYTE);
    writer.write_u8(marker.into());
}
