//! JPEG-LS scan decoding, the mirror of [`super::scan_encoder`].
//!
//! Hitting a marker or the end of the stream mid-scan terminates decoding
//! gracefully: the samples decoded so far are kept and the remainder of
//! the frame stays at zero.

use log::trace;

use super::context::RegularModeContext;
use super::{
    context_id, median_predictor, quantize_gradient, PresetParameters, CONTEXT_COUNT,
};
use crate::bit_io::BitReader;
use crate::error::CodecError;
use crate::FrameInfo;

pub struct ScanDecoder<'a> {
    presets: PresetParameters,
    contexts: Vec<RegularModeContext>,
    reader: BitReader<'a>,
    width: usize,
    height: usize,
}

impl<'a> ScanDecoder<'a> {
    pub fn new(frame: FrameInfo, presets: PresetParameters, source: &'a [u8]) -> Self {
        Self {
            presets,
            contexts: vec![RegularModeContext::new(presets.range()); CONTEXT_COUNT],
            reader: BitReader::marker_aware(source),
            width: frame.width as usize,
            height: frame.height as usize,
        }
    }

    /// Decodes the scan into a full frame of samples.
    pub fn decode(mut self) -> Result<Vec<u16>, CodecError> {
        let mut pixels = vec![0u16; self.width * self.height];
        let stride = self.width + 2;
        let mut previous_line = vec![0i32; stride];
        let mut current_line = vec![0i32; stride];

        'scan: for y in 0..self.height {
            previous_line[self.width + 1] = previous_line[self.width];
            current_line[0] = previous_line[1];

            for x in 0..self.width {
                let index = x + 1;
                let ra = current_line[index - 1];
                let rb = previous_line[index];
                let rc = previous_line[index - 1];
                let rd = previous_line[index + 1];

                match self.decode_sample(ra, rb, rc, rd) {
                    Ok(sample) => {
                        current_line[index] = sample;
                        pixels[y * self.width + x] = sample as u16;
                    }
                    Err(CodecError::MarkerEncountered) | Err(CodecError::TruncatedInput) => {
                        trace!("scan stopped at ({x}, {y})");
                        break 'scan;
                    }
                    Err(error) => return Err(error),
                }
            }
            std::mem::swap(&mut previous_line, &mut current_line);
        }
        Ok(pixels)
    }

    fn decode_sample(&mut self, ra: i32, rb: i32, rc: i32, rd: i32) -> Result<i32, CodecError> {
        let q1 = quantize_gradient(rd - rb, &self.presets);
        let q2 = quantize_gradient(rb - rc, &self.presets);
        let q3 = quantize_gradient(rc - ra, &self.presets);
        let packed = context_id(q1, q2, q3);
        let (sign, context_index) = if packed < 0 {
            (-1, (-packed) as usize)
        } else {
            (1, packed as usize)
        };

        let predicted = median_predictor(ra, rb, rc);
        let corrected = predicted + sign * self.contexts[context_index].bias_correction();

        let k = self.contexts[context_index].golomb_parameter()?;
        let mapped = self.read_mapped_value(k)?;
        let error = if mapped & 1 == 0 {
            mapped / 2
        } else {
            -(mapped + 1) / 2
        };
        self.contexts[context_index].update(error, self.presets.reset_threshold);

        let range = self.presets.range();
        let sample = (corrected + sign * error).rem_euclid(range);
        Ok(sample.clamp(0, self.presets.maximum_sample_value))
    }

    fn read_mapped_value(&mut self, k: i32) -> Result<i32, CodecError> {
        let qbpp = self.presets.qbpp();
        let unary_cap = self.presets.limit() - qbpp - 1;

        let mut prefix = 0i32;
        while self.reader.read_bit()? == 0 {
            prefix += 1;
            if prefix > unary_cap {
                return Err(CodecError::GolombOverflow);
            }
        }

        if prefix < unary_cap {
            let remainder = if k > 0 {
                self.reader.read_bits(k as u8)? as i32
            } else {
                0
            };
            Ok((prefix << k) | remainder)
        } else {
            Ok(self.reader.read_bits(qbpp as u8)? as i32 + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::scan_encoder::ScanEncoder;
    use super::*;

    fn roundtrip(pixels: &[u16], width: u32, height: u32, bits_per_sample: u8) {
        let frame = FrameInfo::grayscale(width, height, bits_per_sample);
        let presets = PresetParameters::for_bits_per_sample(bits_per_sample);
        let encoded = ScanEncoder::new(frame, presets).encode(pixels).unwrap();
        let decoded = ScanDecoder::new(frame, presets, &encoded).decode().unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn gradient_roundtrip() {
        let pixels: Vec<u16> = (0..64).map(|i| 8 * ((i % 8) + (i / 8)) as u16).collect();
        roundtrip(&pixels, 8, 8, 8);
    }

    #[test]
    fn solid_roundtrip() {
        roundtrip(&vec![127u16; 16 * 16], 16, 16, 8);
    }

    #[test]
    fn checkerboard_roundtrip() {
        let pixels: Vec<u16> = (0..31 * 17)
            .map(|i| {
                let (x, y) = (i % 31, i / 31);
                if (x + y) % 2 == 0 { 255 } else { 0 }
            })
            .collect();
        roundtrip(&pixels, 31, 17, 8);
    }

    #[test]
    fn sixteen_bit_roundtrip() {
        let pixels: Vec<u16> = (0..32u32 * 32)
            .map(|i| (i.wrapping_mul(40503) % 65536) as u16)
            .collect();
        roundtrip(&pixels, 32, 32, 16);
    }

    #[test]
    fn worst_case_first_sample() {
        // A half-range first-sample error exercises the limited-length
        // escape (mapped value 255 against the initial k = 2).
        let mut pixels = vec![0u16; 64];
        pixels[0] = 128;
        roundtrip(&pixels, 8, 8, 8);
    }

    #[test]
    fn truncated_scan_keeps_decoded_prefix() {
        let frame = FrameInfo::grayscale(8, 8, 8);
        let presets = PresetParameters::for_bits_per_sample(8);
        let pixels = vec![200u16; 64];
        let encoded = ScanEncoder::new(frame, presets).encode(&pixels).unwrap();

        let truncated = &encoded[..encoded.len() / 2];
        let decoded = ScanDecoder::new(frame, presets, truncated).decode().unwrap();
        // Whatever was decoded must match the source; the tail stays zero.
        assert_eq!(decoded.len(), 64);
        assert!(decoded.iter().all(|&value| value == 200 || value == 0));
        assert_eq!(decoded[0], 200);
    }
}
