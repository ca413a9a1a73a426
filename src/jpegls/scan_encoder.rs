//! JPEG-LS scan encoding: regular-mode LOCO-I over the stuffed bit writer.

use super::context::RegularModeContext;
use super::{
    context_id, median_predictor, modulo_range, quantize_gradient, PresetParameters,
    CONTEXT_COUNT,
};
use crate::bit_io::{BitPadding, BitWriter};
use crate::error::CodecError;
use crate::FrameInfo;

pub struct ScanEncoder {
    presets: PresetParameters,
    contexts: Vec<RegularModeContext>,
    writer: BitWriter,
    width: usize,
    height: usize,
}

impl ScanEncoder {
    pub fn new(frame: FrameInfo, presets: PresetParameters) -> Self {
        Self {
            presets,
            contexts: vec![RegularModeContext::new(presets.range()); CONTEXT_COUNT],
            writer: BitWriter::with_stuffing(),
            width: frame.width as usize,
            height: frame.height as usize,
        }
    }

    /// Encodes the full scan and returns the entropy-coded segment.
    pub fn encode(mut self, pixels: &[u16]) -> Result<Vec<u8>, CodecError> {
        if pixels.len() != self.width * self.height {
            return Err(CodecError::DimensionMismatch);
        }

        let stride = self.width + 2;
        let mut previous_line = vec![0i32; stride];
        let mut current_line = vec![0i32; stride];

        for y in 0..self.height {
            previous_line[self.width + 1] = previous_line[self.width];
            current_line[0] = previous_line[1];

            for x in 0..self.width {
                let index = x + 1;
                let ra = current_line[index - 1];
                let rb = previous_line[index];
                let rc = previous_line[index - 1];
                let rd = previous_line[index + 1];

                let sample = pixels[y * self.width + x] as i32;
                self.encode_sample(sample, ra, rb, rc, rd)?;
                // Lossless: the reconstruction equals the source sample.
                current_line[index] = sample;
            }
            std::mem::swap(&mut previous_line, &mut current_line);
        }
        Ok(self.writer.finish(BitPadding::Zeros))
    }

    fn encode_sample(
        &mut self,
        sample: i32,
        ra: i32,
        rb: i32,
        rc: i32,
        rd: i32,
    ) -> Result<(), CodecError> {
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

        let mut error = sample - corrected;
        if sign < 0 {
            error = -error;
        }
        let error = modulo_range(error, self.presets.range());

        let k = self.contexts[context_index].golomb_parameter()?;
        let mapped = if error >= 0 { 2 * error } else { -2 * error - 1 };
        self.write_mapped_value(k, mapped);
        self.contexts[context_index].update(error, self.presets.reset_threshold);
        Ok(())
    }

    /// Limited-length Golomb-Rice code (A.5.3): a unary prefix and `k`
    /// remainder bits, or the escape form of `qbpp` raw bits once the
    /// prefix would reach `LIMIT - qbpp - 1`.
    fn write_mapped_value(&mut self, k: i32, mapped: i32) {
        let qbpp = self.presets.qbpp();
        let unary_cap = self.presets.limit() - qbpp - 1;
        let prefix = mapped >> k;
        if prefix < unary_cap {
            for _ in 0..prefix {
                self.writer.write_bit(0);
            }
            self.writer.write_bit(1);
            if k > 0 {
                self.writer.write_bits((mapped & ((1 << k) - 1)) as u32, k as u8);
            }
        } else {
            for _ in 0..unary_cap {
                self.writer.write_bit(0);
            }
            self.writer.write_bit(1);
            self.writer.write_bits((mapped - 1) as u32, qbpp as u8);
        }
    }
}
