//! EBCOT Tier-1 bit-plane coding of code-blocks.
//!
//! Each magnitude bit-plane is coded in three passes (significance
//! propagation, magnitude refinement, cleanup) over the MQ coder. The
//! context model is deliberately coarser than T.800: raster scan order
//! instead of stripe-causal, a zero-coding context equal to the clamped
//! count of horizontally and vertically significant neighbours, a single
//! sign context, and a single refinement context. Encoder and decoder
//! share the model, so a block always round-trips through this crate.

use super::mq_coder::{MqDecoder, MqEncoder, UNIFORM_STATE};

pub const CONTEXT_COUNT: usize = 19;
const SIGN_CONTEXT: usize = 9;
const REFINEMENT_CONTEXT: usize = 14;
const RUN_CONTEXT: usize = 17;
const UNIFORM_CONTEXT: usize = 18;

/// A coded code-block: the MQ codeword plus what the decoder needs to
/// replay it.
#[derive(Debug, Clone, Default)]
pub struct EncodedBlock {
    pub data: Vec<u8>,
    pub bit_planes: u8,
    pub coding_passes: u8,
}

/// Per-coefficient scratch shared by both directions: a significance map
/// with a one-pixel zero border, a sign map, and the per-pass visited
/// flags. Neighbour lookups index the border instead of crossing into
/// adjacent blocks.
struct BlockState {
    width: usize,
    height: usize,
    significant: Vec<u8>,
    negative: Vec<u8>,
    visited: Vec<bool>,
}

impl BlockState {
    fn new(width: usize, height: usize) -> Self {
        let bordered = (width + 2) * (height + 2);
        Self {
            width,
            height,
            significant: vec![0; bordered],
            negative: vec![0; bordered],
            visited: vec![false; width * height],
        }
    }

    fn bordered_index(&self, x: usize, y: usize) -> usize {
        (y + 1) * (self.width + 2) + (x + 1)
    }

    fn is_significant(&self, x: usize, y: usize) -> bool {
        self.significant[self.bordered_index(x, y)] != 0
    }

    fn mark_significant(&mut self, x: usize, y: usize, negative: bool) {
        let index = self.bordered_index(x, y);
        self.significant[index] = 1;
        self.negative[index] = negative as u8;
    }

    /// Count of significant horizontal + vertical neighbours, clamped to
    /// the zero-coding context range.
    fn zero_coding_context(&self, x: usize, y: usize) -> usize {
        let index = self.bordered_index(x, y);
        let stride = self.width + 2;
        let count = self.significant[index - 1]
            + self.significant[index + 1]
            + self.significant[index - stride]
            + self.significant[index + stride];
        (count as usize).min(4)
    }

    /// True when any of the eight neighbours is significant.
    fn has_significant_neighbour(&self, x: usize, y: usize) -> bool {
        let index = self.bordered_index(x, y);
        let stride = self.width + 2;
        self.significant[index - 1] != 0
            || self.significant[index + 1] != 0
            || self.significant[index - stride] != 0
            || self.significant[index + stride] != 0
            || self.significant[index - stride - 1] != 0
            || self.significant[index - stride + 1] != 0
            || self.significant[index + stride - 1] != 0
            || self.significant[index + stride + 1] != 0
    }

    fn clear_visited(&mut self) {
        self.visited.iter_mut().for_each(|flag| *flag = false);
    }
}

fn init_contexts(set: &mut dyn FnMut(usize, u8, u8)) {
    set(0, 4, 0);
    set(RUN_CONTEXT, 3, 0);
    set(UNIFORM_CONTEXT, UNIFORM_STATE, 0);
}

/// Number of magnitude bit-planes needed for the block.
fn magnitude_planes(coefficients: &[i32]) -> u8 {
    let max = coefficients
        .iter()
        .map(|value| value.unsigned_abs())
        .max()
        .unwrap_or(0);
    (32 - max.leading_zeros()) as u8
}

/// Encodes one code-block. An all-zero block produces an empty codeword.
pub fn encode_block(coefficients: &[i32], width: usize, height: usize) -> EncodedBlock {
    debug_assert_eq!(coefficients.len(), width * height);
    let bit_planes = magnitude_planes(coefficients);
    if bit_planes == 0 {
        return EncodedBlock::default();
    }

    let mut mq = MqEncoder::new(CONTEXT_COUNT);
    init_contexts(&mut |cx, state, mps| mq.set_context(cx, state, mps));
    let mut state = BlockState::new(width, height);
    let mut coding_passes = 0u8;

    for plane in (0..bit_planes).rev() {
        state.clear_visited();
        let first_plane = plane + 1 == bit_planes;

        // Significance propagation.
        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if state.is_significant(x, y) || !state.has_significant_neighbour(x, y) {
                    continue;
                }
                let value = coefficients[index];
                let bit = ((value.unsigned_abs() >> plane) & 1) as u8;
                mq.encode(bit, state.zero_coding_context(x, y));
                if bit == 1 {
                    let negative = value < 0;
                    state.mark_significant(x, y, negative);
                    mq.encode(negative as u8, SIGN_CONTEXT);
                }
                state.visited[index] = true;
            }
        }
        coding_passes += 1;

        // Magnitude refinement of coefficients significant from earlier
        // planes; the first plane has none.
        if !first_plane {
            for y in 0..height {
                for x in 0..width {
                    let index = y * width + x;
                    if !state.is_significant(x, y) || state.visited[index] {
                        continue;
                    }
                    let bit = ((coefficients[index].unsigned_abs() >> plane) & 1) as u8;
                    mq.encode(bit, REFINEMENT_CONTEXT);
                    state.visited[index] = true;
                }
            }
            coding_passes += 1;
        }

        // Cleanup of everything the propagation pass skipped.
        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if state.visited[index] || state.is_significant(x, y) {
                    continue;
                }
                let value = coefficients[index];
                let bit = ((value.unsigned_abs() >> plane) & 1) as u8;
                mq.encode(bit, RUN_CONTEXT);
                if bit == 1 {
                    let negative = value < 0;
                    state.mark_significant(x, y, negative);
                    mq.encode(negative as u8, UNIFORM_CONTEXT);
                }
            }
        }
        coding_passes += 1;
    }

    EncodedBlock {
        data: mq.finish(),
        bit_planes,
        coding_passes,
    }
}

/// Decodes one code-block coded by [`encode_block`].
pub fn decode_block(
    data: &[u8],
    width: usize,
    height: usize,
    bit_planes: u8,
) -> Vec<i32> {
    let mut magnitudes = vec![0u32; width * height];
    if bit_planes == 0 {
        return vec![0; width * height];
    }

    let mut mq = MqDecoder::new(data, CONTEXT_COUNT);
    init_contexts(&mut |cx, state, mps| mq.set_context(cx, state, mps));
    let mut state = BlockState::new(width, height);

    for plane in (0..bit_planes).rev() {
        state.clear_visited();
        let first_plane = plane + 1 == bit_planes;

        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if state.is_significant(x, y) || !state.has_significant_neighbour(x, y) {
                    continue;
                }
                let bit = mq.decode(state.zero_coding_context(x, y));
                if bit == 1 {
                    magnitudes[index] |= 1 << plane;
                    let negative = mq.decode(SIGN_CONTEXT) == 1;
                    state.mark_significant(x, y, negative);
                }
                state.visited[index] = true;
            }
        }

        if !first_plane {
            for y in 0..height {
                for x in 0..width {
                    let index = y * width + x;
                    if !state.is_significant(x, y) || state.visited[index] {
                        continue;
                    }
                    let bit = mq.decode(REFINEMENT_CONTEXT);
                    magnitudes[index] |= (bit as u32) << plane;
                    state.visited[index] = true;
                }
            }
        }

        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if state.visited[index] || state.is_significant(x, y) {
                    continue;
                }
                let bit = mq.decode(RUN_CONTEXT);
                if bit == 1 {
                    magnitudes[index] |= 1 << plane;
                    let negative = mq.decode(UNIFORM_CONTEXT) == 1;
                    state.mark_significant(x, y, negative);
                }
            }
        }
    }

    // Apply accumulated signs.
    let mut coefficients = vec![0i32; width * height];
    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let magnitude = magnitudes[index] as i32;
            coefficients[index] = if state.negative[state.bordered_index(x, y)] != 0 {
                -magnitude
            } else {
                magnitude
            };
        }
    }
    coefficients
}
