//! Value types for the JPEG 2000 main-header marker segments.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Layer/resolution/component/position progression orders (COD SGcod).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProgressionOrder {
    #[default]
    LayerResolutionComponentPosition = 0,
    ResolutionLayerComponentPosition = 1,
    ResolutionPositionComponentLayer = 2,
    PositionComponentResolutionLayer = 3,
    ComponentPositionResolutionLayer = 4,
}

/// Wavelet filter selected in COD SPcod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TransformKind {
    Irreversible97 = 0,
    #[default]
    Reversible53 = 1,
}

/// Per-component geometry from SIZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSiz {
    /// Bits per sample (1-38 on the wire; this crate supports 2-16).
    pub precision: u8,
    pub signed: bool,
    /// Horizontal and vertical sub-sampling factors.
    pub dx: u8,
    pub dy: u8,
}

impl ComponentSiz {
    pub fn unsigned(precision: u8) -> Self {
        Self {
            precision,
            signed: false,
            dx: 1,
            dy: 1,
        }
    }
}

/// Image and tile size (SIZ) record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SizSegment {
    pub capabilities: u16,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_x_offset: u32,
    pub tile_y_offset: u32,
    pub components: Vec<ComponentSiz>,
}

impl SizSegment {
    pub fn untiled(width: u32, height: u32, components: Vec<ComponentSiz>) -> Self {
        Self {
            width,
            height,
            tile_width: width,
            tile_height: height,
            components,
            ..Self::default()
        }
    }

    pub fn component_count(&self) -> u16 {
        self.components.len() as u16
    }

    pub fn tiles_across(&self) -> u32 {
        (self.width - self.tile_x_offset).div_ceil(self.tile_width)
    }

    pub fn tiles_down(&self) -> u32 {
        (self.height - self.tile_y_offset).div_ceil(self.tile_height)
    }
}

/// Coding style default (COD) record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodSegment {
    pub coding_style: u8,
    pub progression_order: ProgressionOrder,
    pub layer_count: u16,
    /// Non-zero enables the multiple-component (here: reversible colour)
    /// transform.
    pub multi_component_transform: u8,
    pub decomposition_levels: u8,
    /// Stored exponent; the nominal code-block side is `1 << (exp + 2)`.
    pub code_block_width_exp: u8,
    pub code_block_height_exp: u8,
    pub code_block_style: u8,
    pub transform: TransformKind,
    /// Present when Scod bit 0 is set, one byte per resolution level.
    pub precinct_sizes: Vec<u8>,
}

impl CodSegment {
    /// The layout this crate writes: LRCP, one layer, reversible 5/3,
    /// 64×64 code-blocks.
    pub fn reversible_default(decomposition_levels: u8, multi_component: bool) -> Self {
        Self {
            coding_style: 0,
            progression_order: ProgressionOrder::LayerResolutionComponentPosition,
            layer_count: 1,
            multi_component_transform: multi_component as u8,
            decomposition_levels,
            code_block_width_exp: 4,
            code_block_height_exp: 4,
            code_block_style: 0,
            transform: TransformKind::Reversible53,
            precinct_sizes: Vec::new(),
        }
    }

    pub fn code_block_width(&self) -> u32 {
        1 << (self.code_block_width_exp + 2)
    }

    pub fn code_block_height(&self) -> u32 {
        1 << (self.code_block_height_exp + 2)
    }
}

/// Quantization default (QCD) record, reversible style only: one step-size
/// exponent per subband.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcdSegment {
    pub guard_bits: u8,
    pub exponents: Vec<u8>,
}

impl QcdSegment {
    /// Reversible no-quantization layout: `3·levels + 1` subband exponents
    /// derived from the sample precision and the subband gain.
    pub fn reversible_default(decomposition_levels: u8, precision: u8, guard_bits: u8) -> Self {
        let mut exponents = Vec::with_capacity(3 * decomposition_levels as usize + 1);
        exponents.push(precision);
        for _ in 0..decomposition_levels {
            exponents.push(precision + 1); // HL
            exponents.push(precision + 1); // LH
            exponents.push(precision + 2); // HH
        }
        Self {
            guard_bits,
            exponents,
        }
    }

    pub fn subband_count(&self) -> usize {
        self.exponents.len()
    }
}

/// Start of tile-part (SOT) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SotSegment {
    pub tile_index: u16,
    /// Length of the tile-part from the first byte of SOT, zero when the
    /// part runs to EOC.
    pub tile_part_length: u32,
    pub tile_part_index: u8,
    pub tile_part_count: u8,
}
