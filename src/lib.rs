/*!
# dicos-codec

`dicos-codec` is a pure Rust library of lossless pixel-data codecs for
DICOS (Digital Imaging and Communications in Security) and DICOM datasets:
baggage CT slices, X-ray projections, and threat-detection report imagery.

## Supported transfer syntaxes

| Codec | Transfer syntax UID | Encode | Decode |
|-------|---------------------|--------|--------|
| JPEG 2000 (Part 1, reversible 5/3) | 1.2.840.10008.1.2.4.90 | ✅ | ✅ |
| JPEG-LS lossless | 1.2.840.10008.1.2.4.80 / .81 | ✅ | ✅ |
| JPEG Lossless, Process 14 SV1 | 1.2.840.10008.1.2.4.70 | ✅ | ✅ |
| RLE Lossless (PackBits) | 1.2.840.10008.1.2.5 | ✅ | ✅ |

All codecs are single-component grayscale with precisions up to 16 bits,
the profile DICOS screening imagery uses. The JPEG 2000 engine additionally
handles three-component images through the reversible colour transform.

The [`dispatch`] module maps transfer-syntax UIDs onto codec instances and
sniffs unlabelled payloads; [`encapsulation`] frames compressed frames into
the DICOM encapsulated pixel-data sequence (Basic Offset Table + items).

## Safety

The library is written entirely in safe Rust; codec state is owned per
call, so frames may be processed from multiple threads without locking.
*/

pub mod bit_io;
pub mod dispatch;
pub mod encapsulation;
pub mod error;
pub mod jpeg_lossless;
pub mod jpeg_marker_code;
pub mod jpeg2000;
pub mod jpegls;
pub mod rle;

pub use dispatch::{Codec, CodecRegistry};
pub use error::CodecError;

/// Basic geometry of a single image frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// Width of the frame in pixels.
    pub width: u32,
    /// Height of the frame in pixels.
    pub height: u32,
    /// Bits per sample (2-16).
    pub bits_per_sample: u8,
    /// Number of components (1 for grayscale, 3 for RGB).
    pub component_count: u8,
}

impl FrameInfo {
    pub fn grayscale(width: u32, height: u32, bits_per_sample: u8) -> Self {
        Self {
            width,
            height,
            bits_per_sample,
            component_count: 1,
        }
    }

    /// Number of samples in one component plane.
    pub fn samples_per_plane(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Highest representable sample value.
    pub fn max_sample_value(&self) -> i32 {
        (1 << self.bits_per_sample) - 1
    }
}
