//! Transfer-syntax → codec dispatch.
//!
//! A registry maps DICOM transfer-syntax UIDs onto codec implementations
//! sharing one capability set: `encode`, `decode`, `name`, and
//! `transfer_syntax_uid`. For payloads with an unknown transfer syntax the
//! registry sniffs the leading bytes (JPEG SOI, JPEG 2000 SOC) and falls
//! back to trial decoding in the order RLE, JPEG Lossless, JPEG-LS.

use log::{debug, trace};

use crate::encapsulation;
use crate::error::CodecError;
use crate::jpeg_lossless::{JpegLosslessDecoder, JpegLosslessEncoder};
use crate::jpeg2000::Jpeg2000Codec;
use crate::jpegls::{JpeglsDecoder, JpeglsEncoder};
use crate::rle::RleCodec;
use crate::FrameInfo;

pub const TS_JPEG_LS_LOSSLESS: &str = "1.2.840.10008.1.2.4.80";
pub const TS_JPEG_LS_NEAR_LOSSLESS: &str = "1.2.840.10008.1.2.4.81";
pub const TS_JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";
pub const TS_JPEG_2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";
pub const TS_RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

/// Capability set every pixel-data codec exposes to the dispatcher and
/// the IOD builders. Frames are single-component grayscale with
/// precisions up to 16 bits.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Compresses one frame into a codec-specific bitstream.
    fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decompresses one frame. Width and height are advisory for the JPEG
    /// family (their headers are authoritative) and mandatory for RLE.
    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>, CodecError>;

    fn name(&self) -> &'static str;

    fn transfer_syntax_uid(&self) -> &'static str;
}

fn check_advisory_dimensions(
    frame: FrameInfo,
    width: u32,
    height: u32,
) -> Result<(), CodecError> {
    if (width != 0 && frame.width != width) || (height != 0 && frame.height != height) {
        return Err(CodecError::DimensionMismatch);
    }
    Ok(())
}

/// JPEG-LS lossless (SOF55).
#[derive(Debug, Clone, Copy, Default)]
pub struct JpeglsPixelCodec;

impl Codec for JpeglsPixelCodec {
    fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        JpeglsEncoder.encode(FrameInfo::grayscale(width, height, precision), pixels)
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>, CodecError> {
        let (frame, pixels) = JpeglsDecoder::new(data).decode()?;
        check_advisory_dimensions(frame, width, height)?;
        Ok(pixels)
    }

    fn name(&self) -> &'static str {
        "JPEG-LS Lossless"
    }

    fn transfer_syntax_uid(&self) -> &'static str {
        TS_JPEG_LS_LOSSLESS
    }
}

/// JPEG Lossless, Process 14, first-order prediction (SOF3).
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegLosslessPixelCodec;

impl Codec for JpegLosslessPixelCodec {
    fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        JpegLosslessEncoder.encode(FrameInfo::grayscale(width, height, precision), pixels)
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>, CodecError> {
        let (frame, pixels) = JpegLosslessDecoder::new(data).decode()?;
        check_advisory_dimensions(frame, width, height)?;
        Ok(pixels)
    }

    fn name(&self) -> &'static str {
        "JPEG Lossless SV1"
    }

    fn transfer_syntax_uid(&self) -> &'static str {
        TS_JPEG_LOSSLESS_SV1
    }
}

/// JPEG 2000 Part 1, reversible 5/3 only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jpeg2000PixelCodec;

impl Codec for Jpeg2000PixelCodec {
    fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        Jpeg2000Codec::default().encode(pixels, width, height, precision)
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>, CodecError> {
        let image = Jpeg2000Codec::default().decode(data)?;
        if image.planes.len() != 1 {
            return Err(CodecError::UnsupportedComponentCount);
        }
        check_advisory_dimensions(
            FrameInfo::grayscale(image.width, image.height, image.precision),
            width,
            height,
        )?;
        Ok(image.planes.into_iter().next().unwrap())
    }

    fn name(&self) -> &'static str {
        "JPEG 2000 Lossless"
    }

    fn transfer_syntax_uid(&self) -> &'static str {
        TS_JPEG_2000_LOSSLESS
    }
}

/// RLE Lossless. Width and height are authoritative on decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct RlePixelCodec;

impl Codec for RlePixelCodec {
    fn encode(
        &self,
        pixels: &[u16],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        RleCodec.encode(pixels, width, height, precision)
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>, CodecError> {
        RleCodec.decode(data, width, height)
    }

    fn name(&self) -> &'static str {
        "RLE Lossless"
    }

    fn transfer_syntax_uid(&self) -> &'static str {
        TS_RLE_LOSSLESS
    }
}

/// Keyed table of the codecs this crate ships.
pub struct CodecRegistry {
    entries: Vec<(&'static str, Box<dyn Codec>)>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        let entries: Vec<(&'static str, Box<dyn Codec>)> = vec![
            (TS_JPEG_LS_LOSSLESS, Box::new(JpeglsPixelCodec)),
            (TS_JPEG_LS_NEAR_LOSSLESS, Box::new(JpeglsPixelCodec)),
            (TS_JPEG_LOSSLESS_SV1, Box::new(JpegLosslessPixelCodec)),
            (TS_JPEG_2000_LOSSLESS, Box::new(Jpeg2000PixelCodec)),
            (TS_RLE_LOSSLESS, Box::new(RlePixelCodec)),
        ];
        Self { entries }
    }

    pub fn for_transfer_syntax(&self, uid: &str) -> Result<&dyn Codec, CodecError> {
        self.entries
            .iter()
            .find(|(key, _)| *key == uid.trim_end_matches('\0'))
            .map(|(_, codec)| codec.as_ref())
            .ok_or(CodecError::UnknownTransferSyntax)
    }

    /// Identifies a codec from the payload's leading bytes. JPEG family
    /// streams are resolved by scanning for their SOF marker; a miss
    /// falls through to [`Self::decode_sniffed`]'s trial order.
    pub fn sniff(&self, data: &[u8]) -> Option<&dyn Codec> {
        if data.len() < 2 {
            return None;
        }
        let uid = match [data[0], data[1]] {
            [0xFF, 0xD8] => {
                if find_marker(data, 0xF7) {
                    TS_JPEG_LS_LOSSLESS
                } else if find_marker(data, 0xC3) {
                    TS_JPEG_LOSSLESS_SV1
                } else {
                    return None;
                }
            }
            [0xFF, 0x4F] => TS_JPEG_2000_LOSSLESS,
            _ => return None,
        };
        trace!("sniffed {uid}");
        self.for_transfer_syntax(uid).ok()
    }

    /// Decodes a frame whose transfer syntax is unknown: sniff first, then
    /// try RLE, JPEG Lossless, and JPEG-LS in that order.
    pub fn decode_sniffed(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u16>, CodecError> {
        if let Some(codec) = self.sniff(data) {
            return codec.decode(data, width, height);
        }
        for uid in [TS_RLE_LOSSLESS, TS_JPEG_LOSSLESS_SV1, TS_JPEG_LS_LOSSLESS] {
            let codec = self.for_transfer_syntax(uid)?;
            match codec.decode(data, width, height) {
                Ok(pixels) => return Ok(pixels),
                Err(error) => debug!("{} rejected payload: {error}", codec.name()),
            }
        }
        Err(CodecError::UnknownTransferSyntax)
    }

    /// Compresses every frame with the codec of `uid` and wraps the result
    /// in an encapsulated pixel-data value (offset table, items, sequence
    /// delimitation).
    pub fn encode_encapsulated(
        &self,
        uid: &str,
        frames: &[Vec<u16>],
        width: u32,
        height: u32,
        precision: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let codec = self.for_transfer_syntax(uid)?;
        let mut compressed = Vec::with_capacity(frames.len());
        for frame in frames {
            compressed.push(codec.encode(frame, width, height, precision)?);
        }
        Ok(encapsulation::write(&compressed))
    }

    /// Parses an encapsulated pixel-data value and decodes every frame,
    /// sniffing the codec per frame when `uid` is `None`.
    pub fn decode_encapsulated(
        &self,
        uid: Option<&str>,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Vec<u16>>, CodecError> {
        let parsed = encapsulation::read(data)?;
        let mut frames = Vec::with_capacity(parsed.frames.len());
        for frame in &parsed.frames {
            let pixels = match uid {
                Some(uid) => self.for_transfer_syntax(uid)?.decode(frame, width, height)?,
                None => self.decode_sniffed(frame, width, height)?,
            };
            frames.push(pixels);
        }
        Ok(frames)
    }
}

fn find_marker(data: &[u8], code: u8) -> bool {
    data.windows(2).any(|pair| pair == [0xFF, code])
}
