//! DICOM encapsulated pixel-data framing (PS3.5 Annex A.4).
//!
//! An encapsulated value is a sequence of items: first the Basic Offset
//! Table (one 32-bit offset per frame, relative to the first byte of the
//! item that follows the table), then one item per compressed frame
//! padded to even length, closed by the sequence delimitation item.
//! Item tags and lengths are little-endian, unlike every codec payload.

use crate::error::CodecError;

const ITEM_GROUP: u16 = 0xFFFE;
const ITEM_ELEMENT: u16 = 0xE000;
const DELIMITER_ELEMENT: u16 = 0xE0DD;

/// Compressed frames parsed from (or destined for) an encapsulated pixel
/// data element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncapsulatedPixelData {
    pub frames: Vec<Vec<u8>>,
    /// Offsets as carried by the Basic Offset Table.
    pub offset_table: Vec<u32>,
}

/// Serialises frames with a Basic Offset Table. Frame `0` sits at offset
/// `0`; each subsequent offset advances by the previous frame's padded
/// length plus its 8-byte item header.
pub fn write(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut output = Vec::new();

    write_item_header(&mut output, 4 * frames.len() as u32);
    let mut offset = 0u32;
    for frame in frames {
        output.extend_from_slice(&offset.to_le_bytes());
        offset += 8 + padded_len(frame) as u32;
    }

    for frame in frames {
        write_item_header(&mut output, padded_len(frame) as u32);
        output.extend_from_slice(frame);
        if frame.len() % 2 != 0 {
            output.push(0);
        }
    }

    write_tag(&mut output, DELIMITER_ELEMENT);
    output.extend_from_slice(&0u32.to_le_bytes());
    output
}

/// Parses an encapsulated value back into its frames, validating the
/// offset table against the item layout actually found.
pub fn read(data: &[u8]) -> Result<EncapsulatedPixelData, CodecError> {
    let mut position = 0usize;

    let bot_length = read_item_header(data, &mut position)?;
    if bot_length % 4 != 0 {
        return Err(CodecError::InvalidSegmentLength);
    }
    let mut offset_table = Vec::with_capacity(bot_length as usize / 4);
    for _ in 0..bot_length / 4 {
        offset_table.push(u32::from_le_bytes(
            read_exact(data, &mut position, 4)?.try_into().unwrap(),
        ));
    }

    let first_item = position;
    let mut frames = Vec::new();
    loop {
        let item_offset = position - first_item;
        let (element, length) = read_any_item(data, &mut position)?;
        if element == DELIMITER_ELEMENT {
            if length != 0 {
                return Err(CodecError::InvalidSegmentLength);
            }
            break;
        }
        if let Some(&expected) = offset_table.get(frames.len()) {
            if expected as usize != item_offset {
                return Err(CodecError::InvalidSegmentLength);
            }
        }
        frames.push(read_exact(data, &mut position, length as usize)?.to_vec());
    }
    Ok(EncapsulatedPixelData {
        frames,
        offset_table,
    })
}

/// Uncompressed pixel data: the alternative to selecting a codec. Samples
/// above 8 bits are stored little-endian, one or two bytes each.
pub fn native_bytes(pixels: &[u16], precision: u8) -> Vec<u8> {
    if precision <= 8 {
        pixels.iter().map(|&value| value as u8).collect()
    } else {
        pixels
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect()
    }
}

/// Parses a native pixel-data value back into samples. A single trailing
/// pad byte is tolerated.
pub fn native_pixels(
    data: &[u8],
    sample_count: usize,
    precision: u8,
) -> Result<Vec<u16>, CodecError> {
    let bytes_per_sample = if precision <= 8 { 1 } else { 2 };
    let needed = sample_count * bytes_per_sample;
    if data.len() < needed || data.len() > needed + 1 {
        return Err(CodecError::DimensionMismatch);
    }
    if bytes_per_sample == 1 {
        Ok(data[..needed].iter().map(|&byte| byte as u16).collect())
    } else {
        Ok(data[..needed]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }
}

fn padded_len(frame: &[u8]) -> usize {
    frame.len() + frame.len() % 2
}

fn write_tag(output: &mut Vec<u8>, element: u16) {
    output.extend_from_slice(&ITEM_GROUP.to_le_bytes());
    output.extend_from_slice(&element.to_le_bytes());
}

fn write_item_header(output: &mut Vec<u8>, length: u32) {
    write_tag(output, ITEM_ELEMENT);
    output.extend_from_slice(&length.to_le_bytes());
}

fn read_exact<'a>(
    data: &'a [u8],
    position: &mut usize,
    count: usize,
) -> Result<&'a [u8], CodecError> {
    let slice = data
        .get(*position..*position + count)
        .ok_or(CodecError::TruncatedInput)?;
    *position += count;
    Ok(slice)
}

fn read_any_item(data: &[u8], position: &mut usize) -> Result<(u16, u32), CodecError> {
    let header = read_exact(data, position, 8)?;
    let group = u16::from_le_bytes(header[0..2].try_into().unwrap());
    let element = u16::from_le_bytes(header[2..4].try_into().unwrap());
    let length = u32::from_le_bytes(header[4..8].try_into().unwrap());
    if group != ITEM_GROUP || (element != ITEM_ELEMENT && element != DELIMITER_ELEMENT) {
        return Err(CodecError::InvalidMarker);
    }
    Ok((element, length))
}

fn read_item_header(data: &[u8], position: &mut usize) -> Result<u32, CodecError> {
    let (element, length) = read_any_item(data, position)?;
    if element != ITEM_ELEMENT {
        return Err(CodecError::InvalidMarker);
    }
    Ok(length)
}
