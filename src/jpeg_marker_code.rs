use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;

/// Marker codes of the classic JPEG family (ITU-T T.81 / T.87). The value is
/// the second marker byte; every marker is preceded by `0xFF` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// SOF3: lossless (sequential) frame, Process 14.
    StartOfFrameLossless = 0xC3,
    /// DHT: Huffman table definition.
    DefineHuffmanTable = 0xC4,
    /// SOI: start of image.
    StartOfImage = 0xD8,
    /// EOI: end of image.
    EndOfImage = 0xD9,
    /// SOS: start of scan.
    StartOfScan = 0xDA,
    /// DNL: number of lines.
    DefineNumberOfLines = 0xDC,
    /// DRI: restart interval.
    DefineRestartInterval = 0xDD,
    /// APP0 through APP15: application data.
    ApplicationData0 = 0xE0,
    ApplicationData1 = 0xE1,
    ApplicationData2 = 0xE2,
    ApplicationData3 = 0xE3,
    ApplicationData4 = 0xE4,
    ApplicationData5 = 0xE5,
    ApplicationData6 = 0xE6,
    ApplicationData7 = 0xE7,
    ApplicationData8 = 0xE8,
    ApplicationData9 = 0xE9,
    ApplicationData10 = 0xEA,
    ApplicationData11 = 0xEB,
    ApplicationData12 = 0xEC,
    ApplicationData13 = 0xED,
    ApplicationData14 = 0xEE,
    ApplicationData15 = 0xEF,
    /// SOF55: JPEG-LS frame (ITU-T T.87).
    StartOfFrameJpegls = 0xF7,
    /// LSE: JPEG-LS preset parameters.
    JpeglsPresetParameters = 0xF8,
    /// COM: comment.
    Comment = 0xFE,
}

impl JpegMarkerCode {
    pub fn is_application_data(self) -> bool {
        (0xE0..=0xEF).contains(&u8::from(self))
    }
}

/// Marker codes of the JPEG 2000 codestream (ITU-T T.800 Annex A). As with
/// the JPEG family the value is the low byte of the big-endian marker word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum J2kMarkerCode {
    /// SOC: start of codestream.
    StartOfCodestream = 0x4F,
    /// SIZ: image and tile size.
    ImageAndTileSize = 0x51,
    /// COD: coding style default.
    CodingStyleDefault = 0x52,
    /// COC: coding style component.
    CodingStyleComponent = 0x53,
    /// QCD: quantization default.
    QuantizationDefault = 0x5C,
    /// QCC: quantization component.
    QuantizationComponent = 0x5D,
    /// RGN: region of interest.
    RegionOfInterest = 0x5E,
    /// COM: codestream comment.
    Comment = 0x64,
    /// SOT: start of tile-part.
    StartOfTile = 0x90,
    /// SOD: start of data.
    StartOfData = 0x93,
    /// EOC: end of codestream (shares the value of JPEG's EOI).
    EndOfCodestream = 0xD9,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        assert_eq!(
            JpegMarkerCode::try_from(0xF7),
            Ok(JpegMarkerCode::StartOfFrameJpegls)
        );
        assert_eq!(u8::from(JpegMarkerCode::StartOfFrameLossless), 0xC3);
        assert_eq!(J2kMarkerCode::try_from(0x51), Ok(J2kMarkerCode::ImageAndTileSize));
        assert!(J2kMarkerCode::try_from(0x42).is_err());
    }

    #[test]
    fn app_markers_are_recognised() {
        assert!(JpegMarkerCode::ApplicationData8.is_application_data());
        assert!(!JpegMarkerCode::StartOfScan.is_application_data());
    }
}
