use thiserror::Error;

/// Codec-independent error taxonomy shared by every compression engine in
/// the crate. The dispatcher maps these onto its fallback policy: only
/// `MarkerEncountered` is recoverable (the JPEG-LS scan ends early), every
/// other kind is fatal to the current frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of input inside a run, segment, or bitstream")]
    TruncatedInput,
    #[error("Expected marker not found")]
    InvalidMarker,
    #[error("Marker segment length inconsistent with contents")]
    InvalidSegmentLength,
    #[error("Start of codestream (SOC) marker not found")]
    InvalidCodestream,
    #[error("Quantization style not supported (reversible only)")]
    UnsupportedQuantization,
    #[error("Wavelet transform not supported (reversible 5/3 only)")]
    UnsupportedTransform,
    #[error("Component count not supported by this decoder")]
    UnsupportedComponentCount,
    #[error("Near-lossless mode not supported")]
    UnsupportedNearLossless,
    #[error("Bits per sample outside the supported 2-16 range")]
    UnsupportedPrecision,
    #[error("Transfer syntax not registered")]
    UnknownTransferSyntax,
    #[error("Declared width/height incompatible with payload size")]
    DimensionMismatch,
    #[error("Golomb unary prefix exceeds the safety limit")]
    GolombOverflow,
    #[error("Huffman code not present in table")]
    InvalidHuffmanCode,
    #[error("Marker encountered inside an entropy-coded bitstream")]
    MarkerEncountered,
}
