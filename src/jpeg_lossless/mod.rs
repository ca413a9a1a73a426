//! JPEG Lossless, Process 14 (ISO/IEC 10918-1 / ITU-T T.81 Annex H).
//!
//! Predictive DPCM coding with Huffman-coded difference categories. The
//! decoder accepts any of the seven predictors and restart intervals; the
//! encoder emits the selection-value-1 profile that DICOM assigns to
//! transfer syntax 1.2.840.10008.1.2.4.70.

pub mod decoder;
pub mod encoder;
pub mod huffman;

pub use decoder::JpegLosslessDecoder;
pub use encoder::JpegLosslessEncoder;
