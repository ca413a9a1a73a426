//! JPEG 2000 Part 1 implementation (ISO/IEC 15444-1), reversible path.
//!
//! - `codestream` / `markers`: codestream syntax (SOC, SIZ, COD, QCD, SOT).
//! - `mq_coder`: the MQ arithmetic coder (Tier-1 coding).
//! - `block_coder`: context modelling and bit-plane coding of code-blocks.
//! - `dwt`: the reversible 5/3 wavelet and subband geometry.
//! - `rct`: the reversible colour transform.
//! - `tile`: code-block partitioning and the raw tile payload.
//! - `codec`: whole-image encode/decode wiring the layers together.

pub mod block_coder;
pub mod codec;
pub mod codestream;
pub mod dwt;
pub mod markers;
pub mod mq_coder;
pub mod rct;
pub mod tile;

pub use codec::{DecodedImage, Jpeg2000Codec};
