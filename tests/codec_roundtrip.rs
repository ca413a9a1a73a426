//! End-to-end scenarios across the codec registry and the encapsulated
//! pixel-data container.

use dicos_codec::dispatch::{
    CodecRegistry, JpeglsPixelCodec, RlePixelCodec, TS_JPEG_2000_LOSSLESS, TS_JPEG_LOSSLESS_SV1,
    TS_JPEG_LS_LOSSLESS, TS_RLE_LOSSLESS,
};
use dicos_codec::{encapsulation, Codec};

fn gradient_8x8() -> Vec<u16> {
    // Pixel (x, y) = 8 * (x + y).
    (0..64).map(|i| 8 * ((i % 8) + (i / 8)) as u16).collect()
}

#[test]
fn jpegls_8x8_gradient_roundtrip() {
    let registry = CodecRegistry::new();
    let codec = registry.for_transfer_syntax(TS_JPEG_LS_LOSSLESS).unwrap();
    let pixels = gradient_8x8();
    let encoded = codec.encode(&pixels, 8, 8, 8).unwrap();
    let decoded = codec.decode(&encoded, 8, 8).unwrap();
    assert_eq!(decoded, pixels);
}

#[test]
fn jpeg2000_solid_64x64_roundtrip_and_compression() {
    let registry = CodecRegistry::new();
    let codec = registry.for_transfer_syntax(TS_JPEG_2000_LOSSLESS).unwrap();
    let pixels = vec![128u16; 64 * 64];
    let encoded = codec.encode(&pixels, 64, 64, 8).unwrap();
    assert!(
        encoded.len() < 64 * 64 * 2,
        "expected compression below the raw size, got {} bytes",
        encoded.len()
    );
    let decoded = codec.decode(&encoded, 64, 64).unwrap();
    assert!(decoded.iter().all(|&value| value == 128));
}

#[test]
fn rle_16bit_100x100_roundtrip() {
    let registry = CodecRegistry::new();
    let codec = registry.for_transfer_syntax(TS_RLE_LOSSLESS).unwrap();
    // Pixel value (y << 8) | x keeps the byte planes disjoint.
    let pixels: Vec<u16> = (0..100u32 * 100)
        .map(|i| (((i / 100) << 8) | (i % 100)) as u16)
        .collect();
    let encoded = codec.encode(&pixels, 100, 100, 16).unwrap();
    let decoded = codec.decode(&encoded, 100, 100).unwrap();
    assert_eq!(decoded, pixels);
}

#[test]
fn jpeg_lossless_16bit_roundtrip() {
    let registry = CodecRegistry::new();
    let codec = registry.for_transfer_syntax(TS_JPEG_LOSSLESS_SV1).unwrap();
    let pixels: Vec<u16> = (0..48u32 * 32)
        .map(|i| (i.wrapping_mul(9973) % 65536) as u16)
        .collect();
    let encoded = codec.encode(&pixels, 48, 32, 16).unwrap();
    let decoded = codec.decode(&encoded, 48, 32).unwrap();
    assert_eq!(decoded, pixels);
}

#[test]
fn every_codec_roundtrips_the_same_frame() {
    let registry = CodecRegistry::new();
    let pixels: Vec<u16> = (0..32u32 * 24).map(|i| (i * 5 % 256) as u16).collect();
    for uid in [
        TS_JPEG_LS_LOSSLESS,
        TS_JPEG_LOSSLESS_SV1,
        TS_JPEG_2000_LOSSLESS,
        TS_RLE_LOSSLESS,
    ] {
        let codec = registry.for_transfer_syntax(uid).unwrap();
        let encoded = codec.encode(&pixels, 32, 24, 8).unwrap();
        let decoded = codec.decode(&encoded, 32, 24).unwrap();
        assert_eq!(decoded, pixels, "codec {}", codec.name());
    }
}

#[test]
fn encapsulated_multiframe_jpegls_roundtrip() {
    let registry = CodecRegistry::new();
    let codec = registry.for_transfer_syntax(TS_JPEG_LS_LOSSLESS).unwrap();

    let frames: Vec<Vec<u16>> = (0..3)
        .map(|frame| {
            (0..64)
                .map(|i| ((i as u32 * 7 + frame * 31) % 256) as u16)
                .collect()
        })
        .collect();
    let compressed: Vec<Vec<u8>> = frames
        .iter()
        .map(|frame| codec.encode(frame, 8, 8, 8).unwrap())
        .collect();

    let element = encapsulation::write(&compressed);
    let parsed = encapsulation::read(&element).unwrap();
    assert_eq!(parsed.frames.len(), 3);
    assert_eq!(parsed.offset_table.len(), 3);
    assert_eq!(parsed.offset_table[0], 0);

    for (frame, original) in parsed.frames.iter().zip(&frames) {
        let decoded = codec.decode(frame, 8, 8).unwrap();
        assert_eq!(&decoded, original);
    }
}

#[test]
fn registry_encapsulates_and_recovers_multiframe_series() {
    let registry = CodecRegistry::new();
    let frames: Vec<Vec<u16>> = (0..4)
        .map(|frame| {
            (0..16u32 * 16)
                .map(|i| ((i * 11 + frame * 97) % 4096) as u16)
                .collect()
        })
        .collect();

    for uid in [TS_JPEG_LS_LOSSLESS, TS_JPEG_2000_LOSSLESS, TS_RLE_LOSSLESS] {
        let element = registry
            .encode_encapsulated(uid, &frames, 16, 16, 12)
            .unwrap();
        let decoded = registry
            .decode_encapsulated(Some(uid), &element, 16, 16)
            .unwrap();
        assert_eq!(decoded, frames, "transfer syntax {uid}");
    }
}

#[test]
fn encapsulated_frames_decode_without_a_transfer_syntax() {
    let registry = CodecRegistry::new();
    let frames = vec![gradient_8x8(), vec![64u16; 64]];
    let element = registry
        .encode_encapsulated(TS_JPEG_LS_LOSSLESS, &frames, 8, 8, 8)
        .unwrap();
    let decoded = registry.decode_encapsulated(None, &element, 8, 8).unwrap();
    assert_eq!(decoded, frames);
}

#[test]
fn sniffing_decodes_unlabelled_frames() {
    let registry = CodecRegistry::new();
    let pixels = gradient_8x8();

    let jls = JpeglsPixelCodec.encode(&pixels, 8, 8, 8).unwrap();
    assert_eq!(registry.decode_sniffed(&jls, 8, 8).unwrap(), pixels);

    let rle = RlePixelCodec.encode(&pixels, 8, 8, 8).unwrap();
    assert_eq!(registry.decode_sniffed(&rle, 8, 8).unwrap(), pixels);
}

#[test]
fn codecs_report_their_identity() {
    let registry = CodecRegistry::new();
    for uid in [
        TS_JPEG_LS_LOSSLESS,
        TS_JPEG_LOSSLESS_SV1,
        TS_JPEG_2000_LOSSLESS,
        TS_RLE_LOSSLESS,
    ] {
        let codec = registry.for_transfer_syntax(uid).unwrap();
        assert_eq!(codec.transfer_syntax_uid(), uid);
        assert!(!codec.name().is_empty());
    }
}
