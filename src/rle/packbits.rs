//! PackBits run-length coding (DICOM PS3.5 Annex G).

use crate::error::CodecError;

/// Decodes a PackBits stream, stopping once `expected_len` bytes have been
/// produced. Control bytes: `0..=127` copy `n + 1` literals, `-127..=-1`
/// repeat the next byte `-n + 1` times, `-128` is a no-op.
pub fn unpack(data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::with_capacity(expected_len);
    let mut position = 0usize;

    while output.len() < expected_len {
        let control = *data.get(position).ok_or(CodecError::TruncatedInput)? as i8;
        position += 1;
        if control >= 0 {
            let count = control as usize + 1;
            let literals = data
                .get(position..position + count)
                .ok_or(CodecError::TruncatedInput)?;
            output.extend_from_slice(literals);
            position += count;
        } else if control != -128 {
            let value = *data.get(position).ok_or(CodecError::TruncatedInput)?;
            position += 1;
            output.resize(output.len() + (-(control as i32) + 1) as usize, value);
        }
    }
    output.truncate(expected_len);
    Ok(output)
}

/// Greedy PackBits encoder: replicate runs for two or more equal bytes,
/// literal runs otherwise, both capped at 128 bytes.
pub fn pack(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let mut position = 0usize;

    while position < data.len() {
        let run_length = repeat_run_length(&data[position..]);
        if run_length >= 2 {
            output.push((1i32 - run_length as i32) as u8);
            output.push(data[position]);
            position += run_length;
            continue;
        }

        // Gather literals until the next worthwhile repeat run.
        let start = position;
        position += 1;
        while position < data.len() && position - start < 128 {
            let next_run = repeat_run_length(&data[position..]);
            if next_run >= 3 || (next_run == 2 && position + 2 >= data.len()) {
                break;
            }
            position += 1;
        }
        output.push((position - start - 1) as u8);
        output.extend_from_slice(&data[start..position]);
    }
    output
}

fn repeat_run_length(data: &[u8]) -> usize {
    let first = data[0];
    data.iter().take(128).take_while(|&&byte| byte == first).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let packed = pack(data);
        let unpacked = unpack(&packed, data.len()).unwrap();
        assert_eq!(unpacked, data, "input {} bytes", data.len());
    }

    #[test]
    fn empty_input() {
        assert!(pack(&[]).is_empty());
        assert_eq!(unpack(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn single_byte() {
        roundtrip(&[0x42]);
    }

    #[test]
    fn short_runs() {
        roundtrip(&[7, 7]);
        roundtrip(&[7, 7, 7]);
        roundtrip(&[1, 2, 2, 3]);
    }

    #[test]
    fn runs_across_the_cap() {
        roundtrip(&vec![9u8; 128]);
        roundtrip(&vec![9u8; 129]);
        roundtrip(&vec![9u8; 300]);
    }

    #[test]
    fn literals_across_the_cap() {
        let literal_128: Vec<u8> = (0..128).map(|i| i as u8).collect();
        roundtrip(&literal_128);
        let literal_129: Vec<u8> = (0..129).map(|i| (i % 251) as u8).collect();
        roundtrip(&literal_129);
    }

    #[test]
    fn alternating_pattern() {
        let data: Vec<u8> = (0..257).map(|i| (i % 2) as u8 * 0xFF).collect();
        roundtrip(&data);
    }

    #[test]
    fn mixed_runs_and_literals() {
        let mut data = Vec::new();
        data.extend_from_slice(&[1, 2, 3]);
        data.extend_from_slice(&[50; 40]);
        data.extend_from_slice(&[4, 5]);
        data.extend_from_slice(&[0; 200]);
        data.push(9);
        roundtrip(&data);
    }

    #[test]
    fn decodes_reference_stream() {
        // From the TIFF PackBits description: FE AA = three 0xAA,
        // 02 80 00 2A = four literals, etc.
        let encoded = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22,
            0xF7, 0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A,
            0x22, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(unpack(&encoded, expected.len()).unwrap(), expected);
    }

    #[test]
    fn noop_control_byte_is_skipped() {
        let encoded = [0x80, 0x00, 0x41];
        assert_eq!(unpack(&encoded, 1).unwrap(), [0x41]);
    }

    #[test]
    fn truncated_literal_run_is_an_error() {
        assert_eq!(unpack(&[0x04, 0x01, 0x02], 5), Err(CodecError::TruncatedInput));
    }

    #[test]
    fn truncated_replicate_run_is_an_error() {
        assert_eq!(unpack(&[0xFE], 3), Err(CodecError::TruncatedInput));
    }
}
