#![doc = r#"
MIDI's variable-length integer encoding.

Values are stored big-endian in 7-bit groups, one group per byte, with the
high bit of every byte except the last set as a continuation flag. Valid
encodings span at most 4 bytes, which caps values at 28 bits.
"#]

use crate::error::{CodecResult, ErrorKind};
use crate::stream::ByteStream;
use std::io::{Read, Seek};

/// The longest legal encoding.
pub const MAX_ENCODED_LEN: usize = 4;

/// The largest representable value (28 bits).
pub const MAX_VALUE: u32 = (1 << 28) - 1;

/// Decode one variable-length integer from the stream.
///
/// Returns the value and the number of bytes consumed. Fails with
/// [`ErrorKind::TruncatedVarLen`] if the continuation bit is still set after
/// [`MAX_ENCODED_LEN`] bytes.
pub fn read_varlen<S: Read + Seek>(stream: &mut ByteStream<S>) -> CodecResult<(u32, u32)> {
    let mut value = 0u32;
    for consumed in 1..=MAX_ENCODED_LEN as u32 {
        let byte = stream.read_u8()?;
        value |= (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, consumed));
        }
        value <<= 7;
    }
    Err(stream.err(ErrorKind::TruncatedVarLen))
}

/// Encode `value` in the minimal number of bytes.
///
/// Returns a buffer and the encoded length; the encoding occupies
/// `buf[..len]`. Values above [`MAX_VALUE`] saturate at the 28-bit ceiling.
pub fn encode_varlen(value: u32) -> ([u8; MAX_ENCODED_LEN], usize) {
    let mut value = value.min(MAX_VALUE);
    // Collect 7-bit groups least-significant first, then emit in reverse.
    let mut groups = [0u8; MAX_ENCODED_LEN];
    let mut count = 0;
    loop {
        groups[count] = (value & 0x7F) as u8;
        count += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let mut buf = [0u8; MAX_ENCODED_LEN];
    let mut len = 0;
    for group in (0..count).rev() {
        buf[len] = groups[group] | if group == 0 { 0 } else { 0x80 };
        len += 1;
    }
    (buf, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> CodecResult<(u32, u32)> {
        let mut stream = ByteStream::reading(Cursor::new(bytes.to_vec())).unwrap();
        read_varlen(&mut stream)
    }

    fn encoded(value: u32) -> Vec<u8> {
        let (buf, len) = encode_varlen(value);
        buf[..len].to_vec()
    }

    #[test]
    fn reference_encodings() {
        // Examples from the SMF specification.
        assert_eq!(encoded(0x00), vec![0x00]);
        assert_eq!(encoded(0x40), vec![0x40]);
        assert_eq!(encoded(0x7F), vec![0x7F]);
        assert_eq!(encoded(0x80), vec![0x81, 0x00]);
        assert_eq!(encoded(0x2000), vec![0xC0, 0x00]);
        assert_eq!(encoded(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encoded(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encoded(0x1FFFFF), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(encoded(0x200000), vec![0x81, 0x80, 0x80, 0x00]);
        assert_eq!(encoded(0x0FFF_FFFF), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn decode_reports_bytes_consumed() {
        assert_eq!(decode(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode(&[0x81, 0x00]).unwrap(), (0x80, 2));
        assert_eq!(decode(&[0xFF, 0xFF, 0xFF, 0x7F]).unwrap(), (0x0FFF_FFFF, 4));
    }

    #[test]
    fn round_trips_all_encoded_lengths() {
        for value in [0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1FFFFF, 0x200000, MAX_VALUE] {
            let bytes = encoded(value);
            let mut stream = ByteStream::reading(Cursor::new(bytes.clone())).unwrap();
            let (decoded, consumed) = read_varlen(&mut stream).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed as usize, bytes.len());
        }
    }

    #[test]
    fn reencoding_is_byte_identical() {
        for bytes in [
            vec![0x00],
            vec![0x7F],
            vec![0x81, 0x00],
            vec![0xC0, 0x00],
            vec![0x81, 0x80, 0x00],
            vec![0xFF, 0xFF, 0xFF, 0x7F],
        ] {
            let (value, _) = decode(&bytes).unwrap();
            assert_eq!(encoded(value), bytes);
        }
    }

    #[test]
    fn fifth_continuation_byte_is_truncated() {
        let err = decode(&[0x81, 0x81, 0x81, 0x81, 0x00]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TruncatedVarLen));
    }

    #[test]
    fn eof_mid_varlen_is_io() {
        let err = decode(&[0x81]).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn oversized_values_saturate() {
        assert_eq!(encoded(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }
}
