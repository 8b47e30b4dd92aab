use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Maximum width of the length prefix. A 10-byte varint already covers the
/// full u64 range, so anything longer means the stream has desynchronized.
pub const MAX_VARINT_LEN: usize = 10;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────┬──────────────────┐
/// │ Length (varint)      │ Payload           │
/// │ 7 bits/byte, LSB 1st │ (Length bytes)    │
/// └──────────────────────┴──────────────────┘
/// ```
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) {
    dst.reserve(MAX_VARINT_LEN + body.len());
    put_varint(body.len() as u64, dst);
    dst.put_slice(body);
}

/// Append `value` as a base-128 varint, least-significant group first.
pub fn put_varint(mut value: u64, dst: &mut BytesMut) {
    while value > 0x7F {
        dst.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

fn peek_varint(src: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut value = 0u64;
    for (idx, &byte) in src.iter().enumerate() {
        if idx >= MAX_VARINT_LEN {
            return Err(FrameError::InvalidLength);
        }
        value |= u64::from(byte & 0x7F) << (7 * idx as u32);
        if byte & 0x80 == 0 {
            return Ok(Some((value, idx + 1)));
        }
    }
    Ok(None) // Need more data
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` without consuming anything if the buffer doesn't hold a
/// complete frame yet. On success, consumes exactly the frame's total length
/// and returns the payload together with the number of bytes consumed.
/// Callable repeatedly against a residual buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<(Bytes, usize)>> {
    let Some((len, header)) = peek_varint(src)? else {
        return Ok(None);
    };

    let len = len as usize;
    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    let total = header + len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(header);
    let payload = src.split_to(len).freeze();

    Ok(Some((payload, total)))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(body, &mut buf);
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = b"hello, world simulator!";
        let mut buf = wire(payload);
        let expected_total = buf.len();

        let (decoded, consumed) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(decoded.as_ref(), payload);
        assert_eq!(consumed, expected_total);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_varint_boundaries() {
        // 127 fits in one prefix byte, 128 needs two.
        for len in [0usize, 1, 127, 128, 300, 16_383, 16_384] {
            let body = vec![0x5A; len];
            let mut buf = wire(&body);
            let prefix_len = buf.len() - len;
            if len < 128 {
                assert_eq!(prefix_len, 1, "len={len}");
            } else if len < 16_384 {
                assert_eq!(prefix_len, 2, "len={len}");
            } else {
                assert_eq!(prefix_len, 3, "len={len}");
            }

            let (decoded, consumed) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
                .unwrap()
                .unwrap();
            assert_eq!(decoded.len(), len);
            assert_eq!(consumed, prefix_len + len);
        }
    }

    #[test]
    fn test_varint_continuation_bit_layout() {
        // 300 = 0b10_0101100 → low group 0xAC (with continuation), high 0x02.
        let mut buf = BytesMut::new();
        put_varint(300, &mut buf);
        assert_eq!(buf.as_ref(), &[0xAC, 0x02]);
    }

    #[test]
    fn test_decode_incomplete_varint() {
        let mut buf = BytesMut::from(&[0x80u8, 0x80][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 2); // nothing consumed
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = wire(b"hello");
        buf.truncate(3);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3); // nothing consumed
    }

    #[test]
    fn test_decode_overlong_varint() {
        let mut buf = BytesMut::from(&[0x80u8; 11][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidLength)));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        put_varint(1024 * 1024 * 32, &mut buf); // 32 MiB

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"second", &mut buf);

        let (f1, _) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.as_ref(), b"first");

        let (f2, _) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = wire(b"");
        let (decoded, consumed) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(decoded.is_empty());
        assert_eq!(consumed, 1);
    }
}
