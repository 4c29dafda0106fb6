//! Varint and frame primitives

use crate::error::{PingFailure, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest varint the protocol accepts (35 payload bits)
pub const MAX_VARINT_LEN: usize = 5;

/// Largest frame body we are willing to buffer (2^21 - 1)
pub const MAX_FRAME_LEN: usize = (1 << 21) - 1;

/// Append the base-128 encoding of `value` to `buf`
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Encode `value` as a varint, least significant group first
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    write_varint(&mut buf, value);
    buf
}

/// Fold one encoded byte into `value`. Returns true once the varint is complete.
fn accumulate(value: &mut u64, index: usize, byte: u8) -> Result<bool, ProtocolError> {
    *value |= u64::from(byte & 0x7f) << (7 * index);
    if byte & 0x80 == 0 {
        return Ok(true);
    }
    if index + 1 == MAX_VARINT_LEN {
        return Err(ProtocolError::VarintTooLong);
    }
    Ok(false)
}

/// Decode a varint from the front of `bytes`, returning it and the bytes consumed
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), ProtocolError> {
    let mut value = 0u64;
    for (index, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        if accumulate(&mut value, index, byte)? {
            return Ok((value, index + 1));
        }
    }
    Err(ProtocolError::TruncatedVarint)
}

/// Read a varint from a stream one byte at a time
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, PingFailure> {
    let mut value = 0u64;
    for index in 0..MAX_VARINT_LEN {
        let byte = reader.read_u8().await?;
        if accumulate(&mut value, index, byte)? {
            return Ok(value);
        }
    }
    Err(ProtocolError::VarintTooLong.into())
}

/// Prefix `payload` with its varint length
pub fn frame_packet(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + MAX_VARINT_LEN);
    write_varint(&mut framed, payload.len() as u64);
    framed.extend_from_slice(payload);
    framed
}

/// Strip the length prefix from a frame, returning exactly the declared payload
pub fn unframe(bytes: &[u8]) -> Result<&[u8], ProtocolError> {
    let (declared, prefix) = decode_varint(bytes)?;
    let body = &bytes[prefix..];
    let declared = usize::try_from(declared).unwrap_or(usize::MAX);
    if declared > body.len() {
        return Err(ProtocolError::TruncatedFrame {
            declared,
            available: body.len(),
        });
    }
    Ok(&body[..declared])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(1), vec![0x01]);
        assert_eq!(encode_varint(127), vec![0x7f]);
        assert_eq!(encode_varint(128), vec![0x80, 0x01]);
        assert_eq!(encode_varint(255), vec![0xff, 0x01]);
        assert_eq!(encode_varint(25565), vec![0xdd, 0xc7, 0x01]);
        assert_eq!(encode_varint(2_097_151), vec![0xff, 0xff, 0x7f]);
    }

    #[test]
    fn test_varint_round_trip_boundaries() {
        let max = (1u64 << 35) - 1;
        for n in [0, 1, 127, 128, 16_383, 16_384, 1 << 21, 1 << 28, max] {
            let encoded = encode_varint(n);
            assert!(encoded.len() <= MAX_VARINT_LEN);
            assert_eq!(decode_varint(&encoded), Ok((n, encoded.len())));
        }
    }

    #[test]
    fn test_decode_rejects_sixth_byte() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(decode_varint(&bytes), Err(ProtocolError::VarintTooLong));

        // Values of 2^35 and above need more than five bytes
        let encoded = encode_varint(1 << 35);
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_varint(&encoded), Err(ProtocolError::VarintTooLong));
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(decode_varint(&[]), Err(ProtocolError::TruncatedVarint));
        assert_eq!(decode_varint(&[0x80, 0x80]), Err(ProtocolError::TruncatedVarint));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        assert_eq!(decode_varint(&[0xac, 0x02, 0xff]), Ok((300, 2)));
    }

    #[test]
    fn test_frame_round_trip() {
        let long = vec![0x42u8; 300];
        for payload in [&b""[..], &[0x00][..], &b"hello"[..], &long[..]] {
            let framed = frame_packet(payload);
            assert_eq!(unframe(&framed), Ok(payload));
        }
        assert_eq!(&frame_packet(&long)[..2], &[0xac, 0x02]);
    }

    #[test]
    fn test_unframe_truncated() {
        assert_eq!(
            unframe(&[0x05, 0x01, 0x02]),
            Err(ProtocolError::TruncatedFrame {
                declared: 5,
                available: 2
            })
        );
    }

    #[tokio::test]
    async fn test_read_varint_from_stream() {
        let mut reader: &[u8] = &[0xdd, 0xc7, 0x01, 0x00][..];
        assert_eq!(read_varint(&mut reader).await.unwrap(), 25565);
        assert_eq!(read_varint(&mut reader).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_varint_overlong_stream() {
        let mut reader: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0xff, 0x01][..];
        let err = read_varint(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            PingFailure::Protocol(ProtocolError::VarintTooLong)
        ));
    }

    #[tokio::test]
    async fn test_read_varint_eof() {
        let mut reader: &[u8] = &[0x80];
        let err = read_varint(&mut reader).await.unwrap_err();
        assert!(matches!(err, PingFailure::Io(_)));
    }
}
