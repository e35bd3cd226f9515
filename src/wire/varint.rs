//! VarInt pack/unpack (spec §4.1).
//!
//! 7 payload bits per byte, MSB = continuation, max 5 bytes. Negative `i32`
//! values are encoded via their unsigned 32-bit two's-complement
//! representation, which is what lets the protocol use `-1` as the
//! handshake probe version.

use snafu::{Backtrace, GenerateImplicitData, OptionExt, Snafu};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const MAX_VARINT_BYTES: usize = 5;

#[derive(Snafu, Debug)]
pub enum WireError {
    #[snafu(display("varint has more than {MAX_VARINT_BYTES} continuation bytes"))]
    VarIntTooLong { backtrace: Backtrace },
    #[snafu(display("unexpected end of data while reading varint"))]
    VarIntTruncated { backtrace: Backtrace },
    #[snafu(display("io error: {source}"), context(false))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("bad frame length: {length}"))]
    InvalidLength { length: i64, backtrace: Backtrace },
    #[snafu(display("unexpected packet id {id:#x}, expected {expected:#x}"))]
    UnexpectedPacketId {
        id: i32,
        expected: i32,
        backtrace: Backtrace,
    },
    #[snafu(display("string is not valid utf8"))]
    InvalidUtf8 { backtrace: Backtrace },
    #[snafu(display("connection closed by peer"))]
    ConnectionClosed { backtrace: Backtrace },
}

/// Encodes `value` as a Minecraft VarInt (LEB128-like, 7 bits/byte).
pub fn encode_varint(value: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_BYTES);
    let mut v = value as u32;
    loop {
        let mut byte = (v & 0x7F) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
    out
}

/// Decodes a VarInt from `buf` starting at `offset`, returning `(value, bytes_consumed)`.
pub fn read_varint_bytes(buf: &[u8], offset: usize) -> Result<(i32, usize), WireError> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        if consumed >= MAX_VARINT_BYTES {
            return VarIntTooLongSnafu.fail();
        }
        let idx = offset + consumed;
        let byte = *buf.get(idx).context(VarIntTruncatedSnafu)?;
        consumed += 1;

        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    Ok((result as i32, consumed))
}

/// Reads a VarInt directly off an async socket, honoring `timeout` and the
/// 5-byte continuation cap.
pub async fn read_varint_stream<R>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<i32, WireError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(timeout, async move {
        let mut result: u32 = 0;
        let mut shift = 0u32;
        let mut count = 0usize;

        loop {
            if count >= MAX_VARINT_BYTES {
                return VarIntTooLongSnafu.fail();
            }
            let byte = reader.read_u8().await?;
            count += 1;

            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        Ok(result as i32)
    })
    .await
    .map_err(|_| {
        // mapped to a plain io timeout error; callers translate this to
        // `ObservatoryError::ReadTimeout` at the prober layer.
        WireError::Io {
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "varint read timed out"),
            backtrace: Backtrace::generate(),
        }
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip() {
        for v in [-1, 0, 1, 127, 128, 16383, 16384, i32::MAX] {
            let encoded = encode_varint(v);
            let (decoded, consumed) = read_varint_bytes(&encoded, 0).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn minus_one_is_five_ff_bytes() {
        assert_eq!(encode_varint(-1), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn six_continuation_bytes_is_an_error() {
        let overlong = [0xFFu8, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        let err = read_varint_bytes(&overlong, 0).unwrap_err();
        assert!(matches!(err, WireError::VarIntTooLong { .. }));
    }

    #[tokio::test]
    async fn framing_truncation_errors_or_times_out() {
        use std::io::Cursor;
        // truncated varint (only continuation bytes, stream ends)
        let mut cursor = Cursor::new(vec![0xFFu8, 0xFF]);
        let result = read_varint_stream(&mut cursor, std::time::Duration::from_millis(50)).await;
        assert!(result.is_err());
    }
}
