//! Length-prefixed packet framing (spec §4.1):
//! `VarInt(totalLen) ++ VarInt(packetId) ++ payload`, where `totalLen`
//! covers the id and the payload.

use snafu::{GenerateImplicitData, ResultExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::varint::{
    encode_varint, read_varint_stream, ConnectionClosedSnafu, InvalidLengthSnafu, WireError,
};

/// Writes one framed packet: `id` followed by `payload`.
pub async fn write_packet<W>(writer: &mut W, id: i32, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let id_bytes = encode_varint(id);
    let body_len = id_bytes.len() + payload.len();

    let mut out = Vec::with_capacity(body_len + 5);
    out.extend_from_slice(&encode_varint(body_len as i32));
    out.extend_from_slice(&id_bytes);
    out.extend_from_slice(payload);

    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed packet, returning `(packet_id, payload)`.
///
/// Each read is a cancellation checkpoint: callers that need cooperative
/// cancellation should race this future against their cancellation token.
pub async fn read_packet<R>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<(i32, Vec<u8>), WireError>
where
    R: AsyncRead + Unpin,
{
    let total_len = read_varint_stream(reader, timeout).await?;
    let total_len = usize::try_from(total_len)
        .ok()
        .context(InvalidLengthSnafu {
            length: total_len as i64,
        })?;

    let mut body = vec![0u8; total_len];
    tokio::time::timeout(timeout, reader.read_exact(&mut body))
        .await
        .map_err(|_| WireError::Io {
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"),
            backtrace: snafu::Backtrace::generate(),
        })?
        .context(super::varint::IoSnafu)?;

    let (id, id_size) = super::varint::read_varint_bytes(&body, 0)?;
    if id_size > body.len() {
        return ConnectionClosedSnafu.fail();
    }

    Ok((id, body[id_size..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn frame_roundtrip() {
        let payload = b"hello".to_vec();
        let mut buf = Vec::new();
        write_packet(&mut buf, 0x00, &payload).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let (id, body) = read_packet(&mut cursor, std::time::Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(id, 0x00);
        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn truncated_frame_errors() {
        let payload = b"hello world".to_vec();
        let mut buf = Vec::new();
        write_packet(&mut buf, 0x00, &payload).await.unwrap();
        buf.truncate(buf.len() - 1);

        let mut cursor = Cursor::new(buf);
        let result = read_packet(&mut cursor, std::time::Duration::from_millis(50)).await;
        assert!(result.is_err());
    }
}
