//! Length-prefixed string encoding (spec §4.1): `VarInt(len_bytes) ++ utf8(s)`.
//! Length is a byte count, not a codepoint count.

use snafu::{OptionExt, ResultExt};

use super::varint::{encode_varint, read_varint_bytes, WireError};

pub fn encode_mc_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = encode_varint(bytes.len() as i32);
    out.extend_from_slice(bytes);
    out
}

/// Decodes a length-prefixed string starting at `offset`, returning
/// `(string, bytes_consumed)`.
pub fn read_mc_string(buf: &[u8], offset: usize) -> Result<(String, usize), WireError> {
    use super::varint::{InvalidLengthSnafu, VarIntTruncatedSnafu};

    let (len, len_size) = read_varint_bytes(buf, offset)?;
    let len = usize::try_from(len)
        .ok()
        .context(InvalidLengthSnafu { length: len as i64 })?;

    let start = offset + len_size;
    let end = start + len;
    let slice = buf.get(start..end).context(VarIntTruncatedSnafu)?;
    let s = std::str::from_utf8(slice)
        .ok()
        .context(super::varint::InvalidUtf8Snafu)?
        .to_owned();

    Ok((s, len_size + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_roundtrip() {
        let s = "play.example.com";
        let encoded = encode_mc_string(s);
        let (decoded, consumed) = read_mc_string(&encoded, 0).unwrap();
        assert_eq!(decoded, s);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn empty_string_roundtrip() {
        let encoded = encode_mc_string("");
        assert_eq!(encoded, vec![0x00]);
    }
}
