//! Wire codec (spec §4.1): VarInt pack/unpack, length-prefixed framing,
//! string encoding, and the big-endian unsigned short used for ports.

mod frame;
mod string;
mod varint;

pub use frame::{read_packet, write_packet};
pub use string::{encode_mc_string, read_mc_string};
pub use varint::{
    encode_varint, read_varint_bytes, read_varint_stream, WireError, MAX_VARINT_BYTES,
};

/// Big-endian unsigned 16-bit integer, used for ports in the Handshake packet.
pub fn encode_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn read_u16_be(buf: &[u8], offset: usize) -> Result<u16, WireError> {
    use snafu::OptionExt;
    let bytes: [u8; 2] = buf
        .get(offset..offset + 2)
        .context(varint::VarIntTruncatedSnafu)?
        .try_into()
        .expect("slice is exactly 2 bytes");
    Ok(u16::from_be_bytes(bytes))
}
