//! Crate-wide error taxonomy (spec §7). Each module defines its own `snafu`
//! enum for the errors it can raise; those convert into [`ObservatoryError`]
//! at the boundaries where callers need one flat type (e.g. `ProbeResult::error`).

use snafu::Snafu;

use crate::bedrock::BedrockProbeError;
use crate::cache::CacheError;
use crate::forge::ForgeError;
use crate::java::JavaProbeError;
use crate::resolve::ResolveError;
use crate::wire::WireError;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum ObservatoryError {
    #[snafu(display("connect timed out"))]
    ConnectTimeout,

    #[snafu(display("read timed out"))]
    ReadTimeout,

    #[snafu(display("framing error: {source}"), context(false))]
    Framing { source: WireError },

    #[snafu(display("decode error: {message}"))]
    Decode { message: String },

    #[snafu(display("dns failure: {source}"), context(false))]
    Dns { source: ResolveError },

    #[snafu(display("canceled"))]
    Canceled,

    #[snafu(display("protocol aborted: {message}"))]
    ProtocolAbort { message: String },

    #[snafu(display("persistence error: {source}"))]
    IoPersist { source: std::io::Error },

    #[snafu(display("java probe failed: {source}"), context(false))]
    Java { source: JavaProbeError },

    #[snafu(display("bedrock probe failed: {source}"), context(false))]
    Bedrock { source: BedrockProbeError },

    #[snafu(display("forge dialog failed: {source}"), context(false))]
    Forge { source: ForgeError },

    #[snafu(display("cache error: {source}"), context(false))]
    Cache { source: CacheError },
}

impl ObservatoryError {
    /// The taxonomy kind as a stable machine-readable tag, matching the
    /// `Kind` column of spec §7's error table.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::ReadTimeout => "read_timeout",
            Self::Framing { .. } => "framing_error",
            Self::Decode { .. } => "decode_error",
            Self::Dns { .. } => "dns_failure",
            Self::Canceled => "canceled",
            Self::ProtocolAbort { .. } => "protocol_abort",
            Self::IoPersist { .. } => "io_persist",
            Self::Java { .. } => "decode_error",
            Self::Bedrock { .. } => "decode_error",
            Self::Forge { .. } => "protocol_abort",
            Self::Cache { .. } => "io_persist",
        }
    }
}

pub type Result<T, E = ObservatoryError> = std::result::Result<T, E>;
