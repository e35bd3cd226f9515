//! Bedrock Edition prober (spec §4.4): a single UDP unconnected-ping/pong
//! exchange, grounded on the teacher's `bedrock.rs` (same magic constant,
//! same `;`-delimited field layout) but normalized into the shared
//! [`ProbeResult`] instead of a standalone struct.

use std::time::{Duration, Instant};

use snafu::{Backtrace, GenerateImplicitData, OptionExt, ResultExt, Snafu};
use tokio::net::{lookup_host, UdpSocket};
use tracing::trace;

use crate::cache::StatusCacheKey;
use crate::context::ProbeContext;
use crate::model::{now_unix, BedrockExtras, Kind, Players, ProbeResult, VersionInfo};
use crate::motd::strip_color_codes;

/// https://wiki.vg/Raknet_Protocol#Data_types — sent in our own ping packet
/// but left unverified on the pong we receive back (the offset it occupies
/// there is skipped, not checked against this value, per the Open Questions
/// decision in DESIGN.md).
const MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

const UNCONNECTED_PING_ID: u8 = 0x01;
const UNCONNECTED_PONG_ID: u8 = 0x1c;

#[derive(Snafu, Debug)]
pub enum BedrockProbeError {
    #[snafu(display("dns lookup failed for {host}"))]
    DnsLookupFailed { host: String, backtrace: Backtrace },
    #[snafu(display("failed to open udp socket: {source}"))]
    SocketOpen {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("no response from server"))]
    NoResponse { backtrace: Backtrace },
    #[snafu(display("response was not an unconnected pong"))]
    UnexpectedResponse { backtrace: Backtrace },
    #[snafu(display("pong body was missing required fields"))]
    IncompleteFields { backtrace: Backtrace },
}

fn build_ping_packet(timestamp_ms: u64) -> Vec<u8> {
    let client_guid: u64 = rand::random();
    let mut packet = Vec::with_capacity(1 + 8 + MAGIC.len() + 8);
    packet.push(UNCONNECTED_PING_ID);
    packet.extend_from_slice(&timestamp_ms.to_be_bytes());
    packet.extend_from_slice(&MAGIC);
    packet.extend_from_slice(&client_guid.to_be_bytes());
    packet
}

/// Parses the `;`-delimited info string carried in an unconnected pong body
/// (spec §4.4 step 5, Testable Property 4).
pub fn parse_pong_fields(body: &str) -> Result<ProbeResult, BedrockProbeError> {
    let parts: Vec<&str> = body.split(';').collect();
    if parts.len() < 6 {
        return IncompleteFieldsSnafu.fail();
    }

    let edition = parts[0].to_string();
    let motd_line1 = parts[1].to_string();
    let protocol: i64 = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
    let version = parts.get(3).unwrap_or(&"").to_string();
    let online: u32 = parts.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
    let max: u32 = parts.get(5).and_then(|s| s.parse().ok()).unwrap_or(0);
    let server_id: Option<u64> = parts.get(6).and_then(|s| s.parse().ok());
    let submotd = parts.get(7).map(|s| s.to_string());
    let game_mode = parts.get(8).map(|s| s.to_string());
    let _game_mode_numeric: Option<u64> = parts.get(9).and_then(|s| s.parse().ok());
    let port_ipv4: Option<u16> = parts.get(10).and_then(|s| s.parse().ok());
    let port_ipv6: Option<u16> = parts.get(11).and_then(|s| s.parse().ok());

    let motd = format!(
        "{}\n{}",
        strip_color_codes(&motd_line1),
        strip_color_codes(submotd.as_deref().unwrap_or(""))
    );

    Ok(ProbeResult {
        kind: Kind::Bedrock,
        query_ms: 0,
        connect_ms: 0,
        timestamp: now_unix(),
        error: None,
        version: Some(VersionInfo {
            name: version,
            protocol,
        }),
        players: Some(Players {
            online,
            max,
            sample: Vec::new(),
        }),
        motd: Some(motd),
        forge: false,
        mods: None,
        bedrock: Some(BedrockExtras {
            edition,
            game_mode,
            server_id,
            submotd,
            port_ipv4,
            port_ipv6,
        }),
        srv_info: None,
        srv_fallback: false,
    })
}

/// Sends one unconnected ping, receives one pong, and normalizes the result.
///
/// When `use_cache` is true, consults/populates `ctx.status_cache` keyed by
/// `(host, port, Kind::Bedrock)` (spec §4.6); Bedrock has no SRV step so the
/// key is the endpoint as given. The monitor sampler passes `use_cache=false`.
pub async fn probe(host: &str, port: u16, timeout: Duration, ctx: &ProbeContext, use_cache: bool) -> ProbeResult {
    let cache_key: StatusCacheKey = (host.to_string(), port, Kind::Bedrock);
    if use_cache {
        if let Some(cached) = ctx.status_cache.get(&cache_key) {
            trace!("status cache hit for bedrock {host}:{port}");
            return cached;
        }
    }

    let result = match probe_inner(host, port, timeout).await {
        Ok(result) => result,
        Err(e) => ProbeResult::failure(Kind::Bedrock, 0, e.to_string()),
    };

    if use_cache && result.is_success() {
        ctx.status_cache.put(cache_key, result.clone());
    }

    result
}

async fn probe_inner(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<ProbeResult, BedrockProbeError> {
    let addr = lookup_host((host, port))
        .await
        .ok()
        .and_then(|mut i| i.next())
        .context(DnsLookupFailedSnafu { host })?;

    let socket = UdpSocket::bind("0.0.0.0:0").await.context(SocketOpenSnafu)?;
    socket.connect(addr).await.context(SocketOpenSnafu)?;

    let start = Instant::now();
    let packet = build_ping_packet(now_unix() * 1000);

    let response = match tokio::time::timeout(timeout, async {
        socket.send(&packet).await?;
        let mut buf = vec![0u8; 2048];
        let n = socket.recv(&mut buf).await?;
        buf.truncate(n);
        Ok::<_, std::io::Error>(buf)
    })
    .await
    {
        Ok(Ok(buf)) => buf,
        _ => return NoResponseSnafu.fail(),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;

    if response.first() != Some(&UNCONNECTED_PONG_ID) {
        return UnexpectedResponseSnafu.fail();
    }

    // Skip id(1) + timestamp(8) + server guid(8) + magic(16).
    let body_offset = 1 + 8 + 8 + 16;
    let body_bytes = response.get(body_offset..).unwrap_or_default();
    let body = std::str::from_utf8(body_bytes)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| body_bytes.iter().map(|&b| b as char).collect());

    trace!("bedrock pong body: {body}");
    let mut result = parse_pong_fields(&body)?;
    result.query_ms = elapsed_ms;
    result.connect_ms = elapsed_ms;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bedrock_pong_parses_documented_fixture() {
        let body = "MCPE;Dedicated;630;1.21.0;3;20;12345;World;Survival;1;19132;19133";
        let result = parse_pong_fields(body).unwrap();

        assert_eq!(result.bedrock.as_ref().unwrap().edition, "MCPE");
        assert_eq!(result.players.as_ref().unwrap().online, 3);
        assert_eq!(result.players.as_ref().unwrap().max, 20);
        assert_eq!(result.version.as_ref().unwrap().name, "1.21.0");
        assert_eq!(result.motd.as_deref(), Some("Dedicated\nWorld"));
        assert_eq!(result.bedrock.as_ref().unwrap().port_ipv4, Some(19132));
    }

    #[test]
    fn bedrock_pong_non_numeric_fields_degrade_to_zero() {
        let body = "MCPE;Test;not-a-number;1.21.0;oops;20";
        let result = parse_pong_fields(body).unwrap();
        assert_eq!(result.version.as_ref().unwrap().protocol, 0);
        assert_eq!(result.players.as_ref().unwrap().online, 0);
    }

    #[test]
    fn short_body_is_incomplete() {
        let err = parse_pong_fields("MCPE;Test").unwrap_err();
        assert!(matches!(err, BedrockProbeError::IncompleteFields { .. }));
    }
}
