//! Java Edition prober (spec §4.3), built on [`crate::wire`] the way the
//! teacher's `SlpProtocol` is built on `mc_varint`/`bytes`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::Deserialize;
use snafu::{Backtrace, GenerateImplicitData, ResultExt, Snafu};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, instrument, trace};

use crate::cache::StatusCacheKey;
use crate::context::ProbeContext;
use crate::model::{
    now_unix, Kind, ModEntry, PlayerSample, Players, ProbeResult, SrvInfo, VersionInfo,
};
use crate::motd::Motd;
use crate::resolve::resolve;
use crate::wire::{encode_mc_string, encode_u16_be, encode_varint, read_packet, write_packet, WireError};

pub const HANDSHAKE_PACKET_ID: i32 = 0x00;
pub const STATUS_REQUEST_PACKET_ID: i32 = 0x00;
pub const STATUS_RESPONSE_PACKET_ID: i32 = 0x00;
/// `next_state = 1` selects the status sub-protocol.
pub const NEXT_STATE_STATUS: i32 = 1;
/// `next_state = 2` selects the login sub-protocol.
pub const NEXT_STATE_LOGIN: i32 = 2;
/// Probe version used for the handshake when the caller has no negotiated
/// protocol number: real clients send `-1` for a status-only ping.
pub const PROBE_PROTOCOL_VERSION: i32 = -1;

#[derive(Snafu, Debug)]
pub enum JavaProbeError {
    #[snafu(display("dns lookup failed for {host}"))]
    DnsLookupFailed { host: String, backtrace: Backtrace },
    #[snafu(display("connect timed out"))]
    ConnectTimeout { backtrace: Backtrace },
    #[snafu(display("connect failed: {source}"))]
    ConnectFailed {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("framing error: {source}"), context(false))]
    Framing { source: WireError },
    #[snafu(display("unexpected response packet id {id:#x}"))]
    UnexpectedPacketId { id: i32, backtrace: Backtrace },
    #[snafu(display("failed to decode status json: {source}"))]
    JsonDecode {
        source: serde_json::Error,
        backtrace: Backtrace,
    },
}

/// Builds the Handshake packet body (spec §4.1, §4.3 step 3). The host
/// carried is the *original* (pre-SRV) host, matching real clients.
pub fn build_handshake_payload(protocol: i32, host: &str, port: u16, next_state: i32) -> Vec<u8> {
    let mut payload = encode_varint(protocol);
    payload.extend_from_slice(&encode_mc_string(host));
    payload.extend_from_slice(&encode_u16_be(port));
    payload.extend_from_slice(&encode_varint(next_state));
    payload
}

#[derive(Deserialize, Debug)]
struct StatusJson {
    version: Option<StatusVersion>,
    players: Option<StatusPlayers>,
    #[serde(default)]
    description: Motd,
    #[serde(rename = "modinfo")]
    mod_info: Option<StatusModInfo>,
    #[serde(default)]
    fml: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct StatusVersion {
    name: String,
    protocol: i64,
}

#[derive(Deserialize, Debug)]
struct StatusPlayers {
    online: u32,
    max: u32,
    #[serde(default)]
    sample: Vec<StatusPlayerSample>,
}

#[derive(Deserialize, Debug)]
struct StatusPlayerSample {
    name: Option<String>,
    id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StatusModInfo {
    #[serde(rename = "type", default)]
    loader_type: String,
    #[serde(rename = "modList", default)]
    mod_list: Vec<StatusModEntry>,
}

#[derive(Deserialize, Debug)]
struct StatusModEntry {
    modid: String,
    version: String,
}

/// Attempts a single recovery when the body isn't valid JSON: Forge servers
/// occasionally append data after the real JSON object, so we truncate
/// after the first `}{` boundary (spec §4.3 step 6).
fn parse_status_json(body: &str) -> Result<StatusJson, JavaProbeError> {
    match serde_json::from_str::<StatusJson>(body) {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => {
            if let Some(boundary) = body.find("}{") {
                let truncated = &body[..=boundary];
                if let Ok(parsed) = serde_json::from_str::<StatusJson>(truncated) {
                    return Ok(parsed);
                }
            }
            Err(JavaProbeError::JsonDecode {
                source: first_err,
                backtrace: Backtrace::generate(),
            })
        }
    }
}

fn normalize_status(json: StatusJson, query_ms: u64, connect_ms: u64) -> ProbeResult {
    let forge = json
        .mod_info
        .as_ref()
        .map(|m| m.loader_type.eq_ignore_ascii_case("forge") || m.loader_type.eq_ignore_ascii_case("fml"))
        .unwrap_or(false)
        || json.fml.is_some();

    let mods = json.mod_info.as_ref().and_then(|m| {
        if m.mod_list.is_empty() {
            None
        } else {
            Some(
                m.mod_list
                    .iter()
                    .map(|e| ModEntry {
                        modid: e.modid.clone(),
                        version: e.version.clone(),
                    })
                    .collect(),
            )
        }
    });

    ProbeResult {
        kind: Kind::Java,
        query_ms,
        connect_ms,
        timestamp: now_unix(),
        error: None,
        version: json.version.map(|v| VersionInfo {
            name: v.name,
            protocol: v.protocol,
        }),
        players: json.players.map(|p| Players {
            online: p.online,
            max: p.max,
            sample: p
                .sample
                .into_iter()
                .map(|s| PlayerSample {
                    name: s.name.unwrap_or_else(|| "Anonymous Player".to_string()),
                    id: s.id,
                })
                .collect(),
        }),
        motd: Some(json.description.render_plain()),
        forge,
        mods,
        bedrock: None,
        srv_info: None,
        srv_fallback: false,
    }
}

/// Performs the raw status handshake against an already-resolved socket
/// address, sending `handshake_host`/`handshake_port` in the Handshake
/// packet body (spec §4.3 steps 2-7).
#[instrument(skip(timeout))]
async fn fetch_status(
    addr: SocketAddr,
    handshake_host: &str,
    handshake_port: u16,
    timeout: Duration,
) -> Result<(ProbeResult, u64), JavaProbeError> {
    let connect_start = Instant::now();
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| JavaProbeError::ConnectTimeout {
            backtrace: Backtrace::generate(),
        })?
        .context(ConnectFailedSnafu)?;
    let connect_ms = connect_start.elapsed().as_millis() as u64;
    trace!("connected to {addr} in {connect_ms}ms");

    let handshake_payload = build_handshake_payload(
        PROBE_PROTOCOL_VERSION,
        handshake_host,
        handshake_port,
        NEXT_STATE_STATUS,
    );
    write_packet(&mut stream, HANDSHAKE_PACKET_ID, &handshake_payload).await?;
    write_packet(&mut stream, STATUS_REQUEST_PACKET_ID, &[]).await?;

    let query_start = Instant::now();
    let (id, body) = read_packet(&mut stream, timeout).await?;
    if id != STATUS_RESPONSE_PACKET_ID {
        return UnexpectedPacketIdSnafu { id }.fail();
    }

    let (json_str, _) = crate::wire::read_mc_string(&body, 0)?;
    let json = parse_status_json(&json_str)?;
    let query_ms = query_start.elapsed().as_millis() as u64 + connect_ms;

    Ok((normalize_status(json, query_ms, connect_ms), connect_ms))
}

/// Resolves `host`/`port`, probes Java status, normalizes the response, and
/// on total failure after SRV resolution retries once against the original
/// endpoint (spec §4.3's fallback rule, `srv_fallback=true` on success).
///
/// When `use_cache` is true, consults/populates `ctx.status_cache` keyed by
/// the resolved endpoint (spec §4.6, Testable Property 6); a hit overlays
/// the live `srv_info` derived from *this* call's resolution rather than
/// the cached copy's, since SRV resolution isn't itself part of the cached
/// value. The monitor sampler always passes `use_cache=false` (spec §4.8:
/// "Probe (cache-disabled)").
#[instrument(skip(timeout, ctx))]
pub async fn probe(
    host: &str,
    port: u16,
    timeout: Duration,
    ctx: &ProbeContext,
    use_cache: bool,
) -> ProbeResult {
    let resolved = resolve(host, port, Kind::Java, &ctx.srv_cache).await;

    let cache_key: StatusCacheKey = (
        resolved.resolved.host.clone(),
        resolved.resolved.port,
        Kind::Java,
    );
    if use_cache {
        if let Some(mut cached) = ctx.status_cache.get(&cache_key) {
            trace!(
                "status cache hit for {}:{}",
                resolved.resolved.host,
                resolved.resolved.port
            );
            cached.srv_info = resolved.used_srv.then(|| SrvInfo {
                original_host: resolved.original.host.clone(),
                original_port: resolved.original.port,
                resolved_host: resolved.resolved.host.clone(),
                resolved_port: resolved.resolved.port,
            });
            cached.srv_fallback = false;
            return cached;
        }
    }

    let addr = match lookup_host((resolved.resolved.host.as_str(), resolved.resolved.port))
        .await
        .ok()
        .and_then(|mut iter| iter.next())
    {
        Some(addr) => addr,
        None => {
            return ProbeResult::failure(
                Kind::Java,
                0,
                format!("dns lookup failed for {}", resolved.resolved.host),
            )
        }
    };

    let result = fetch_status(addr, host, port, timeout).await;

    let probe_result = match result {
        Ok((mut probe, _connect_ms)) => {
            if resolved.used_srv {
                probe.srv_info = Some(SrvInfo {
                    original_host: resolved.original.host.clone(),
                    original_port: resolved.original.port,
                    resolved_host: resolved.resolved.host.clone(),
                    resolved_port: resolved.resolved.port,
                });
            }
            probe
        }
        Err(e) if resolved.used_srv => {
            debug!("resolve-assisted probe failed ({e}), retrying against original endpoint");
            let original_addr = match lookup_host((host, port)).await.ok().and_then(|mut i| i.next()) {
                Some(addr) => addr,
                None => return ProbeResult::failure(Kind::Java, 0, e.to_string()),
            };

            match fetch_status(original_addr, host, port, timeout).await {
                Ok((mut probe, _)) => {
                    probe.srv_fallback = true;
                    probe
                }
                Err(fallback_err) => ProbeResult::failure(Kind::Java, 0, fallback_err.to_string()),
            }
        }
        Err(e) => ProbeResult::failure(Kind::Java, 0, e.to_string()),
    };

    if use_cache && probe_result.is_success() {
        ctx.status_cache.put(cache_key, probe_result.clone());
    }

    probe_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_handshake_literal_matches_fixture() {
        // host="example.com", port=25565, version=-1, next_state=1
        let payload = build_handshake_payload(-1, "example.com", 25565, 1);

        let mut expected = encode_varint(-1);
        expected.extend_from_slice(&encode_mc_string("example.com"));
        expected.extend_from_slice(&25565u16.to_be_bytes());
        expected.extend_from_slice(&encode_varint(1));

        assert_eq!(payload, expected);
        // byte-for-byte literal check
        assert_eq!(
            payload,
            vec![
                0xFF, 0xFF, 0xFF, 0xFF, 0x0F, // -1 as varint
                0x0B, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm', // "example.com"
                0x63, 0xDD, // 25565 big-endian u16
                0x01, // next_state = 1
            ]
        );
    }

    #[test]
    fn status_json_parses_online_server() {
        let body = r#"{"version":{"name":"1.20.1","protocol":763},"players":{"online":2,"max":20,"sample":[{"name":"Alice","id":"x"}]},"description":"Hi"}"#;
        let json = parse_status_json(body).unwrap();
        let result = normalize_status(json, 10, 5);
        assert_eq!(result.version.unwrap().name, "1.20.1");
        assert_eq!(result.players.as_ref().unwrap().online, 2);
        assert_eq!(result.motd.as_deref(), Some("Hi"));
        assert!(!result.forge);
    }

    #[test]
    fn status_json_detects_forge_mods() {
        let body = r#"{"version":{"name":"1.20.1","protocol":763},"players":{"online":0,"max":20},"description":"Hi","modinfo":{"type":"FML","modList":[{"modid":"jei","version":"11.2"}]}}"#;
        let json = parse_status_json(body).unwrap();
        let result = normalize_status(json, 10, 5);
        assert!(result.forge);
        assert_eq!(result.mods.unwrap()[0].modid, "jei");
    }

    #[test]
    fn forge_trailing_garbage_recovers() {
        let body = r#"{"version":{"name":"1.20.1","protocol":763},"players":{"online":0,"max":20},"description":"Hi"}{"garbage":true}"#;
        let json = parse_status_json(body).unwrap();
        assert_eq!(json.version.unwrap().name, "1.20.1");
    }

    #[tokio::test]
    async fn status_cache_hit_returns_verbatim_without_probing() {
        use crate::config::Config;

        let ctx = ProbeContext::new(Config::default());
        let cached = ProbeResult {
            kind: Kind::Java,
            query_ms: 42,
            connect_ms: 10,
            timestamp: now_unix(),
            error: None,
            version: Some(VersionInfo { name: "1.20.1".into(), protocol: 763 }),
            players: None,
            motd: Some("cached".into()),
            forge: false,
            mods: None,
            bedrock: None,
            srv_info: None,
            srv_fallback: false,
        };
        ctx.status_cache.put(
            ("example.invalid".to_string(), 25565, Kind::Java),
            cached.clone(),
        );

        let result = probe(
            "example.invalid",
            25565,
            Duration::from_millis(50),
            &ctx,
            true,
        )
        .await;

        assert_eq!(result.query_ms, cached.query_ms);
        assert_eq!(result.motd, cached.motd);
    }

    #[tokio::test]
    async fn bypassing_cache_ignores_a_seeded_entry() {
        use crate::config::Config;

        let ctx = ProbeContext::new(Config::default());
        ctx.status_cache.put(
            ("127.0.0.1".to_string(), 1, Kind::Java),
            ProbeResult {
                kind: Kind::Java,
                query_ms: 42,
                connect_ms: 10,
                timestamp: now_unix(),
                error: None,
                version: None,
                players: None,
                motd: None,
                forge: false,
                mods: None,
                bedrock: None,
                srv_info: None,
                srv_fallback: false,
            },
        );

        let result = probe("127.0.0.1", 1, Duration::from_millis(50), &ctx, false).await;
        // Port 1 won't speak the protocol; a real (uncached) attempt fails
        // rather than returning the seeded cache entry's query_ms.
        assert_ne!(result.query_ms, 42);
    }
}
