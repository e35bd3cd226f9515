//! Forge/FML login-phase dialog (spec §4.5), grounded on
//! `forge_login_client.py`'s `attempt_forge_handshake`: handshake into the
//! login state, send `LoginStart`, then watch for Disconnect / Encryption
//! Request / Login Success / Set Compression and plugin-message packets.

use std::time::Duration;

use snafu::{Backtrace, GenerateImplicitData, Snafu};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::java::{build_handshake_payload, NEXT_STATE_LOGIN, PROBE_PROTOCOL_VERSION};
use crate::model::ModEntry;
use crate::wire::{encode_mc_string, read_mc_string, read_packet, write_packet, WireError};

const DISCONNECT_ID: i32 = 0x00;
const ENCRYPTION_REQUEST_ID: i32 = 0x01;
const LOGIN_SUCCESS_ID: i32 = 0x02;
const SET_COMPRESSION_ID: i32 = 0x03;

/// Channel names legacy Forge/FML servers have historically used for the
/// mod-list handshake. A conservative implementation (this one) only
/// replies on the channel the server actually used (spec §9 Open
/// Questions); this list remains for recognizing inbound channels.
const KNOWN_FORGE_CHANNELS: &[&str] = &["fml:handshake", "FML|HS", "FORGE", "fml:login"];

#[derive(Snafu, Debug)]
pub enum ForgeError {
    #[snafu(display("connect failed: {source}"))]
    ConnectFailed {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("connect timed out"))]
    ConnectTimeout { backtrace: Backtrace },
    #[snafu(display("framing error: {source}"), context(false))]
    Framing { source: WireError },
    #[snafu(display("server requested encryption; no credentials available"))]
    EncryptionRequired { backtrace: Backtrace },
    #[snafu(display("disconnected by server: {reason}"))]
    Disconnected { reason: String, backtrace: Backtrace },
}

/// Optional hint the caller may supply instead of relying on heuristic
/// extraction from the server's own plugin-message payloads.
pub type ModHint = Vec<ModEntry>;

/// Runs the login-phase dialog against `host`/`port` and returns a
/// deduplicated mod list. Mirrors spec §4.5's packet-id table.
pub async fn discover_mods(
    host: &str,
    port: u16,
    username: &str,
    timeout_duration: Duration,
    mod_hint: Option<&ModHint>,
) -> Result<Vec<ModEntry>, ForgeError> {
    let mut stream = tokio::time::timeout(timeout_duration, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ForgeError::ConnectTimeout {
            backtrace: Backtrace::generate(),
        })?
        .map_err(|source| ForgeError::ConnectFailed {
            source,
            backtrace: Backtrace::generate(),
        })?;

    let handshake_payload =
        build_handshake_payload(PROBE_PROTOCOL_VERSION, host, port, NEXT_STATE_LOGIN);
    write_packet(&mut stream, 0x00, &handshake_payload).await?;
    write_packet(&mut stream, 0x00, &encode_mc_string(username)).await?;

    let mut mods = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut compression_threshold: Option<i64> = None;

    loop {
        let (id, payload) = match read_packet(&mut stream, timeout_duration).await {
            Ok(pair) => pair,
            Err(_) => break,
        };
        trace!("login-phase packet id={id:#x} len={}", payload.len());

        match id {
            DISCONNECT_ID => {
                let reason = read_mc_string(&payload, 0)
                    .map(|(s, _)| s)
                    .unwrap_or_else(|_| "<unreadable>".to_string());
                debug!("server disconnected during forge dialog: {reason}");
                break;
            }
            ENCRYPTION_REQUEST_ID => {
                return EncryptionRequiredSnafu.fail();
            }
            LOGIN_SUCCESS_ID => {
                debug!("login succeeded during forge dialog");
                break;
            }
            SET_COMPRESSION_ID => {
                if let Ok((threshold, _)) = crate::wire::read_varint_bytes(&payload, 0) {
                    compression_threshold = Some(threshold as i64);
                    trace!("compression threshold set to {threshold}");
                }
            }
            _ => {
                if let Some((channel, data)) = parse_plugin_message(&payload) {
                    let lower = channel.to_lowercase();
                    if lower.contains("fml") || lower.contains("forge") || lower.contains("mod") {
                        for (modid, version) in extract_mod_tokens(mod_hint, data) {
                            if seen.insert(modid.clone()) {
                                mods.push(ModEntry { modid, version });
                            }
                        }

                        // Conservative reply policy (spec §9 Open Questions): answer
                        // only on the channel the server itself used, not a
                        // broadcast across every known Forge/FML channel name.
                        if let Some(hint) = mod_hint {
                            if let Ok(reply) = serde_json::to_vec(
                                &hint
                                    .iter()
                                    .map(|m| serde_json::json!({"id": m.modid, "version": m.version}))
                                    .collect::<Vec<_>>(),
                            ) {
                                let mut reply_payload = encode_mc_string(&channel);
                                reply_payload.extend_from_slice(&reply);
                                if write_packet(&mut stream, id, &reply_payload).await.is_err() {
                                    warn!("failed to send mod-list reply on channel {channel}");
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    let _ = compression_threshold; // recorded for future zlib-framed reads, not needed once the dialog ends
    Ok(mods)
}

/// Heuristic parser for a Login plugin message:
/// `[channelLength VarInt][channelBytes][remaining data bytes]`.
fn parse_plugin_message(payload: &[u8]) -> Option<(String, &[u8])> {
    let (channel, consumed) = read_mc_string(payload, 0).ok()?;
    Some((channel, &payload[consumed..]))
}

/// Extracts ASCII tokens that look like mod identifiers
/// (`[A-Za-z0-9_\-.]{3,}`, excluding long pure-numeric runs), or uses the
/// caller-supplied hint when present (spec §4.5).
fn extract_mod_tokens(mod_hint: Option<&ModHint>, data: &[u8]) -> Vec<(String, String)> {
    if let Some(hint) = mod_hint {
        return hint.iter().map(|m| (m.modid.clone(), m.version.clone())).collect();
    }

    heuristic_extract_strings(data)
        .into_iter()
        .map(|token| (token, "unknown".to_string()))
        .collect()
}

fn heuristic_extract_strings(data: &[u8]) -> Vec<String> {
    let text: String = data.iter().map(|&b| b as char).collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
            current.push(c);
        } else {
            push_token(&mut tokens, &current);
            current.clear();
        }
    }
    push_token(&mut tokens, &current);
    tokens
}

fn push_token(tokens: &mut Vec<String>, candidate: &str) {
    if candidate.len() < 3 {
        return;
    }
    if candidate.chars().all(|c| c.is_ascii_digit()) {
        return;
    }
    tokens.push(candidate.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_extraction_skips_short_and_numeric_tokens() {
        let data = b"jei 11.2 40 fml forge12345678901234567890";
        let tokens = heuristic_extract_strings(data);
        assert!(tokens.contains(&"jei".to_string()));
        assert!(tokens.contains(&"11.2".to_string()));
        assert!(!tokens.contains(&"40".to_string()));
    }

    #[test]
    fn known_forge_channels_are_recognized_by_name() {
        for channel in KNOWN_FORGE_CHANNELS {
            let lower = channel.to_lowercase();
            assert!(lower.contains("fml") || lower.contains("forge"));
        }
    }

    #[test]
    fn plugin_message_channel_parses() {
        let mut payload = encode_mc_string("fml:handshake");
        payload.extend_from_slice(b"somedata");
        let (channel, data) = parse_plugin_message(&payload).unwrap();
        assert_eq!(channel, "fml:handshake");
        assert_eq!(data, b"somedata");
    }
}
