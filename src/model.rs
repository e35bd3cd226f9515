//! Core data model (spec §3).

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::motd::Motd;

/// Default Java Edition port.
pub const DEFAULT_JAVA_PORT: u16 = 25565;
/// Default Bedrock Edition port.
pub const DEFAULT_BEDROCK_PORT: u16 = 19132;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Java,
    Bedrock,
    Unknown,
}

impl Kind {
    pub fn default_port(self) -> u16 {
        match self {
            Kind::Java | Kind::Unknown => DEFAULT_JAVA_PORT,
            Kind::Bedrock => DEFAULT_BEDROCK_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub kind: Kind,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, kind: Kind) -> Self {
        Self {
            host: host.into(),
            port,
            kind,
        }
    }

    pub fn java(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, Kind::Java)
    }

    pub fn bedrock(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, Kind::Bedrock)
    }
}

/// The result of SRV-aware resolution. Invariant: if `used_srv` then
/// `resolved != original`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEndpoint {
    pub original: Endpoint,
    pub resolved: Endpoint,
    pub used_srv: bool,
}

impl ResolvedEndpoint {
    pub fn unresolved(original: Endpoint) -> Self {
        Self {
            resolved: original.clone(),
            original,
            used_srv: false,
        }
    }

    pub fn via_srv(original: Endpoint, resolved: Endpoint) -> Self {
        debug_assert_ne!(
            resolved, original,
            "used_srv=true requires resolved != original"
        );
        Self {
            original,
            resolved,
            used_srv: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvInfo {
    pub original_host: String,
    pub original_port: u16,
    pub resolved_host: String,
    pub resolved_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    pub modid: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub protocol: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSample {
    pub name: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Players {
    pub online: u32,
    pub max: u32,
    #[serde(default)]
    pub sample: Vec<PlayerSample>,
}

/// Bedrock-only fields (spec §3).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BedrockExtras {
    pub edition: String,
    pub game_mode: Option<String>,
    pub server_id: Option<u64>,
    pub submotd: Option<String>,
    pub port_ipv4: Option<u16>,
    pub port_ipv6: Option<u16>,
}

/// Normalized probe outcome, common across Java and Bedrock (spec §3).
///
/// Exactly one of `error` or the success fields is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub kind: Kind,
    pub query_ms: u64,
    pub connect_ms: u64,
    pub timestamp: u64,

    pub error: Option<String>,

    pub version: Option<VersionInfo>,
    pub players: Option<Players>,
    pub motd: Option<String>,
    #[serde(default)]
    pub forge: bool,
    pub mods: Option<Vec<ModEntry>>,
    pub bedrock: Option<BedrockExtras>,

    pub srv_info: Option<SrvInfo>,
    #[serde(default)]
    pub srv_fallback: bool,
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn failure(kind: Kind, connect_ms: u64, error: impl Into<String>) -> Self {
        Self {
            kind,
            query_ms: connect_ms,
            connect_ms,
            timestamp: now_unix(),
            error: Some(error.into()),
            version: None,
            players: None,
            motd: None,
            forge: false,
            mods: None,
            bedrock: None,
            srv_info: None,
            srv_fallback: false,
        }
    }

    /// Names of players in the sample, after color-stripping — used for
    /// join/leave set-difference in the monitor (spec §4.8, property 7).
    pub fn player_names(&self) -> Vec<String> {
        self.players
            .as_ref()
            .map(|p| {
                p.sample
                    .iter()
                    .map(|s| crate::motd::strip_color_codes(&s.name))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Fixed-capacity circular buffer used for `query_history`/`player_history`
/// (spec §3, §9: "Ring buffers... fixed-capacity circular buffers, 10 entries").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.iter().cloned().collect()
    }

    pub fn from_vec(capacity: usize, items: Vec<T>) -> Self {
        let mut ring = Self::new(capacity);
        for item in items {
            ring.push(item);
        }
        ring
    }
}

pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySample {
    pub timestamp: u64,
    pub query_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSample2 {
    pub timestamp: u64,
    pub online: u32,
    pub max: u32,
}

/// Fields the core reads/writes on a server record. The record itself is
/// collaborator-owned (spec §3); `ServerRecordView` lets the core operate on
/// whatever concrete type the collaborator uses, while [`ServerRecord`]
/// below is a ready-made implementation for standalone use and tests.
pub trait ServerRecordView {
    fn name(&self) -> &str;
    fn endpoint(&self) -> Endpoint;
    fn record_probe(&mut self, result: &ProbeResult);

    /// Username sent during the Forge/FML login-phase mod-discovery dialog
    /// (spec §4.5). Collaborators that never request mod discovery can
    /// ignore this default.
    fn chat_username(&self) -> &str {
        "mc-observatory"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub kind: Kind,
    pub note: String,

    pub last_query: Option<u64>,
    pub query_history: RingBuffer<QuerySample>,
    pub player_history: RingBuffer<PlayerSample2>,
    pub mod_list: Vec<ModEntry>,
    #[serde(default)]
    pub chat_username: String,
}

impl ServerRecord {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, port: u16, kind: Kind) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            port,
            kind,
            note: String::new(),
            last_query: None,
            query_history: RingBuffer::new(HISTORY_CAPACITY),
            player_history: RingBuffer::new(HISTORY_CAPACITY),
            mod_list: Vec::new(),
            chat_username: String::new(),
        }
    }
}

impl ServerRecordView for ServerRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.ip.clone(), self.port, self.kind)
    }

    fn record_probe(&mut self, result: &ProbeResult) {
        self.last_query = Some(result.timestamp);
        self.query_history.push(QuerySample {
            timestamp: result.timestamp,
            query_ms: result.query_ms,
        });
        if let Some(players) = &result.players {
            self.player_history.push(PlayerSample2 {
                timestamp: result.timestamp,
                online: players.online,
                max: players.max,
            });
        }
        if result.kind == Kind::Java && result.forge {
            if let Some(mods) = &result.mods {
                self.mod_list = mods.clone();
            }
        }
    }

    fn chat_username(&self) -> &str {
        if self.chat_username.is_empty() {
            "mc-observatory"
        } else {
            &self.chat_username
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChange,
    PlayerJoin,
    PlayerLeave,
    PlayerCount,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub kind: EventKind,
    pub message: String,
    pub timestamp: u64,
    pub server_name: String,
    pub player_name: Option<String>,
    pub diff: Option<i64>,
}

impl MonitorEvent {
    pub fn new(kind: EventKind, server_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: now_unix(),
            server_name: server_name.into(),
            player_name: None,
            diff: None,
        }
    }

    pub fn with_player(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    pub fn with_diff(mut self, diff: i64) -> Self {
        self.diff = Some(diff);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_caps_at_capacity() {
        let mut ring = RingBuffer::new(10);
        for i in 0..15 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 10);
        assert_eq!(ring.to_vec(), (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn resolved_endpoint_invariant_when_not_srv() {
        let ep = Endpoint::java("example.com", 25565);
        let resolved = ResolvedEndpoint::unresolved(ep.clone());
        assert!(!resolved.used_srv);
        assert_eq!(resolved.original, resolved.resolved);
    }
}
