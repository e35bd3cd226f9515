//! Per-server sampler (spec §4.8): polls a server on an interval, feeds the
//! raw [`ProbeResult`] into the caller's [`ServerRecordView`], and derives
//! [`MonitorEvent`]s from the diff against the previous sample.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace, warn};

use crate::context::ProbeContext;
use crate::model::{Endpoint, EventKind, Kind, MonitorEvent, ProbeResult, ServerRecordView};
use crate::monitor::events::EventSender;
use crate::monitor::persist;
use crate::orchestrator::{probe_auto, probe_java_with_mods};

/// Runs the sample/diff/record loop for one server until `token` is
/// cancelled. `record` is shared with whatever reads the server's current
/// state (e.g. a terminal view).
///
/// Every probe here bypasses the status cache (spec §4.8: "Probe
/// (cache-disabled)") — the sampler always wants a fresh read, never a
/// shallow clone from the last 60s. When `log_dir` is `Some`, every derived
/// event is also appended to today's JSONL log for this server.
#[instrument(skip(record, events, ctx, token, log_dir, last_result))]
#[allow(clippy::too_many_arguments)]
pub async fn run<R>(
    endpoint: Endpoint,
    record: Arc<Mutex<R>>,
    events: EventSender,
    interval: Duration,
    probe_timeout: Duration,
    ctx: Arc<ProbeContext>,
    token: CancellationToken,
    log_dir: Option<PathBuf>,
    last_result: Option<Arc<Mutex<Option<ProbeResult>>>>,
) where
    R: ServerRecordView + Send + 'static,
{
    let mut previous: Option<ProbeResult> = None;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                trace!("sampler for {} canceled", endpoint.host);
                return;
            }
            _ = ticker.tick() => {}
        }

        let result = match endpoint.kind {
            Kind::Java => {
                let username = record
                    .lock()
                    .expect("server record mutex poisoned")
                    .chat_username()
                    .to_string();
                probe_java_with_mods(&endpoint.host, endpoint.port, probe_timeout, &ctx, false, &username).await
            }
            Kind::Bedrock => crate::bedrock::probe(&endpoint.host, endpoint.port, probe_timeout, &ctx, false).await,
            Kind::Unknown => probe_auto(&endpoint.host, endpoint.port, probe_timeout, &ctx, false).await,
        };

        let server_name = {
            let mut record = record.lock().expect("server record mutex poisoned");
            let name = record.name().to_string();
            record.record_probe(&result);
            name
        };

        if let Some(last_result) = &last_result {
            *last_result.lock().expect("last-result mutex poisoned") = Some(result.clone());
        }

        for event in derive_events(&server_name, previous.as_ref(), &result) {
            events.send(event.clone());
            if let Some(dir) = &log_dir {
                if let Err(e) = persist::append_event(dir, &server_name, &event) {
                    warn!("failed to persist monitor event for {server_name}: {e}");
                }
            }
        }

        previous = Some(result);
    }
}

/// Compares `previous` to `current` and returns the events they imply (spec
/// §4.8: status_change, player_count, player_join, player_leave).
pub fn derive_events(server_name: &str, previous: Option<&ProbeResult>, current: &ProbeResult) -> Vec<MonitorEvent> {
    let mut events = Vec::new();

    match previous {
        None => {
            // First sample: only report connectivity, no diffs possible yet.
            let message = if current.is_success() {
                "server is now reachable".to_string()
            } else {
                format!("server is unreachable: {}", current.error.as_deref().unwrap_or("unknown error"))
            };
            events.push(MonitorEvent::new(EventKind::StatusChange, server_name, message));
        }
        Some(prev) => {
            if prev.is_success() != current.is_success() {
                let message = if current.is_success() {
                    "server came back online".to_string()
                } else {
                    format!("server went offline: {}", current.error.as_deref().unwrap_or("unknown error"))
                };
                events.push(MonitorEvent::new(EventKind::StatusChange, server_name, message));
            }

            if let (Some(prev_players), Some(cur_players)) = (&prev.players, &current.players) {
                if prev_players.online != cur_players.online {
                    let diff = cur_players.online as i64 - prev_players.online as i64;
                    events.push(
                        MonitorEvent::new(
                            EventKind::PlayerCount,
                            server_name,
                            format!("player count changed from {} to {}", prev_players.online, cur_players.online),
                        )
                        .with_diff(diff),
                    );
                }
            }

            let prev_names: HashSet<String> = prev.player_names().into_iter().collect();
            let cur_names: HashSet<String> = current.player_names().into_iter().collect();

            for joined in cur_names.difference(&prev_names) {
                events.push(
                    MonitorEvent::new(EventKind::PlayerJoin, server_name, format!("{joined} joined")).with_player(joined.clone()),
                );
            }
            for left in prev_names.difference(&cur_names) {
                events.push(
                    MonitorEvent::new(EventKind::PlayerLeave, server_name, format!("{left} left")).with_player(left.clone()),
                );
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Players, VersionInfo};

    fn success_with_players(names: &[&str]) -> ProbeResult {
        ProbeResult {
            kind: Kind::Java,
            query_ms: 1,
            connect_ms: 1,
            timestamp: 0,
            error: None,
            version: Some(VersionInfo { name: "1.20.1".into(), protocol: 763 }),
            players: Some(Players {
                online: names.len() as u32,
                max: 20,
                sample: names
                    .iter()
                    .map(|n| crate::model::PlayerSample { name: n.to_string(), id: None })
                    .collect(),
            }),
            motd: Some("hi".into()),
            forge: false,
            mods: None,
            bedrock: None,
            srv_info: None,
            srv_fallback: false,
        }
    }

    #[test]
    fn first_sample_reports_status_only() {
        let current = success_with_players(&["Alice"]);
        let events = derive_events("srv", None, &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::StatusChange);
    }

    #[test]
    fn player_join_and_leave_are_detected() {
        let prev = success_with_players(&["Alice"]);
        let current = success_with_players(&["Bob"]);
        let events = derive_events("srv", Some(&prev), &current);

        assert!(events.iter().any(|e| e.kind == EventKind::PlayerJoin && e.player_name.as_deref() == Some("Bob")));
        assert!(events.iter().any(|e| e.kind == EventKind::PlayerLeave && e.player_name.as_deref() == Some("Alice")));
    }

    #[test]
    fn player_count_change_without_roster_still_reported() {
        let prev = success_with_players(&["Alice"]);
        let mut current = success_with_players(&["Alice", "Bob"]);
        current.players.as_mut().unwrap().sample.clear();
        let events = derive_events("srv", Some(&prev), &current);
        assert!(events.iter().any(|e| e.kind == EventKind::PlayerCount && e.diff == Some(1)));
    }

    #[test]
    fn going_offline_emits_status_change() {
        let prev = success_with_players(&[]);
        let current = ProbeResult::failure(Kind::Java, 0, "timed out");
        let events = derive_events("srv", Some(&prev), &current);
        assert!(events.iter().any(|e| e.kind == EventKind::StatusChange));
    }
}
