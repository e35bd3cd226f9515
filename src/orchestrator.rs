//! Query orchestrator (spec §4.7): concurrent fan-out over many endpoints,
//! and the two port-scanning modes, grounded on the fan-out shape used
//! throughout the pack (e.g. `lan-scan-rs`'s worker-pool port sweep) layered
//! on top of [`crate::java`]/[`crate::bedrock`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::context::ProbeContext;
use crate::model::{Endpoint, Kind, ProbeResult};

/// Shared probe context handle used across spawned fan-out tasks.
pub type SharedContext = Arc<ProbeContext>;

/// Hard ceiling on how long a fan-out batch is allowed to run, regardless of
/// individual per-probe timeouts (spec §4.7).
pub const TOTAL_WAIT_CAP: Duration = Duration::from_secs(15);

/// Default concurrency ceiling for a full 1-65535 port sweep.
pub const DEFAULT_SWEEP_WORKERS: usize = 50;

/// The well-known ports a "common ports" scan tries, in order.
pub const COMMON_PORTS: &[u16] = &[25565, 25566, 25567, 19132, 19133, 25575, 25560, 25570];

/// Probes `host` as Java first, then Bedrock, returning the first success
/// (grounded on `server_info.py`'s `MinecraftQuery.detect_server_type`). If
/// neither succeeds, returns the Java failure (arbitrary but deterministic).
#[instrument(skip(timeout, ctx))]
pub async fn probe_auto(host: &str, port: u16, timeout: Duration, ctx: &ProbeContext, use_cache: bool) -> ProbeResult {
    let java_result = crate::java::probe(host, port, timeout, ctx, use_cache).await;
    if java_result.is_success() {
        return java_result;
    }

    let bedrock_port = if port == Kind::Java.default_port() {
        Kind::Bedrock.default_port()
    } else {
        port
    };
    let bedrock_result = crate::bedrock::probe(host, bedrock_port, timeout, ctx, use_cache).await;
    if bedrock_result.is_success() {
        return bedrock_result;
    }

    java_result
}

/// Probes `host`/`port` as Java and, when the server advertises Forge/FML
/// without a populated `modinfo.modList` (some modded servers omit it),
/// augments the result from the persistent mod cache, falling back to the
/// active login-phase discovery dialog (spec §4.5/§4.6). This is how
/// `forge::discover_mods` and `ModCacheStore` reach a real call path, opt-in
/// via `chat_username` being requested by the caller.
#[instrument(skip(timeout, ctx, chat_username))]
pub async fn probe_java_with_mods(
    host: &str,
    port: u16,
    timeout: Duration,
    ctx: &ProbeContext,
    use_cache: bool,
    chat_username: &str,
) -> ProbeResult {
    let mut result = crate::java::probe(host, port, timeout, ctx, use_cache).await;

    if result.is_success() && result.forge && result.mods.is_none() {
        if let Some(cached_mods) = ctx.mod_cache.get(host, port) {
            trace!("using persisted mod cache for {host}:{port}");
            result.mods = Some(cached_mods);
        } else {
            match crate::forge::discover_mods(host, port, chat_username, timeout, None).await {
                Ok(mods) if !mods.is_empty() => {
                    if let Err(e) = ctx.mod_cache.put(host, port, &mods) {
                        warn!("failed to persist mod cache for {host}:{port}: {e}");
                    }
                    result.mods = Some(mods);
                }
                Ok(_) => {}
                Err(e) => debug!("forge mod discovery failed for {host}:{port}: {e}"),
            }
        }
    }

    result
}

/// One endpoint's fan-out outcome.
#[derive(Debug, Clone)]
pub struct FanOutResult {
    pub endpoint: Endpoint,
    pub result: ProbeResult,
}

/// Probes every `endpoint` concurrently, bounded by `concurrency`. In-flight
/// probes are canceled either when [`TOTAL_WAIT_CAP`] elapses or when the
/// caller-supplied `cancel` token fires (e.g. from a Ctrl-C handler), per
/// spec §4.7/§5's "process-wide cancel flag" semantics expressed as a scoped
/// token rather than a global. `mod_discovery_username`, when `Some`, turns
/// on active Forge mod discovery for Java endpoints in this batch.
#[instrument(skip(endpoints, ctx, cancel, mod_discovery_username))]
pub async fn fan_out(
    endpoints: Vec<Endpoint>,
    per_probe_timeout: Duration,
    concurrency: usize,
    ctx: SharedContext,
    cancel: CancellationToken,
    mod_discovery_username: Option<String>,
) -> Vec<FanOutResult> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for endpoint in endpoints {
        let permit_semaphore = semaphore.clone();
        let child_token = cancel.child_token();
        let ctx = ctx.clone();
        let mod_username = mod_discovery_username.clone();

        tasks.spawn(async move {
            let _permit = permit_semaphore.acquire_owned().await.ok();
            let probe = async {
                match endpoint.kind {
                    Kind::Java => match &mod_username {
                        Some(username) => {
                            probe_java_with_mods(&endpoint.host, endpoint.port, per_probe_timeout, &ctx, true, username).await
                        }
                        None => crate::java::probe(&endpoint.host, endpoint.port, per_probe_timeout, &ctx, true).await,
                    },
                    Kind::Bedrock => crate::bedrock::probe(&endpoint.host, endpoint.port, per_probe_timeout, &ctx, true).await,
                    Kind::Unknown => probe_auto(&endpoint.host, endpoint.port, per_probe_timeout, &ctx, true).await,
                }
            };

            tokio::select! {
                result = probe => FanOutResult { endpoint, result },
                _ = child_token.cancelled() => FanOutResult {
                    result: ProbeResult::failure(endpoint.kind, 0, "canceled"),
                    endpoint,
                },
            }
        });
    }

    let deadline = tokio::time::sleep(TOTAL_WAIT_CAP);
    tokio::pin!(deadline);

    let mut results = Vec::new();
    loop {
        tokio::select! {
            next = tasks.join_next(), if !tasks.is_empty() => {
                match next {
                    Some(Ok(result)) => results.push(result),
                    Some(Err(e)) => debug!("fan-out task panicked: {e}"),
                    None => break,
                }
            }
            _ = &mut deadline => {
                debug!("fan-out total wait cap reached, canceling remaining probes");
                cancel.cancel();
                while let Some(next) = tasks.join_next().await {
                    if let Ok(result) = next {
                        results.push(result);
                    }
                }
                break;
            }
        }
    }

    results
}

/// Port-scan mode: a short, ordered list of commonly used Minecraft ports.
/// Checks `cancel` between ports so Ctrl-C stops the scan promptly.
#[instrument(skip(ctx, cancel))]
pub async fn scan_common_ports(host: &str, timeout: Duration, ctx: SharedContext, cancel: CancellationToken) -> Vec<FanOutResult> {
    let mut results = Vec::with_capacity(COMMON_PORTS.len());
    for &port in COMMON_PORTS {
        if cancel.is_cancelled() {
            debug!("common-port scan canceled before {host}:{port}");
            break;
        }
        let result = probe_auto(host, port, timeout, &ctx, true).await;
        let open = result.is_success();
        results.push(FanOutResult {
            endpoint: Endpoint::new(host, port, result.kind),
            result,
        });
        if open {
            trace!("common-port scan hit on {host}:{port}");
        }
    }
    results
}

#[derive(Debug, Clone, Copy)]
pub struct SweepProgress {
    pub scanned: u32,
    pub total: u32,
}

/// Port-scan mode: a full 1-65535 sweep using a bounded worker pool that
/// claims ports from a shared atomic counter (a lock-free producer-consumer
/// queue over a contiguous range), with progress reported at most at 10 Hz
/// through `progress_tx` (spec §4.7, §9 Design Notes). `cancel` stops every
/// worker promptly, racing it against each in-flight probe.
#[instrument(skip(ctx, cancel, progress_tx))]
pub async fn scan_full_sweep(
    host: String,
    timeout: Duration,
    workers: usize,
    ctx: SharedContext,
    cancel: CancellationToken,
    progress_tx: Option<mpsc::UnboundedSender<SweepProgress>>,
) -> Vec<FanOutResult> {
    let workers = workers.max(1).min(DEFAULT_SWEEP_WORKERS * 4);
    let next_port = Arc::new(AtomicU32::new(1));
    let scanned = Arc::new(AtomicU32::new(0));
    let total: u32 = u16::MAX as u32;

    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let mut worker_set = JoinSet::new();

    for _ in 0..workers {
        let host = host.clone();
        let ctx = ctx.clone();
        let cancel = cancel.clone();
        let next_port = next_port.clone();
        let scanned = scanned.clone();
        let result_tx = result_tx.clone();

        worker_set.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let port = next_port.fetch_add(1, Ordering::Relaxed);
                if port > total {
                    break;
                }

                let probe = probe_auto(&host, port as u16, timeout, &ctx, true);
                tokio::select! {
                    result = probe => {
                        scanned.fetch_add(1, Ordering::Relaxed);
                        let outcome = FanOutResult {
                            endpoint: Endpoint::new(host.clone(), port as u16, result.kind),
                            result,
                        };
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }
    drop(result_tx);

    let mut results = Vec::new();
    let mut report_interval = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            maybe = result_rx.recv() => {
                match maybe {
                    Some(outcome) => {
                        if outcome.result.is_success() {
                            results.push(outcome);
                        }
                    }
                    None => break,
                }
            }
            _ = report_interval.tick() => {
                if let Some(tx) = &progress_tx {
                    let _ = tx.send(SweepProgress {
                        scanned: scanned.load(Ordering::Relaxed),
                        total,
                    });
                }
            }
        }
    }

    while worker_set.join_next().await.is_some() {}
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_ctx() -> Arc<ProbeContext> {
        Arc::new(ProbeContext::new(Config::default()))
    }

    #[tokio::test]
    async fn probe_auto_falls_back_to_bedrock_when_java_fails() {
        let ctx = test_ctx();
        // Port 1 is unlikely to accept TCP or reply on UDP in a test
        // sandbox, so both probes should fail fast; this only checks that
        // `probe_auto` doesn't panic and returns a failed result.
        let result = probe_auto("127.0.0.1", 1, Duration::from_millis(50), &ctx, false).await;
        assert!(!result.is_success());
    }

    #[test]
    fn common_ports_include_both_editions_defaults() {
        assert!(COMMON_PORTS.contains(&25565));
        assert!(COMMON_PORTS.contains(&19132));
    }

    #[tokio::test]
    async fn cancellation_within_timeout_plus_one() {
        let ctx = test_ctx();
        let per_probe_timeout = Duration::from_secs(10);
        let cancel = CancellationToken::new();

        // TEST-NET-1 (RFC 5737): reserved, non-routable, safe to use as a
        // connect target that never completes on its own.
        let endpoints = vec![Endpoint::java("192.0.2.1", 25565)];

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        let start = std::time::Instant::now();
        let results = fan_out(endpoints, per_probe_timeout, 4, ctx, cancel, None).await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 1);
        assert!(
            elapsed < per_probe_timeout + Duration::from_secs(1),
            "fan_out took {elapsed:?}, expected cancellation well before the per-probe timeout"
        );
    }
}
