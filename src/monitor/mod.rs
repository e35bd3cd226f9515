//! Monitor engine (spec §4.8): per-server sampling, event derivation, event
//! streaming, and JSONL persistence, composed behind a small
//! `created -> running -> pager_open -> stopped` state machine.

pub mod events;
pub mod persist;
pub mod sampler;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::ProbeContext;
use crate::model::{Endpoint, ProbeResult, ServerRecordView};

pub use events::{EventSender, EventStream};
pub use sampler::derive_events;

/// Monitor lifecycle state (spec §4.8):
///
/// ```text
///   [created] --start--> [running] --pause_display--> [pager_open]
///                             |                              |
///                             +-------resume<----------------+
///                             |
///                             +--stop--> [stopped]
/// ```
///
/// The sampler keeps running across `running`/`pager_open` — only `stop`
/// tears it down, and only the UI layer drives `pause_display`/`resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Created,
    Running,
    PagerOpen,
    Stopped,
}

/// Where a monitor's events are persisted, and how many log files to keep
/// (spec §4.8 Persistence; retention is swept once, at `start`).
pub struct LogTarget {
    pub dir: PathBuf,
    pub retention_count: usize,
}

/// Composes the sampler task, event stream, and persistence for one
/// monitored server, and tracks the state machine above. `R` is whatever
/// concrete record type the collaborator uses (see [`ServerRecordView`]).
pub struct Monitor<R>
where
    R: ServerRecordView + Send + 'static,
{
    state: MonitorState,
    endpoint: Endpoint,
    record: Arc<Mutex<R>>,
    events: EventStream,
    last_result: Arc<Mutex<Option<ProbeResult>>>,
    interval: Duration,
    probe_timeout: Duration,
    ctx: Arc<ProbeContext>,
    log_target: Option<LogTarget>,
    sampler_token: CancellationToken,
    sampler_handle: Option<JoinHandle<()>>,
}

impl<R> Monitor<R>
where
    R: ServerRecordView + Send + 'static,
{
    pub fn new(
        endpoint: Endpoint,
        record: Arc<Mutex<R>>,
        interval: Duration,
        probe_timeout: Duration,
        ctx: Arc<ProbeContext>,
        log_target: Option<LogTarget>,
    ) -> Self {
        Self {
            state: MonitorState::Created,
            endpoint,
            record,
            events: EventStream::new(),
            last_result: Arc::new(Mutex::new(None)),
            interval,
            probe_timeout,
            ctx,
            log_target,
            sampler_token: CancellationToken::new(),
            sampler_handle: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    /// The most recent probe result, if the sampler has run at least once.
    pub fn last_result(&self) -> Option<ProbeResult> {
        self.last_result.lock().expect("last-result mutex poisoned").clone()
    }

    /// `created -> running`: enforces log retention once, then spawns the
    /// sampler task. No-op outside `created`.
    pub fn start(&mut self) {
        if self.state != MonitorState::Created {
            return;
        }

        if let Some(target) = &self.log_target {
            let server_name = self.record.lock().expect("server record mutex poisoned").name().to_string();
            if let Err(e) = persist::enforce_retention(&target.dir, &server_name, target.retention_count) {
                debug!("log retention sweep for {server_name} failed: {e}");
            }
        }

        let endpoint = self.endpoint.clone();
        let record = self.record.clone();
        let sender = self.events.sender();
        let interval = self.interval;
        let probe_timeout = self.probe_timeout;
        let ctx = self.ctx.clone();
        let token = self.sampler_token.clone();
        let log_dir = self.log_target.as_ref().map(|t| t.dir.clone());
        let last_result = self.last_result.clone();

        self.sampler_handle = Some(tokio::spawn(async move {
            sampler::run(endpoint, record, sender, interval, probe_timeout, ctx, token, log_dir, Some(last_result)).await;
        }));

        self.state = MonitorState::Running;
    }

    /// `running -> pager_open`: the sampler is unaffected (spec: "Sampler
    /// never stops during pager mode"). No-op outside `running`.
    pub fn pause_display(&mut self) {
        if self.state == MonitorState::Running {
            self.state = MonitorState::PagerOpen;
        }
    }

    /// `pager_open -> running`. No-op outside `pager_open`.
    pub fn resume(&mut self) {
        if self.state == MonitorState::PagerOpen {
            self.state = MonitorState::Running;
        }
    }

    /// `running|pager_open -> stopped`: cancels and joins the sampler task.
    pub async fn stop(&mut self) {
        if self.state == MonitorState::Stopped || self.state == MonitorState::Created {
            self.state = MonitorState::Stopped;
            return;
        }

        self.sampler_token.cancel();
        if let Some(handle) = self.sampler_handle.take() {
            let _ = handle.await;
        }
        self.state = MonitorState::Stopped;
    }
}

