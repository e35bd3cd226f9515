//! Demo harness exercising the library end-to-end: a single probe, a port
//! scan, or a live monitor session. Not the interactive command dispatcher
//! (that is collaborator-owned); this mirrors the teacher's own
//! `examples/ping.rs` in spirit, just reworked into a `clap` subcommand CLI.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use mc_observatory::config::Config;
use mc_observatory::model::{Endpoint, Kind, ServerRecord};
use mc_observatory::monitor::{LogTarget, Monitor, MonitorState};
use mc_observatory::orchestrator::{probe_auto, scan_common_ports};
use mc_observatory::ProbeContext;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "observe")]
struct Cli {
    /// Path to config.json; falls back to built-in defaults if absent.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a single Java or Bedrock server (auto-detected if --kind omitted).
    Ping {
        host: String,
        #[arg(default_value_t = 25565)]
        port: u16,
        #[arg(long, value_enum)]
        kind: Option<CliKind>,
    },
    /// Try the common Minecraft ports against a host.
    Scan { host: String },
    /// Sample a server on an interval until Ctrl-C, printing events as they
    /// occur (spec §4.8).
    Monitor {
        host: String,
        #[arg(default_value_t = 25565)]
        port: u16,
        #[arg(long, value_enum, default_value_t = CliKind::Java)]
        kind: CliKind,
        /// Sampler interval in seconds, clamped to the configured bounds.
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliKind {
    Java,
    Bedrock,
}

impl From<CliKind> for Kind {
    fn from(kind: CliKind) -> Self {
        match kind {
            CliKind::Java => Kind::Java,
            CliKind::Bedrock => Kind::Bedrock,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config);
    let timeout = config.probe_timeout();
    let ctx = Arc::new(ProbeContext::new(config));

    match cli.command {
        Commands::Ping { host, port, kind } => {
            let result = match kind {
                Some(CliKind::Java) => mc_observatory::java::probe(&host, port, timeout, &ctx, true).await,
                Some(CliKind::Bedrock) => mc_observatory::bedrock::probe(&host, port, timeout, &ctx, true).await,
                None => probe_auto(&host, port, timeout, &ctx, true).await,
            };
            print_result(&host, &result);
        }
        Commands::Scan { host } => {
            let cancel = install_ctrl_c_handler();
            let results = scan_common_ports(&host, timeout, ctx, cancel).await;
            for outcome in results {
                if outcome.result.is_success() {
                    print_result(&format!("{}:{}", host, outcome.endpoint.port), &outcome.result);
                }
            }
        }
        Commands::Monitor { host, port, kind, interval_secs } => {
            run_monitor(host, port, kind.into(), interval_secs, ctx).await;
        }
    }
}

/// Spawns a task that cancels `token` the moment Ctrl-C is received, and
/// returns the token for the caller to thread through its work (spec §4.7/§5).
fn install_ctrl_c_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });
    token
}

async fn run_monitor(host: String, port: u16, kind: Kind, interval_secs: u64, ctx: Arc<ProbeContext>) {
    let endpoint = Endpoint::new(host.clone(), port, kind);
    let record = Arc::new(Mutex::new(ServerRecord::new(format!("{host}:{port}"), host, port, kind)));
    let interval = ctx.config.clamp_sampler_interval(interval_secs);
    let probe_timeout = ctx.config.probe_timeout();
    let log_target = Some(LogTarget {
        dir: PathBuf::from("monitor_logs"),
        retention_count: ctx.config.log_retention_count,
    });

    let mut monitor = Monitor::new(endpoint, record, interval, probe_timeout, ctx, log_target);
    monitor.start();
    println!("monitoring started, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.ok();
    monitor.stop().await;
    debug_assert_eq!(monitor.state(), MonitorState::Stopped);

    for event in monitor.events().snapshot() {
        println!("[{:?}] {}: {}", event.kind, event.server_name, event.message);
    }
}

fn print_result(label: &str, result: &mc_observatory::ProbeResult) {
    if !result.is_success() {
        println!("{label}: offline ({})", result.error.as_deref().unwrap_or("unknown error"));
        return;
    }

    println!("{label}: online ({:?}, {}ms)", result.kind, result.query_ms);
    if let Some(version) = &result.version {
        println!("  version: {} (protocol {})", version.name, version.protocol);
    }
    if let Some(players) = &result.players {
        println!("  players: {}/{}", players.online, players.max);
    }
    if let Some(motd) = &result.motd {
        println!("  motd: {}", render_motd_ansi(motd));
    }
    if result.kind == Kind::Bedrock {
        if let Some(bedrock) = &result.bedrock {
            println!("  edition: {}", bedrock.edition);
        }
    }
}

/// Renders a already-stripped-of-color-codes MOTD plainly; a real ANSI
/// renderer would map each `§` code to a terminal escape the way
/// `server_info.py`'s `convert_mc_formatting` maps codes to HTML spans, but
/// display formatting is explicitly out of core scope (spec §1) — this is a
/// deliberately minimal stand-in for the demo binary only.
fn render_motd_ansi(motd: &str) -> String {
    motd.replace('\n', " / ")
}
