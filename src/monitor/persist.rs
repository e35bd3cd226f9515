//! JSONL event log persistence (spec §4.8, §6): one line per event, one file
//! per server per day, with a retention cap on how many log files are kept.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use snafu::{Backtrace, GenerateImplicitData, ResultExt, Snafu};
use tracing::{debug, warn};

use crate::model::MonitorEvent;

#[derive(Snafu, Debug)]
pub enum PersistError {
    #[snafu(display("failed to open log file {path:?}: {source}"))]
    Open {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("failed to write to log file {path:?}: {source}"))]
    Write {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("failed to serialize event: {source}"))]
    Serialize {
        source: serde_json::Error,
        backtrace: Backtrace,
    },
}

/// Replaces filesystem-unsafe characters in a server name so it can be used
/// verbatim in a log file name.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
        .collect()
}

fn log_file_path(dir: &Path, server_name: &str) -> PathBuf {
    let date = Local::now().format("%Y%m%d");
    dir.join(format!("monitor_{}_{date}.log", sanitize_filename(server_name)))
}

/// Appends `event` as one JSON line to today's log file for `server_name`
/// under `dir`, creating `dir` if needed.
pub fn append_event(dir: &Path, server_name: &str, event: &MonitorEvent) -> Result<(), PersistError> {
    std::fs::create_dir_all(dir).context(OpenSnafu { path: dir.to_path_buf() })?;
    let path = log_file_path(dir, server_name);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .context(OpenSnafu { path: path.clone() })?;

    let line = serde_json::to_string(event).context(SerializeSnafu)?;
    writeln!(file, "{line}").context(WriteSnafu { path: path.clone() })?;
    Ok(())
}

/// Deletes the oldest log files for `server_name` under `dir` beyond
/// `retention_count`, keeping the most recent (spec §4.8
/// `log_retention_keeps_k_most_recent`).
pub fn enforce_retention(dir: &Path, server_name: &str, retention_count: usize) -> Result<(), PersistError> {
    let prefix = format!("monitor_{}_", sanitize_filename(server_name));
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(PersistError::Open { path: dir.to_path_buf(), source: e, backtrace: Backtrace::generate() }),
    };

    let mut matching: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();

    if matching.len() <= retention_count {
        return Ok(());
    }

    matching.sort();
    let excess = matching.len() - retention_count;
    for path in &matching[..excess] {
        debug!("pruning old monitor log {path:?}");
        if let Err(e) = std::fs::remove_file(path) {
            warn!("failed to prune {path:?}: {e}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventKind;

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_filename("my/server:1"), "my_server_1");
    }

    #[test]
    fn append_event_writes_one_jsonl_line() {
        let tmp = tempfile::tempdir().unwrap();
        let event = MonitorEvent::new(EventKind::Info, "srv", "hello");
        append_event(tmp.path(), "srv", &event).unwrap();

        let path = log_file_path(tmp.path(), "srv");
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"hello\""));
    }

    #[test]
    fn retention_keeps_k_most_recent_files() {
        let tmp = tempfile::tempdir().unwrap();
        for day in ["20240101", "20240102", "20240103", "20240104"] {
            std::fs::write(tmp.path().join(format!("monitor_srv_{day}.log")), "").unwrap();
        }

        enforce_retention(tmp.path(), "srv", 2).unwrap();

        let remaining: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&"monitor_srv_20240103.log".to_string()));
        assert!(remaining.contains(&"monitor_srv_20240104.log".to_string()));
    }

    #[test]
    fn missing_dir_is_not_an_error_for_retention() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does_not_exist");
        assert!(enforce_retention(&missing, "srv", 5).is_ok());
    }
}
