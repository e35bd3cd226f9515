//! Endpoint & mod caches (spec §4.6): status TTL cache, SRV TTL cache, and a
//! persistent on-disk mod-list cache keyed by endpoint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use snafu::{Backtrace, ResultExt, Snafu};
use tracing::{debug, trace, warn};

use crate::model::{Kind, ModEntry, ProbeResult};

#[derive(Snafu, Debug)]
pub enum CacheError {
    #[snafu(display("failed to write mod cache file {path:?}: {source}"))]
    Write {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A generic TTL-bounded cache, used for both the status cache (60s) and
/// the SRV cache (300s). Readers tolerate stale reads between the TTL check
/// and eviction; writes are not ordered with reads (spec §5).
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a clone of the cached value if present and not yet expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        entries.get(key).and_then(|entry| {
            if Instant::now() < entry.expires_at {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Empties the cache (spec §4.6: `clear_all_caches` — in-memory only,
    /// on-disk mod cache files are untouched per the Open Questions decision).
    pub fn clear(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }
}

pub const STATUS_CACHE_TTL: Duration = Duration::from_secs(60);
pub const SRV_CACHE_TTL: Duration = Duration::from_secs(300);

/// Status cache key: the endpoint actually queried plus its kind (spec
/// §4.6). Two servers behind the same `(host, port)` but different kinds
/// (e.g. a Bedrock proxy sharing a Java port) never collide.
pub type StatusCacheKey = (String, u16, Kind);
pub type StatusCache = TtlCache<StatusCacheKey, ProbeResult>;

/// Persistent mod-list cache: one JSON file per `(host, port)`, written
/// atomically (write-then-rename). Absence or parse failure both mean
/// "not cached" — neither is surfaced as a hard error to callers.
pub struct ModCacheStore {
    dir: PathBuf,
}

impl ModCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, host: &str, port: u16) -> PathBuf {
        let safe_host = host.replace('.', "_");
        self.dir.join(format!("{safe_host}_{port}.json"))
    }

    /// Returns `None` if the file is absent or fails to parse; never returns
    /// an error for that case (spec §4.6).
    pub fn get(&self, host: &str, port: u16) -> Option<Vec<ModEntry>> {
        let path = self.file_for(host, port);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("failed to read mod cache {path:?}: {e}");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(mods) => {
                trace!("mod cache hit for {host}:{port}");
                Some(mods)
            }
            Err(e) => {
                warn!("failed to parse mod cache {path:?}: {e}");
                None
            }
        }
    }

    pub fn put(&self, host: &str, port: u16, mods: &[ModEntry]) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).context(WriteSnafu {
            path: self.dir.clone(),
        })?;

        let path = self.file_for(host, port);
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(mods).expect("ModEntry always serializes");
        std::fs::write(&tmp_path, json).context(WriteSnafu { path: path.clone() })?;
        std::fs::rename(&tmp_path, &path).context(WriteSnafu { path: path.clone() })?;

        debug!("wrote mod cache for {host}:{port}");
        Ok(())
    }
}

pub fn default_mods_dir() -> PathBuf {
    Path::new("mods_config").to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn status_cache_ttl_returns_verbatim_then_expires() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_millis(50));
        cache.put("key".to_string(), 42);
        assert_eq!(cache.get(&"key".to_string()), Some(42));
        sleep(Duration::from_millis(80));
        assert_eq!(cache.get(&"key".to_string()), None);
    }

    #[test]
    fn clear_empties_in_memory_cache_only() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_secs(60));
        cache.put("a".into(), 1);
        cache.clear();
        assert_eq!(cache.get(&"a".into()), None);
    }

    #[test]
    fn mod_cache_persists_across_fresh_store() {
        let tmp = tempfile::tempdir().unwrap();
        let mods = vec![ModEntry {
            modid: "forge".into(),
            version: "40.2.0".into(),
        }];

        let store = ModCacheStore::new(tmp.path());
        store.put("example.com", 25565, &mods).unwrap();

        // A fresh store (standing in for "a fresh process") reads the same data.
        let fresh_store = ModCacheStore::new(tmp.path());
        let loaded = fresh_store.get("example.com", 25565).unwrap();
        assert_eq!(loaded, mods);
    }

    #[test]
    fn mod_cache_miss_is_none_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ModCacheStore::new(tmp.path());
        assert!(store.get("nowhere.example", 1).is_none());
    }
}
