//! Shared probe context (spec §4.6/§6 ambient stack): bundles the
//! config-derived SRV/status caches and the persistent mod cache so callers
//! thread one handle through `java::probe`/`bedrock::probe`/`orchestrator`
//! instead of three separate parameters each.

use std::path::PathBuf;

use crate::cache::{ModCacheStore, StatusCache, TtlCache};
use crate::config::Config;

pub struct ProbeContext {
    pub config: Config,
    pub srv_cache: TtlCache<String, (String, u16)>,
    pub status_cache: StatusCache,
    pub mod_cache: ModCacheStore,
}

impl ProbeContext {
    /// Builds a context from `config`, using the default on-disk mod cache
    /// directory (`cache::default_mods_dir`).
    pub fn new(config: Config) -> Self {
        Self::with_mods_dir(config, crate::cache::default_mods_dir())
    }

    pub fn with_mods_dir(config: Config, mods_dir: PathBuf) -> Self {
        Self {
            srv_cache: TtlCache::new(config.srv_cache_ttl()),
            status_cache: TtlCache::new(config.status_cache_ttl()),
            mod_cache: ModCacheStore::new(mods_dir),
            config,
        }
    }

    /// Empties both in-memory caches (spec §4.6 `clear_all_caches`); the
    /// on-disk mod cache is untouched, matching the Open Question decision
    /// already recorded for `TtlCache::clear`.
    pub fn clear_caches(&self) {
        self.srv_cache.clear();
        self.status_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_starts_with_empty_caches() {
        let ctx = ProbeContext::new(Config::default());
        assert_eq!(ctx.srv_cache.len(), 0);
        assert_eq!(ctx.status_cache.len(), 0);
    }
}
