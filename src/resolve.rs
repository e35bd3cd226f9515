//! SRV resolver (spec §4.2), grounded on the teacher's inline
//! `trust_dns_resolver::TokioAsyncResolver` use in `connect()`.

use std::sync::OnceLock;
use std::time::Duration;

use snafu::{Backtrace, Snafu};
use tracing::{debug, trace};
use trust_dns_resolver::TokioAsyncResolver;

use crate::cache::{TtlCache, SRV_CACHE_TTL};
use crate::model::{Endpoint, Kind, ResolvedEndpoint};

#[derive(Snafu, Debug)]
pub enum ResolveError {
    #[snafu(display("failed to build system resolver: {source}"))]
    ResolverInit {
        source: trust_dns_resolver::error::ResolveError,
        backtrace: Backtrace,
    },
}

fn resolver() -> &'static TokioAsyncResolver {
    static RESOLVER: OnceLock<TokioAsyncResolver> = OnceLock::new();
    RESOLVER.get_or_init(|| {
        TokioAsyncResolver::tokio_from_system_conf()
            .unwrap_or_else(|_| TokioAsyncResolver::tokio(Default::default(), Default::default()))
    })
}

/// Resolves `host`/`default_port` via `_minecraft._tcp.<host>` SRV lookup,
/// falling back silently to the original endpoint on any failure.
///
/// Cached for [`SRV_CACHE_TTL`] by `host`. Emits no error to callers; only
/// informational logs (spec §4.2).
pub async fn resolve(
    host: &str,
    default_port: u16,
    kind: Kind,
    srv_cache: &TtlCache<String, (String, u16)>,
) -> ResolvedEndpoint {
    let original = Endpoint::new(host, default_port, kind);

    if kind != Kind::Java {
        // SRV discovery is a Java Edition convention.
        return ResolvedEndpoint::unresolved(original);
    }

    if let Some((cached_host, cached_port)) = srv_cache.get(&host.to_string()) {
        trace!("srv cache hit for {host}");
        if cached_host == host && cached_port == default_port {
            // A cached "no SRV record" result (we cache the fallback target
            // too); treat it the same as a fresh negative lookup.
            return ResolvedEndpoint::unresolved(original);
        }
        let resolved = Endpoint::new(cached_host, cached_port, kind);
        return ResolvedEndpoint::via_srv(original, resolved);
    }

    let query = format!("_minecraft._tcp.{host}");
    match resolver().srv_lookup(query).await {
        Ok(lookup) => {
            if let Some(record) = lookup.iter().next() {
                let target = record.target().to_utf8();
                let target = target.trim_end_matches('.').to_string();
                let port = record.port();
                debug!("SRV record resolved {host} -> {target}:{port}");
                srv_cache.put(host.to_string(), (target.clone(), port));
                let resolved = Endpoint::new(target, port, kind);
                return ResolvedEndpoint::via_srv(original, resolved);
            }
            debug!("SRV lookup for {host} returned no records");
        }
        Err(e) => {
            debug!("SRV lookup failed for {host}: {e}");
        }
    }

    srv_cache.put(host.to_string(), (host.to_string(), default_port));
    ResolvedEndpoint::unresolved(original)
}

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srv_cache_hit_skips_a_new_query() {
        let cache: TtlCache<String, (String, u16)> = TtlCache::new(SRV_CACHE_TTL);
        cache.put("srv.example.com".to_string(), ("mc1.example.com".to_string(), 25580));

        // Simulate what `resolve` does on a cache hit without touching the network.
        let hit = cache.get(&"srv.example.com".to_string());
        assert_eq!(hit, Some(("mc1.example.com".to_string(), 25580)));
    }
}
