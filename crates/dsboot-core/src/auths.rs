//! Authoritative nameserver IP cache.
//!
//! Grows monotonically for the life of a process: once a hostname's address
//! set has been resolved, later scans reuse it rather than re-querying. An
//! `Arc<Mutex<...>>` handle shared the same way as [`crate::events::EventSink`].

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use hickory_proto::rr::{Name, RecordType};

use crate::query::{query, QueryContext};

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] auths cache mutex poisoned, cannot recover from this - aborting";

/// Shared, append-only hostname -> address-set cache.
#[derive(Debug, Clone)]
pub struct AuthsCache {
    cache: Arc<Mutex<HashMap<Name, Vec<IpAddr>>>>,
}

impl AuthsCache {
    pub fn new() -> Self {
        AuthsCache {
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn get(&self, hostname: &Name) -> Option<Vec<IpAddr>> {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).get(hostname).cloned()
    }

    fn insert(&self, hostname: Name, addrs: Vec<IpAddr>) {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).insert(hostname, addrs);
    }

    /// Resolve every hostname in `hostnames` to a flat set of `SocketAddr`s
    /// (port 53), resolving AAAA and then A for any hostname not already
    /// cached. A hostname that resolves to nothing is simply dropped from
    /// the result; it doesn't stop the others from resolving.
    pub async fn resolve_auths(
        &self,
        ctx: &QueryContext,
        hostnames: &[Name],
        sink: &crate::events::EventSink,
        event_domain: &Name,
    ) -> Vec<SocketAddr> {
        let mut out = Vec::new();
        for hostname in hostnames {
            let addrs = match self.get(hostname) {
                Some(addrs) => addrs,
                None => {
                    let resolved = resolve_one(ctx, hostname, sink, event_domain).await;
                    self.insert(hostname.clone(), resolved.clone());
                    resolved
                }
            };
            out.extend(addrs.into_iter().map(|ip| SocketAddr::new(ip, 53)));
        }
        out
    }
}

impl Default for AuthsCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn resolve_one(
    ctx: &QueryContext,
    hostname: &Name,
    sink: &crate::events::EventSink,
    event_domain: &Name,
) -> Vec<IpAddr> {
    let mut addrs = Vec::new();

    if let Some(response) = query(ctx, hostname, RecordType::AAAA, None, sink, event_domain).await {
        addrs.extend(response.records_of(hostname, RecordType::AAAA).iter().filter_map(|r| {
            r.data().and_then(|d| d.as_aaaa()).map(|a| IpAddr::V6(**a))
        }));
    }

    if let Some(response) = query(ctx, hostname, RecordType::A, None, sink, event_domain).await {
        addrs.extend(response.records_of(hostname, RecordType::A).iter().filter_map(|r| {
            r.data().and_then(|d| d.as_a()).map(|a| IpAddr::V4(**a))
        }));
    }

    addrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_starts_empty() {
        let cache = AuthsCache::new();
        assert!(cache.get(&Name::from_ascii("ns1.example.test.").unwrap()).is_none());
    }

    #[test]
    fn insert_then_get_round_trips() {
        let cache = AuthsCache::new();
        let name = Name::from_ascii("ns1.example.test.").unwrap();
        let addrs = vec!["192.0.2.1".parse().unwrap()];
        cache.insert(name.clone(), addrs.clone());
        assert_eq!(cache.get(&name), Some(addrs));
    }
}
