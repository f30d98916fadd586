//! NSEC discovery walker: given an ancestor zone and the nameservers
//! authoritative for its `_boot` subtree, walk each nameserver's NSEC chain
//! to discover every child name signaling under it, then keep only the
//! names every nameserver agrees on and that independently check out
//! against the real delegation.

use std::collections::HashSet;
use std::net::SocketAddr;

use hickory_proto::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::{Name, RData, RecordType};

use crate::auths::AuthsCache;
use crate::events::EventSink;
use crate::query::{query, QueryContext};
use crate::signaling::signaling_fqdn_for_ancestor;

/// Default cap on NSEC queries issued per nameserver in a single walk, a
/// denial-of-service backstop rather than an expected chain length.
pub const DEFAULT_MAX_WALK_STEPS: usize = 100_000;

/// A candidate produced by the walker, ready to be re-submitted to the
/// bootstrap engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkCandidate {
    pub child: Name,
    pub auths: Vec<Name>,
}

/// Walk `ancestor`'s `_boot` subtree under every nameserver in `auths`,
/// returning the verified candidates discovered by all of them.
pub async fn walk_ancestor(
    ctx: &QueryContext,
    auths_cache: &AuthsCache,
    sink: &EventSink,
    ancestor: &Name,
    auths: &[Name],
    max_walk_steps: usize,
) -> Vec<WalkCandidate> {
    let mut per_nameserver_prefixes: Vec<HashSet<Name>> = Vec::with_capacity(auths.len());
    for auth in auths {
        let entrypoint = match signaling_fqdn_for_ancestor(ancestor, auth) {
            Ok(n) => n,
            Err(_) => continue,
        };
        let targets = auths_cache.resolve_auths(ctx, std::slice::from_ref(auth), sink, ancestor).await;
        let mut prefixes = HashSet::new();
        for addr in targets {
            prefixes.extend(walk_one_nameserver(ctx, sink, addr, &entrypoint, max_walk_steps).await);
        }
        per_nameserver_prefixes.push(prefixes);
    }

    let intersection = intersect_all(&per_nameserver_prefixes);

    let mut candidates = Vec::new();
    for prefix in intersection {
        let child = match prefix.append_name(ancestor) {
            Ok(n) => n,
            Err(_) => continue,
        };
        if check_auths(ctx, auths_cache, sink, &child, auths).await {
            candidates.push(WalkCandidate {
                child,
                auths: auths.to_vec(),
            });
        }
    }
    candidates
}

/// Walk one nameserver's NSEC chain starting at `entrypoint`, returning the
/// set of relative prefixes (names relative to `entrypoint`) discovered
/// before the chain leaves the entrypoint's subtree or the step bound is
/// hit.
async fn walk_one_nameserver(
    ctx: &QueryContext,
    sink: &EventSink,
    addr: SocketAddr,
    entrypoint: &Name,
    max_walk_steps: usize,
) -> HashSet<Name> {
    let mut discovered = HashSet::new();
    let mut current = entrypoint.clone();

    for _ in 0..max_walk_steps {
        let response = match query(ctx, &current, RecordType::NSEC, Some(&[addr]), sink, entrypoint).await {
            Some(r) => r,
            None => break,
        };

        let next = response
            .answers()
            .iter()
            .filter(|r| r.record_type() == RecordType::NSEC)
            .find_map(|r| match r.data() {
                Some(RData::DNSSEC(DNSSECRData::NSEC(nsec))) => Some(nsec.next_domain_name().clone()),
                _ => None,
            });

        let next = match next {
            Some(n) => n,
            None => break,
        };

        if !entrypoint.zone_of(&next) || next == *entrypoint {
            break;
        }

        let relative = match relative_prefix(&next, entrypoint) {
            Some(p) => p,
            None => break,
        };
        if !discovered.insert(relative) {
            // Revisiting a prefix means the chain looped back; stop rather
            // than spin (a correctly signed chain shouldn't do this, but a
            // hostile or misconfigured nameserver might).
            break;
        }

        current = next;
    }

    discovered
}

fn relative_prefix(name: &Name, base: &Name) -> Option<Name> {
    if !base.zone_of(name) || name == base {
        return None;
    }
    let base_labels = base.num_labels();
    let name_labels = name.num_labels();
    if name_labels <= base_labels {
        return None;
    }
    let relative_label_count = name_labels - base_labels;
    let labels: Vec<Vec<u8>> = name
        .iter()
        .take(relative_label_count as usize)
        .map(|l| l.to_vec())
        .collect();
    Name::from_labels(labels).ok()
}

fn intersect_all(sets: &[HashSet<Name>]) -> HashSet<Name> {
    let mut iter = sets.iter();
    let first = match iter.next() {
        Some(s) => s.clone(),
        None => return HashSet::new(),
    };
    iter.fold(first, |acc, s| acc.intersection(s).cloned().collect())
}

/// Confirm that `candidate`'s real delegation matches the expected `auths`
/// set: find the candidate's actual parent zone by walking toward the root
/// until an SOA is found, fetch that parent's NS delegation for the
/// candidate, and require every returned nameserver's direct NS answer for
/// `candidate` to equal `auths` exactly.
async fn check_auths(
    ctx: &QueryContext,
    auths_cache: &AuthsCache,
    sink: &EventSink,
    candidate: &Name,
    auths: &[Name],
) -> bool {
    let parent = match find_enclosing_soa(ctx, sink, candidate).await {
        Some(p) => p,
        None => return false,
    };

    let delegated_ns = match query(ctx, candidate, RecordType::NS, None, sink, candidate).await {
        Some(resp) if !resp.is_empty_answer() => resp,
        _ => return false,
    };
    let delegated: HashSet<Name> = delegated_ns
        .records_of(candidate, RecordType::NS)
        .iter()
        .filter_map(|r| r.data().and_then(|d| d.as_ns()).map(|n| n.0.clone()))
        .collect();
    let expected: HashSet<Name> = auths.iter().cloned().collect();
    if delegated != expected {
        return false;
    }

    let parent_targets = auths_cache.resolve_auths(ctx, &[parent], sink, candidate).await;
    if parent_targets.is_empty() {
        return false;
    }

    for &addr in &parent_targets {
        match query(ctx, candidate, RecordType::NS, Some(&[addr]), sink, candidate).await {
            Some(resp) if !resp.is_empty_answer() => {
                let ns_set: HashSet<Name> = resp
                    .records_of(candidate, RecordType::NS)
                    .iter()
                    .filter_map(|r| r.data().and_then(|d| d.as_ns()).map(|n| n.0.clone()))
                    .collect();
                if ns_set != expected {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

/// Walk upward from `name`, stripping one label at a time, until an SOA is
/// found at the resulting zone apex.
async fn find_enclosing_soa(ctx: &QueryContext, sink: &EventSink, name: &Name) -> Option<Name> {
    let mut current = name.clone();
    while current.num_labels() > 0 {
        if let Some(resp) = query(ctx, &current, RecordType::SOA, None, sink, name).await {
            if !resp.is_empty_answer() {
                return Some(current);
            }
        }
        current = current.base_name();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn relative_prefix_of_direct_child() {
        let base = name("_boot.ns1.example.test.");
        let full = name("a.b._boot.ns1.example.test.");
        let rel = relative_prefix(&full, &base).unwrap();
        assert_eq!(rel.to_ascii(), "a.b.");
    }

    #[test]
    fn relative_prefix_rejects_outside_zone() {
        let base = name("_boot.ns1.example.test.");
        let outside = name("a.example.net.");
        assert!(relative_prefix(&outside, &base).is_none());
    }

    #[test]
    fn intersect_all_of_empty_is_empty() {
        assert!(intersect_all(&[]).is_empty());
    }

    #[test]
    fn intersect_all_takes_common_members() {
        let a: HashSet<Name> = [name("b."), name("c."), name("a.")].into_iter().collect();
        let b: HashSet<Name> = [name("b."), name("c."), name("d.")].into_iter().collect();
        let result = intersect_all(&[a, b]);
        let expected: HashSet<Name> = [name("b."), name("c.")].into_iter().collect();
        assert_eq!(result, expected);
    }
}
