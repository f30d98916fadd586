use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hickory_proto::rr::Name;

/// The closed taxonomy of events a scan can record.
///
/// This is a stable wire name set: every variant must round-trip through
/// `as_wire_name`/`Display` unchanged, since downstream report consumers key
/// off these strings. `HaveCds`, `OldSig`, `NotSignedByKsk`, `CdsDelete`, and
/// `CdsNoop` are reserved for future use and are never emitted by this
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    HaveDs,
    DnsFailure,
    DnsBogus,
    DnsLame,
    DnsTimeout,
    ChildCdsInconsistent,
    ChildCdnskeyInconsistent,
    ChildDnskeyInconsistent,
    BootCdsInconsistent,
    BootCdnskeyInconsistent,
    BootNoop,
    NoCds,
    NoCdnskey,
    ContinuityErr,
    // Reserved, never emitted.
    HaveCds,
    OldSig,
    NotSignedByKsk,
    CdsDelete,
    CdsNoop,
}

impl Event {
    /// The stable wire name printed in the per-domain report.
    pub fn as_wire_name(self) -> &'static str {
        match self {
            Event::HaveDs => "HAVE_DS",
            Event::DnsFailure => "DNS_FAILURE",
            Event::DnsBogus => "DNS_BOGUS",
            Event::DnsLame => "DNS_LAME",
            Event::DnsTimeout => "DNS_TIMEOUT",
            Event::ChildCdsInconsistent => "CHILD_CDS_INCONSISTENT",
            Event::ChildCdnskeyInconsistent => "CHILD_CDNSKEY_INCONSISTENT",
            Event::ChildDnskeyInconsistent => "CHILD_DNSKEY_INCONSISTENT",
            Event::BootCdsInconsistent => "BOOT_CDS_INCONSISTENT",
            Event::BootCdnskeyInconsistent => "BOOT_CDNSKEY_INCONSISTENT",
            Event::BootNoop => "BOOT_NOOP",
            Event::NoCds => "NO_CDS",
            Event::NoCdnskey => "NO_CDNSKEY",
            Event::ContinuityErr => "CONTINUITY_ERR",
            Event::HaveCds => "HAVE_CDS",
            Event::OldSig => "OLD_SIG",
            Event::NotSignedByKsk => "NOT_SIGNED_BY_KSK",
            Event::CdsDelete => "CDS_DELETE",
            Event::CdsNoop => "CDS_NOOP",
        }
    }

    /// All variants, in taxonomy declaration order. Used to build a stable
    /// zero-filled count report.
    pub const ALL: &'static [Event] = &[
        Event::HaveDs,
        Event::DnsFailure,
        Event::DnsBogus,
        Event::DnsLame,
        Event::DnsTimeout,
        Event::ChildCdsInconsistent,
        Event::ChildCdnskeyInconsistent,
        Event::ChildDnskeyInconsistent,
        Event::BootCdsInconsistent,
        Event::BootCdnskeyInconsistent,
        Event::BootNoop,
        Event::NoCds,
        Event::NoCdnskey,
        Event::ContinuityErr,
        Event::HaveCds,
        Event::OldSig,
        Event::NotSignedByKsk,
        Event::CdsDelete,
        Event::CdsNoop,
    ];
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_name())
    }
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] event sink mutex poisoned, cannot recover from this - aborting";

/// A shared, append-only queue of `(domain, event)` pairs.
///
/// Cheaply `Clone`-able handle around an `Arc<Mutex<...>>`; all accessors
/// take `&self`. There is no ordering requirement between scans; events
/// from a single scan are appended in that scan's generation order because
/// each scan runs on one task and calls `record` sequentially.
#[derive(Debug, Clone)]
pub struct EventSink {
    records: Arc<Mutex<Vec<(Name, Event)>>>,
}

impl EventSink {
    pub fn new() -> Self {
        EventSink {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record an event during processing of `domain`.
    pub fn record(&self, domain: &Name, event: Event) {
        self.records
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .push((domain.clone(), event));
    }

    /// A simple count-per-event-kind summary, zero-filled for every member
    /// of the taxonomy so the report shape is stable across runs.
    pub fn report_counts(&self) -> Vec<(Event, usize)> {
        let mut counts: HashMap<Event, usize> = HashMap::new();
        for (_, event) in self.records.lock().expect(MUTEX_POISON_MESSAGE).iter() {
            *counts.entry(*event).or_insert(0) += 1;
        }
        Event::ALL
            .iter()
            .map(|e| (*e, counts.get(e).copied().unwrap_or(0)))
            .collect()
    }

    /// The full event-kind -> list-of-domains mapping.
    pub fn report_domains(&self) -> HashMap<Event, Vec<Name>> {
        let mut out: HashMap<Event, Vec<Name>> = HashMap::new();
        for (domain, event) in self.records.lock().expect(MUTEX_POISON_MESSAGE).iter() {
            out.entry(*event).or_default().push(domain.clone());
        }
        out
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn records_are_never_dropped() {
        let sink = EventSink::new();
        for i in 0..100 {
            sink.record(&name(&format!("domain{i}.test.")), Event::BootNoop);
        }
        let counts = sink.report_counts();
        let boot_noop = counts
            .iter()
            .find(|(e, _)| *e == Event::BootNoop)
            .unwrap();
        assert_eq!(boot_noop.1, 100);
    }

    #[test]
    fn counts_are_zero_filled_for_every_taxonomy_member() {
        let sink = EventSink::new();
        sink.record(&name("example.test."), Event::HaveDs);
        let counts = sink.report_counts();
        assert_eq!(counts.len(), Event::ALL.len());
        assert!(counts.iter().any(|(e, c)| *e == Event::DnsTimeout && *c == 0));
    }

    #[test]
    fn report_domains_groups_by_event() {
        let sink = EventSink::new();
        sink.record(&name("a.test."), Event::NoCds);
        sink.record(&name("b.test."), Event::NoCds);
        let domains = sink.report_domains();
        assert_eq!(domains[&Event::NoCds].len(), 2);
    }

    #[test]
    fn wire_names_match_taxonomy() {
        assert_eq!(Event::HaveDs.as_wire_name(), "HAVE_DS");
        assert_eq!(Event::ChildCdsInconsistent.as_wire_name(), "CHILD_CDS_INCONSISTENT");
        assert_eq!(Event::CdsNoop.as_wire_name(), "CDS_NOOP");
    }
}
