use std::collections::BTreeSet;

use hickory_proto::rr::{Name, RData, Record, RecordType};

/// An RRset compared by owner name, type, class, and canonicalized rdata
/// set — never by TTL, never by rdata order.
///
/// Equality and hashing fall out of an ordinary derive over a `BTreeSet` of
/// each rdata's canonical presentation-form text, so two RRsets that differ
/// only in member order or TTL compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRRset {
    owner: Name,
    rtype: RecordType,
    rdata: BTreeSet<String>,
}

impl CanonicalRRset {
    /// Build a canonical RRset from a set of records already known to share
    /// an owner name and type (as queried for a single name/rtype pair).
    pub fn from_records(owner: Name, rtype: RecordType, records: &[Record]) -> Self {
        let rdata = records
            .iter()
            .filter_map(|r| r.data())
            .map(canonical_rdata_text)
            .collect();
        CanonicalRRset {
            owner,
            rtype,
            rdata,
        }
    }

    /// An empty RRset at `owner`/`rtype` — distinct from "absent": this
    /// represents a present-but-empty answer.
    pub fn empty(owner: Name, rtype: RecordType) -> Self {
        CanonicalRRset {
            owner,
            rtype,
            rdata: BTreeSet::new(),
        }
    }

    /// Build a canonical RRset directly from an already-agreed rdata set,
    /// stamped with `owner`/`rtype`. Used after a rdata-only cross-view
    /// agreement check (where the contributing views didn't share an
    /// owner) to re-attach the owner the agreed rdata belongs under.
    pub fn from_rdata_texts(owner: Name, rtype: RecordType, rdata: BTreeSet<String>) -> Self {
        CanonicalRRset { owner, rtype, rdata }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    pub fn is_empty(&self) -> bool {
        self.rdata.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rdata.len()
    }

    /// The rdata set's canonical presentation-form text, in sorted order.
    /// Used both for equality checks and, unmodified, as the rdata column
    /// of a presentation-form output line.
    pub fn rdata_texts(&self) -> impl Iterator<Item = &str> {
        self.rdata.iter().map(String::as_str)
    }
}

/// Canonical text form of one rdata: presentation format via `RData`'s
/// `Display` impl. Two rdata that are semantically identical render
/// identically, which is exactly the property an order- and
/// TTL-insensitive comparison needs.
fn canonical_rdata_text(rdata: &RData) -> String {
    rdata.to_string()
}
