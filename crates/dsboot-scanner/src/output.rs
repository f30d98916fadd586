//! Output formatting: a bootstrapped DS set in zone-file presentation
//! form, or a discovery line per NSEC-walk candidate.

use std::io::Write;

use dsboot_core::bootstrap::BootstrapResult;
use dsboot_core::walker::WalkCandidate;
use hickory_proto::rr::RecordType;

/// TTL stamped on emitted DS presentation lines. `CanonicalRRset` compares
/// rdata sets only, by design (`RRset equality is by owner name, type,
/// class, and canonicalized rdata set — not TTL`), so no observed TTL
/// survives into the candidate set; this is the DS minimum TTL most zones
/// converge on rather than a TTL copied from any one view.
const PRESENTATION_TTL: u32 = 3600;

pub fn write_ds_rrset(out: &mut impl Write, ds: &BootstrapResult) -> std::io::Result<()> {
    for rdata in ds.rdata_texts() {
        writeln!(
            out,
            "{}\t{}\tIN\t{}\t{}",
            ds.owner(),
            PRESENTATION_TTL,
            RecordType::DS,
            rdata
        )?;
    }
    Ok(())
}

pub fn write_discovery_line(out: &mut impl Write, candidate: &WalkCandidate) -> std::io::Result<()> {
    let auths: Vec<String> = candidate.auths.iter().map(|a| a.to_string()).collect();
    writeln!(out, "{} {}", candidate.child, auths.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsboot_core::rrset::CanonicalRRset;
    use hickory_proto::rr::Name;

    #[test]
    fn empty_ds_set_writes_nothing() {
        let ds = CanonicalRRset::empty(Name::from_ascii("example.test.").unwrap(), RecordType::DS);
        let mut buf = Vec::new();
        write_ds_rrset(&mut buf, &ds).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn discovery_line_has_expected_shape() {
        let candidate = WalkCandidate {
            child: Name::from_ascii("a.test.").unwrap(),
            auths: vec![Name::from_ascii("ns1.example.test.").unwrap()],
        };
        let mut buf = Vec::new();
        write_discovery_line(&mut buf, &candidate).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line, "a.test. ns1.example.test.\n");
    }
}
