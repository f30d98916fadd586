use data_encoding::BASE32HEX_NOPAD;
use hickory_proto::rr::Name;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder, EncodeMode};
use sha2::{Digest, Sha256};

use crate::error::ScanError;

/// Compute the base32-hex-encoded SHA-256 digest of `name`'s uncompressed
/// wire format: emit `name` in canonical (uncompressed, lowercased) wire
/// format, SHA-256 it, base32-encode the 32-byte digest using the alphabet
/// `0123456789abcdefghijklmnopqrstuv`, strip padding, lowercase.
///
/// `BASE32HEX_NOPAD` is exactly that alphabet (RFC 4648 "extended hex",
/// the NSEC3 alphabet), unpadded. This is a pure function: same input,
/// byte-identical output, every time.
pub fn signaling_hash(name: &Name) -> Result<String, ScanError> {
    let mut buf = Vec::new();
    {
        // `EncodeMode::Canonical` disables name compression and lowercases
        // labels, giving the uncompressed canonical wire form without us
        // hand-rolling label serialisation.
        let mut encoder = BinEncoder::with_mode(&mut buf, EncodeMode::Canonical);
        name.emit(&mut encoder)
            .map_err(|e| ScanError::Signaling(e.to_string()))?;
    }
    let digest = Sha256::digest(&buf);
    Ok(BASE32HEX_NOPAD.encode(&digest).to_lowercase())
}

/// Build the signaling owner name for `child` under `auth`:
/// `<firstlabel>.<base32hex-sha256(parent)>._boot.<auth>`.
///
/// `child` must have at least two labels (a first label and a parent);
/// a bare TLD cannot itself be a delegated child zone in this scanner's
/// model.
pub fn signaling_fqdn(child: &Name, auth: &Name) -> Result<Name, ScanError> {
    if child.num_labels() < 2 {
        return Err(ScanError::Signaling(format!(
            "{child} has no parent to hash"
        )));
    }
    let first_label = child
        .iter()
        .next()
        .ok_or_else(|| ScanError::Signaling(format!("{child} has no labels")))?;
    let parent = child.base_name();
    let hash = signaling_hash(&parent)?;

    let mut name = Name::from_labels(vec![first_label.to_vec(), hash.into_bytes()])
        .map_err(|e| ScanError::Signaling(e.to_string()))?;
    name = name.append_name(&Name::from_ascii("_boot")?)?;
    name = name.append_name(auth)?;
    Ok(name)
}

/// Build the NSEC-walk entry point for `ancestor` under `auth`:
/// `<base32hex-sha256(ancestor)>._boot.<auth>`. Unlike [`signaling_fqdn`],
/// there is no child first-label prefix — the walk starts at the hash
/// itself and discovers labels underneath it.
pub fn signaling_fqdn_for_ancestor(ancestor: &Name, auth: &Name) -> Result<Name, ScanError> {
    let hash = signaling_hash(ancestor)?;
    let mut name = Name::from_ascii(&hash).map_err(|e| ScanError::Signaling(e.to_string()))?;
    name = name.append_name(&Name::from_ascii("_boot")?)?;
    name = name.append_name(auth)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_function() {
        let n = Name::from_ascii("test.").unwrap();
        let a = signaling_hash(&n).unwrap();
        let b = signaling_hash(&n).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn round_trips_through_sha256() {
        let n = Name::from_ascii("test.").unwrap();
        let hash = signaling_hash(&n).unwrap();
        let decoded = BASE32HEX_NOPAD
            .decode(hash.to_uppercase().as_bytes())
            .unwrap();

        let mut buf = Vec::new();
        let mut encoder = BinEncoder::with_mode(&mut buf, EncodeMode::Canonical);
        n.emit(&mut encoder).unwrap();
        let expected = Sha256::digest(&buf);

        assert_eq!(decoded, expected.as_slice());
    }

    #[test]
    fn signaling_fqdn_shape() {
        let child = Name::from_ascii("example.test.").unwrap();
        let auth = Name::from_ascii("ns1.example.test.").unwrap();
        let fqdn = signaling_fqdn(&child, &auth).unwrap();
        let rendered = fqdn.to_ascii();
        assert!(rendered.starts_with("example."));
        assert!(rendered.contains("._boot.ns1.example.test"));
    }

    #[test]
    fn ancestor_entrypoint_has_no_first_label_prefix() {
        let ancestor = Name::from_ascii("test.").unwrap();
        let auth = Name::from_ascii("ns1.example.test.").unwrap();
        let entrypoint = signaling_fqdn_for_ancestor(&ancestor, &auth).unwrap();
        let hash = signaling_hash(&ancestor).unwrap();
        assert!(entrypoint.to_ascii().starts_with(&hash));
        assert!(entrypoint.to_ascii().ends_with("._boot.ns1.example.test."));
    }

    #[test]
    fn rejects_bare_tld_child() {
        let child = Name::from_ascii("test.").unwrap();
        let auth = Name::from_ascii("ns1.example.test.").unwrap();
        assert!(signaling_fqdn(&child, &auth).is_err());
    }
}
