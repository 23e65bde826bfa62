//! Payload fingerprints for content-based deduplication.

use sha2::{Digest, Sha256};

/// Hex SHA-256 over the sorted, de-duplicated match keys joined by newlines.
///
/// Equal match sets always yield equal fingerprints regardless of input order.
pub fn fingerprint<I, S>(match_keys: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keys: Vec<String> = match_keys
        .into_iter()
        .map(|k| k.as_ref().to_string())
        .collect();
    keys.sort();
    keys.dedup();

    let mut hasher = Sha256::new();
    hasher.update(keys.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint of a match set addressed to `destination`.
///
/// The same matches sent somewhere new count as a new payload.
pub fn addressed<I, S>(match_keys: I, destination: Option<&str>) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let to = destination.map(|d| format!("to:{}", d.trim()));
    fingerprint(
        match_keys
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .chain(to),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_independent() {
        let a = fingerprint(["b|x|d|t", "a|x|d|t"]);
        let b = fingerprint(["a|x|d|t", "b|x|d|t", "a|x|d|t"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_growth_changes_fingerprint() {
        let one = fingerprint(["Test Film|PVR Chennai|2026-10-19|07:30 PM"]);
        let two = fingerprint([
            "Test Film|PVR Chennai|2026-10-19|07:30 PM",
            "Test Film|PVR Chennai|2026-10-19|10:00 PM",
        ]);
        assert_ne!(one, two);
    }

    #[test]
    fn test_destination_changes_fingerprint() {
        let keys = ["Test Film|PVR Chennai|2026-10-19|07:30 PM"];
        let first = addressed(keys, Some("whatsapp:+911234567890"));
        let second = addressed(keys, Some("whatsapp:+919876543210"));

        assert_ne!(first, second);
        assert_eq!(first, addressed(keys, Some(" whatsapp:+911234567890")));
        assert_eq!(addressed(keys, None), fingerprint(keys));
    }
}
