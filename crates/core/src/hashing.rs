//! SHA-256 fingerprints for versioning stored configuration.

use sha2::{Digest, Sha256};

use crate::validation::Rule;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Content hash of a rule list, used as the built-in rules' version stamp.
///
/// Order-sensitive: reordering built-in rules is a version change.
pub fn rules_fingerprint(rules: &[Rule]) -> String {
    let encoded = serde_json::to_vec(rules).unwrap_or_default();
    sha256_hex(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{RuleConfig, RuleScope, Severity};

    fn rule(id: &str) -> Rule {
        Rule {
            id: id.into(),
            name: id.into(),
            scope: RuleScope::Field,
            target_table: "T".into(),
            target_column: Some("C".into()),
            config: RuleConfig::Required,
            error_message: String::new(),
            severity: Severity::Error,
            builtin: true,
            intercept: false,
        }
    }

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_tracks_content_and_order() {
        let a = vec![rule("a"), rule("b")];
        let b = vec![rule("b"), rule("a")];
        assert_eq!(rules_fingerprint(&a), rules_fingerprint(&a.clone()));
        assert_ne!(rules_fingerprint(&a), rules_fingerprint(&b));
        assert_eq!(rules_fingerprint(&a).len(), 64);
    }
}
