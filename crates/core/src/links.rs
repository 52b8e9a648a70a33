use sha2::{Digest, Sha256};

use crate::types::{ContactId, OrgId};

/// Environment variable holding the quote-link signing secret.
pub const QUOTE_SECRET_VAR: &str = "QUOTE_SECRET";

/// Environment variable holding the public base URL used in generated links.
pub const BASE_URL_VAR: &str = "EMAIL_SCHEDULER_BASE_URL";

/// Short hash binding a quote link to one `(org, contact)` pair.
///
/// First 8 hex characters of `SHA-256("<org>-<contact>-<secret>")` over the
/// UTF-8 bytes, matching the web tier's link verification.
#[must_use]
pub fn quote_hash(org_id: OrgId, contact_id: &ContactId, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{org_id}-{contact_id}-{secret}").as_bytes());
    hex::encode(hasher.finalize())[..8].to_owned()
}

/// Full comparison-page link embedded in outbound emails:
/// `<base>/compare?id=<org>-<contact>-<hash8>`.
#[must_use]
pub fn quote_link(base_url: &str, org_id: OrgId, contact_id: &ContactId, secret: &str) -> String {
    let hash = quote_hash(org_id, contact_id, secret);
    format!(
        "{}/compare?id={org_id}-{contact_id}-{hash}",
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_short() {
        let org = OrgId::new(7);
        let contact = ContactId::from("123");
        let a = quote_hash(org, &contact, "secret");
        let b = quote_hash(org, &contact, "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_depends_on_all_inputs() {
        let contact = ContactId::from("123");
        let base = quote_hash(OrgId::new(7), &contact, "secret");
        assert_ne!(base, quote_hash(OrgId::new(8), &contact, "secret"));
        assert_ne!(base, quote_hash(OrgId::new(7), &ContactId::from("124"), "secret"));
        assert_ne!(base, quote_hash(OrgId::new(7), &contact, "other"));
    }

    #[test]
    fn link_shape() {
        let link = quote_link(
            "https://example.com/",
            OrgId::new(7),
            &ContactId::from("123"),
            "secret",
        );
        assert!(link.starts_with("https://example.com/compare?id=7-123-"));
        assert!(!link.contains("//compare"));
    }
}
