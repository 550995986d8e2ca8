//! HMAC-SHA256 webhook signatures
//!
//! Harbor signs the raw request body with the shared secret and sends the hex
//! digest in `x-harbor-signature`, optionally prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-harbor-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Hex length of a SHA-256 digest
const DIGEST_HEX_LEN: usize = 64;

/// Hex-encoded HMAC-SHA256 of `body` keyed with `secret`
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a signature header against the body in constant time.
///
/// The digest must be exactly 64 lowercase hex characters, as Harbor sends
/// it; anything else fails before the MAC is computed.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let hex_signature = header_value
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(header_value);

    if !is_lowercase_digest(hex_signature) {
        return false;
    }
    let Ok(signature_bytes) = hex::decode(hex_signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&signature_bytes).is_ok()
}

fn is_lowercase_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            compute_signature("s", b"hello"),
            "8a06a64224d83d1bf0a2140fab7d5b462cf3f450592c7963910ed331e9031056"
        );
    }

    #[test]
    fn test_prefixed_and_bare_signatures_verify() {
        let body = br#"{"type":"PUSH_ARTIFACT"}"#;
        let signature = compute_signature("s", body);
        assert!(verify_signature("s", body, &signature));
        assert!(verify_signature("s", body, &format!("sha256={signature}")));
    }

    #[test]
    fn test_any_body_mutation_rejected() {
        let body = br#"{"type":"PUSH_ARTIFACT","event_data":{}}"#.to_vec();
        let header = format!("sha256={}", compute_signature("s", &body));

        for i in 0..body.len() {
            let mut mutated = body.clone();
            mutated[i] ^= 0x01;
            assert!(!verify_signature("s", &mutated, &header), "byte {i}");
        }
    }

    #[test]
    fn test_any_header_mutation_rejected() {
        let body = b"payload";
        let header = format!("sha256={}", compute_signature("s", body));

        for i in 0..header.len() {
            let original = header.as_bytes()[i];
            let substitute = if original == b'0' { b'1' } else { b'0' };
            let case_flipped = if original.is_ascii_lowercase() {
                original.to_ascii_uppercase()
            } else {
                original.to_ascii_lowercase()
            };

            for replacement in [substitute, case_flipped] {
                if replacement == original {
                    continue;
                }
                let mut mutated = header.clone().into_bytes();
                mutated[i] = replacement;
                let mutated = String::from_utf8(mutated).unwrap();
                assert!(!verify_signature("s", body, &mutated), "byte {i}: {mutated}");
            }
        }
    }

    #[test]
    fn test_uppercase_digest_rejected() {
        let body = b"payload";
        let signature = compute_signature("s", body);
        assert!(!verify_signature("s", body, &signature.to_ascii_uppercase()));
        assert!(!verify_signature(
            "s",
            body,
            &format!("sha256={}", signature.to_ascii_uppercase())
        ));
    }

    #[test]
    fn test_surrounding_whitespace_rejected() {
        let body = b"payload";
        let header = format!("sha256={}", compute_signature("s", body));
        assert!(verify_signature("s", body, &header));
        assert!(!verify_signature("s", body, &format!(" {header}")));
        assert!(!verify_signature("s", body, &format!("{header}\n")));
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let body = b"payload";
        let signature = compute_signature("s", body);
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("s", body, "not-hex"));
        assert!(!verify_signature("s", body, ""));
        assert!(!verify_signature("s", body, &signature[..32]));
    }
}
