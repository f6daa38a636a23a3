//! Error-message sanitization
//!
//! A single redaction pass applied to every string before it enters an
//! error column, log line, or response body. Covers SendGrid-style keys,
//! bearer tokens, and any long opaque token.

use regex::Regex;
use std::sync::OnceLock;

const REDACTED: &str = "[REDACTED]";

/// Stored error messages are capped at this length; raw provider response
/// bodies must never be persisted wholesale.
const MAX_ERROR_LEN: usize = 500;

fn sendgrid_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SG\.[A-Za-z0-9_\-.]{20,}").expect("valid regex"))
}

fn bearer_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Bearer +\S+").expect("valid regex"))
}

fn opaque_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9+/_\-]{32,}={0,2}").expect("valid regex"))
}

/// Redact secret-shaped substrings and cap the length
pub fn sanitize(input: &str) -> String {
    let pass = sendgrid_key().replace_all(input, REDACTED);
    let pass = bearer_token().replace_all(&pass, REDACTED);
    let pass = opaque_token().replace_all(&pass, REDACTED);

    let mut out = pass.into_owned();
    if out.len() > MAX_ERROR_LEN {
        let mut cut = MAX_ERROR_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out
}

/// Whether a string still contains a secret-shaped substring. Used by the
/// property tests over payloads and error columns.
pub fn contains_secret_pattern(input: &str) -> bool {
    sendgrid_key().is_match(input)
        || bearer_token().is_match(input)
        || opaque_token().is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_sendgrid_key() {
        let out = sanitize("provider rejected key SG.abcdefghijklmnop_qrstuvwx.zz");
        assert!(!out.contains("SG."));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn test_redacts_bearer_token() {
        let out = sanitize("401 from https://api: Bearer eyJhbGciOiJIUzI1NiJ9.payload");
        assert!(!out.contains("Bearer ey"));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn test_redacts_long_opaque_token() {
        let token = "a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f8";
        let out = sanitize(&format!("session key {token} is invalid"));
        assert!(!out.contains(token));
    }

    #[test]
    fn test_preserves_ordinary_text() {
        let message = "recipient mailbox does not exist";
        assert_eq!(sanitize(message), message);
    }

    #[test]
    fn test_caps_length() {
        let long = "x ".repeat(600);
        assert!(sanitize(&long).len() <= 500);
    }

    #[test]
    fn test_pattern_detector() {
        assert!(contains_secret_pattern("SG.aaaaaaaaaaaaaaaaaaaaaaaaaa"));
        assert!(contains_secret_pattern("Bearer abc123"));
        assert!(contains_secret_pattern(&"k".repeat(32)));
        assert!(!contains_secret_pattern("plain failure text"));
        assert!(!contains_secret_pattern(&sanitize(&format!(
            "Bearer {}",
            "t".repeat(48)
        ))));
    }
}
