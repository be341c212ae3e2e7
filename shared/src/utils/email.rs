//! E-mail address utilities

use once_cell::sync::Lazy;
use regex::Regex;

// Pragmatic address check: local part, `@`, and a dotted domain
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$").unwrap()
});

/// Longest address accepted (RFC 5321 path limit)
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Normalize an address for use as a lookup key: trimmed and lowercased
pub fn normalize_email(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Check if an address is syntactically acceptable
pub fn is_valid_email(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() || address.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    if address.contains("..") || address.starts_with('.') {
        return false;
    }
    EMAIL_REGEX.is_match(address)
}

/// Mask an address for logs (e.g., j***e@example.com)
pub fn mask_email(address: &str) -> String {
    match address.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let chars: Vec<char> = local.chars().collect();
            let masked_local = if chars.len() <= 2 {
                format!("{}***", chars[0])
            } else {
                format!("{}***{}", chars[0], chars[chars.len() - 1])
            };
            format!("{}@{}", masked_local, domain)
        }
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("jane.doe+signup@mail.example.co.uk"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("jane@@example.com"));
        assert!(!is_valid_email("jane..doe@example.com"));
        assert!(!is_valid_email("jane doe@example.com"));
    }

    #[test]
    fn test_is_valid_email_length_limit() {
        let long_local = "a".repeat(250);
        assert!(!is_valid_email(&format!("{}@example.com", long_local)));
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("jane@example.com"), "j***e@example.com");
        assert_eq!(mask_email("jo@example.com"), "j***@example.com");
        assert_eq!(mask_email("not-an-address"), "***");
    }
}
