use once_cell::sync::Lazy;
use regex::Regex;

/// Input validation and log-masking utilities

// Compile regex patterns once at startup
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Hardcoded and validated - a compile-time constant in practice
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{3,32}$")
        .expect("hardcoded username regex is invalid - fix source code")
});

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate E.164 phone number format (e.g. +14155551234)
pub fn validate_phone(phone: &str) -> bool {
    if !phone.starts_with('+') {
        return false;
    }
    let digits = &phone[1..];
    digits.len() >= 7 && digits.len() <= 15 && digits.chars().all(|c| c.is_ascii_digit())
}

/// Validate username format (3-32 characters, alphanumeric with - and _)
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Mask phone number for logging
pub fn mask_phone(phone: &str) -> String {
    if phone.len() <= 4 {
        return "****".to_string();
    }
    let visible = &phone[phone.len() - 4..];
    format!("****{}", visible)
}

/// Mask email for logging
pub fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let local = &email[..at_pos];
        let domain = &email[at_pos..];
        if local.len() <= 2 {
            format!("**{}", domain)
        } else {
            format!("{}***{}", &local[..1], domain)
        }
    } else {
        "***@***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("user@example.com"));
        assert!(validate_email("test.user+tag@sub.example.co.uk"));
    }

    #[test]
    fn test_invalid_email() {
        assert!(!validate_email(""));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
        assert!(!validate_email("@example.com"));
    }

    #[test]
    fn test_valid_phone() {
        assert!(validate_phone("+14155551234"));
        assert!(validate_phone("+447700900123"));
    }

    #[test]
    fn test_invalid_phone() {
        assert!(!validate_phone("14155551234"));
        assert!(!validate_phone("+1415abc1234"));
        assert!(!validate_phone("+123"));
        assert!(!validate_phone(""));
    }

    #[test]
    fn test_valid_username() {
        assert!(validate_username("alice"));
        assert!(validate_username("user_name-01"));
    }

    #[test]
    fn test_invalid_username() {
        assert!(!validate_username("ab"));
        assert!(!validate_username("has space"));
        assert!(!validate_username(&"x".repeat(33)));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+14155551234"), "****1234");
        assert_eq!(mask_phone("+12"), "****");
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
        assert_eq!(mask_email("ab@example.com"), "**@example.com");
        assert_eq!(mask_email("garbage"), "***@***");
    }
}
