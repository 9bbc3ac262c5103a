//! Credential wrapper
//!
//! Upstream API keys travel through config structs that are logged at
//! trace level, so the value never appears in `Debug` or `Display` output.

use std::fmt;

/// A credential value that is redacted when formatted
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw value, for building request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Secret(<empty>)")
        } else {
            write!(f, "Secret(<redacted>)")
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("dd-api-key-123");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("dd-api-key-123"));
        assert_eq!(debug, "Secret(<redacted>)");
        assert_eq!(secret.to_string(), "<redacted>");
    }

    #[test]
    fn test_expose_returns_value() {
        let secret = Secret::from("abc".to_string());
        assert_eq!(secret.expose(), "abc");
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_empty_secret() {
        assert!(Secret::default().is_empty());
        assert!(Secret::new("   ").is_empty());
        assert_eq!(format!("{:?}", Secret::default()), "Secret(<empty>)");
    }
}
