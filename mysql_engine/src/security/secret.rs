use serde::Deserialize;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A credential wiped from memory when dropped.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret {
    value: String,
}

impl Secret {
    pub fn new(value: String) -> Self {
        Self { value }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expose() {
        let secret = Secret::from("secret password");
        assert_eq!(secret.expose(), "secret password");
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::from("secret password");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }

    #[test]
    fn test_zeroize() {
        let mut secret = Secret::from("sensitive data");
        secret.zeroize();
        assert!(secret.is_empty());
    }

    #[test]
    fn test_unicode() {
        let secret = Secret::from("päss wörd");
        assert_eq!(secret.expose(), "päss wörd");
    }
}
