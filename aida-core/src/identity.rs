//! Per-user identity token
//!
//! The identity namespaces every stored entry (settings, session id,
//! conversation history). It is a plain hash of the site origin and the
//! username and carries no security meaning.

use serde::{Deserialize, Serialize};
use std::fmt;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Stable token derived from an (origin, username) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Derive the identity for a user on a given site origin.
    ///
    /// Hashes the UTF-16 code units of `"{origin}:{username}"` with the
    /// wrapping 32-bit recurrence `h = h * 31 + unit`, then renders the
    /// absolute value in base 36. The result matches the keys written by
    /// earlier browser builds of the widget.
    pub fn derive(origin: &str, username: &str) -> Self {
        let source = format!("{}:{}", origin, username);
        let hash = source
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
        Self(to_base36(i64::from(hash).unsigned_abs()))
    }

    /// Wrap an already computed token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            UserIdentity::derive("https://erp.example.com", "Administrator").as_str(),
            "942a46"
        );
        assert_eq!(
            UserIdentity::derive("http://localhost:8000", "alice@example.com").as_str(),
            "wweqs4"
        );
        assert_eq!(UserIdentity::derive("", "").as_str(), "1m");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = UserIdentity::derive("https://erp.example.com", "bob");
        let b = UserIdentity::derive("https://erp.example.com", "bob");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "1om6f6");
    }

    #[test]
    fn test_different_users_get_different_tokens() {
        let admin = UserIdentity::derive("https://erp.example.com", "Administrator");
        let bob = UserIdentity::derive("https://erp.example.com", "bob");
        assert_ne!(admin, bob);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }
}
