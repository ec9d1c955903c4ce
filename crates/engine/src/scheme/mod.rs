// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Password scheme registry: decodes a passdb's stored password field and
//! checks a plaintext candidate against it.
//!
//! Recovered from `original_source/src/auth/passdb-sql.c`'s
//! `password_get_scheme` shape: a stored value optionally carries a
//! leading `{SCHEME}` tag; when absent, the passdb's configured default
//! scheme applies. CRYPT-style stored-form parsing is a Non-goal
//! (spec.md §1) — only `PLAIN` and a salted-SHA reference scheme are
//! implemented.

mod plain;
mod salted_sha;

use std::collections::HashMap;

pub use plain::PlainScheme;
pub use salted_sha::SaltedShaScheme;

/// Checks a plaintext candidate against a scheme-encoded stored value.
pub trait PasswordScheme: Send + Sync {
    fn name(&self) -> &'static str;
    fn verify(&self, plaintext: &str, encoded: &str) -> bool;
}

pub struct SchemeRegistry {
    schemes: HashMap<&'static str, Box<dyn PasswordScheme>>,
}

impl SchemeRegistry {
    pub fn new() -> SchemeRegistry {
        let mut registry = SchemeRegistry { schemes: HashMap::new() };
        registry.register(Box::new(PlainScheme));
        registry.register(Box::new(SaltedShaScheme));
        registry
    }

    pub fn register(&mut self, scheme: Box<dyn PasswordScheme>) {
        self.schemes.insert(scheme.name(), scheme);
    }

    pub fn get(&self, name: &str) -> Option<&dyn PasswordScheme> {
        self.schemes.get(name).map(|s| s.as_ref())
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a stored password into `({SCHEME}, rest)`. If no `{SCHEME}` tag is
/// present, falls back to `default_scheme` with the whole string as the
/// encoded value (`password_get_scheme` in `passdb-sql.c`).
pub fn resolve_scheme<'a>(stored: &'a str, default_scheme: &'a str) -> (&'a str, &'a str) {
    if let Some(rest) = stored.strip_prefix('{') {
        if let Some(end) = rest.find('}') {
            return (&rest[..end], &rest[end + 1..]);
        }
    }
    (default_scheme, stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_value_splits_scheme_from_encoded() {
        assert_eq!(resolve_scheme("{SSHA}abc123", "PLAIN"), ("SSHA", "abc123"));
    }

    #[test]
    fn untagged_value_falls_back_to_default_scheme() {
        assert_eq!(resolve_scheme("plaintext-pw", "PLAIN"), ("PLAIN", "plaintext-pw"));
    }

    #[test]
    fn registry_has_plain_and_salted_sha() {
        let registry = SchemeRegistry::new();
        assert!(registry.get("PLAIN").is_some());
        assert!(registry.get("SSHA256").is_some());
        assert!(registry.get("CRYPT").is_none());
    }
}
