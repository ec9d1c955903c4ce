// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference passdb: non-blocking, backed by a `HashMap` of
//! scheme-tagged stored passwords. Used by tests and as the reference
//! implementation of the `Passdb` trait (spec.md §1 Non-goals exclude real
//! backends, not the trait contract itself).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::PassdbError;
use crate::scheme::{resolve_scheme, SchemeRegistry};

use super::{Passdb, PassdbResult, StoredCredential};

pub struct MemoryPassdb {
    users: RwLock<HashMap<String, String>>,
    schemes: SchemeRegistry,
    default_scheme: &'static str,
}

impl MemoryPassdb {
    pub fn new() -> MemoryPassdb {
        MemoryPassdb {
            users: RwLock::new(HashMap::new()),
            schemes: SchemeRegistry::new(),
            default_scheme: "PLAIN",
        }
    }

    /// Inserts a user with a stored password value, tagged or untagged
    /// (untagged values fall back to `default_scheme`).
    pub fn insert(&self, user: impl Into<String>, stored: impl Into<String>) {
        self.users.write().insert(user.into(), stored.into());
    }
}

impl Default for MemoryPassdb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Passdb for MemoryPassdb {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn is_blocking(&self) -> bool {
        false
    }

    async fn verify_plain(&self, user: &str, password: &str) -> Result<PassdbResult, PassdbError> {
        let stored = self.users.read().get(user).cloned();
        let Some(stored) = stored else {
            return Ok(PassdbResult::UserUnknown);
        };
        let (scheme_name, encoded) = resolve_scheme(&stored, self.default_scheme);
        let Some(scheme) = self.schemes.get(scheme_name) else {
            return Err(PassdbError::Tempfail(format!("unknown scheme {scheme_name:?}")));
        };
        if scheme.verify(password, encoded) {
            Ok(PassdbResult::Ok { extra: Vec::new() })
        } else {
            Ok(PassdbResult::Mismatch)
        }
    }

    async fn lookup_credentials(&self, user: &str) -> Result<Option<StoredCredential>, PassdbError> {
        let stored = self.users.read().get(user).cloned();
        Ok(stored.map(|s| {
            let (scheme, encoded) = resolve_scheme(&s, self.default_scheme);
            StoredCredential { scheme: scheme.to_string(), encoded: encoded.to_string() }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifies_plaintext_stored_password() {
        let passdb = MemoryPassdb::new();
        passdb.insert("alice", "secret");
        assert_eq!(
            passdb.verify_plain("alice", "secret").await.unwrap(),
            PassdbResult::Ok { extra: Vec::new() }
        );
        assert_eq!(passdb.verify_plain("alice", "wrong").await.unwrap(), PassdbResult::Mismatch);
    }

    #[tokio::test]
    async fn unknown_user_is_reported_distinctly() {
        let passdb = MemoryPassdb::new();
        assert_eq!(passdb.verify_plain("ghost", "x").await.unwrap(), PassdbResult::UserUnknown);
    }

    #[tokio::test]
    async fn lookup_credentials_resolves_scheme_tag() {
        let passdb = MemoryPassdb::new();
        passdb.insert("alice", "{SSHA256}abc");
        let cred = passdb.lookup_credentials("alice").await.unwrap().unwrap();
        assert_eq!(cred.scheme, "SSHA256");
        assert_eq!(cred.encoded, "abc");
    }
}
