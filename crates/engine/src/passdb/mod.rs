// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Passdb trait and registry (spec.md §3/§4.4). Concrete SQL/LDAP/passwd
//! backends are a Non-goal (spec.md §1); this module provides the trait,
//! an in-memory non-blocking reference passdb, and a worker-routed
//! blocking fake used to exercise spec.md §4.5's dispatch path in tests.

mod memory;
mod worker;

use std::collections::HashMap;

pub use memory::MemoryPassdb;
pub use worker::WorkerPassdb;

use crate::error::PassdbError;

/// Outcome of a passdb lookup, matching `original_source/src/auth/
/// passdb-sql.c`'s `sql_query_callback` result shape exactly:
/// OK / unknown user / password mismatch / scheme failure all collapse
/// into `Mismatch` here since the mechanism contract only distinguishes
/// "credential accepted" from "not" (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassdbResult {
    Ok { extra: Vec<(String, String)> },
    Mismatch,
    UserUnknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub scheme: String,
    pub encoded: String,
}

/// Pluggable credential source. `is_blocking` selects worker-pool dispatch
/// vs. inline execution (spec.md §4.5).
#[async_trait::async_trait]
pub trait Passdb: Send + Sync {
    fn kind(&self) -> &'static str;

    fn is_blocking(&self) -> bool;

    /// Verifies a plaintext password directly (PLAIN, LOGIN, ANONYMOUS).
    async fn verify_plain(&self, user: &str, password: &str) -> Result<PassdbResult, PassdbError>;

    /// Looks up the stored credential for challenge/response mechanisms
    /// (CRAM-MD5) without checking it — the request handler does the
    /// comparison using the mechanism's own math.
    async fn lookup_credentials(&self, user: &str) -> Result<Option<StoredCredential>, PassdbError>;
}

pub struct PassdbRegistry {
    backends: HashMap<&'static str, Box<dyn Passdb>>,
    order: Vec<&'static str>,
}

impl PassdbRegistry {
    pub fn new() -> PassdbRegistry {
        PassdbRegistry { backends: HashMap::new(), order: Vec::new() }
    }

    pub fn register(&mut self, passdb: Box<dyn Passdb>) {
        let kind = passdb.kind();
        self.order.push(kind);
        self.backends.insert(kind, passdb);
    }

    /// The first registered backend is the primary one consulted per
    /// request; spec.md §3 does not require chained passdb fallback, so a
    /// single active backend is all the contract needs.
    pub fn primary(&self) -> Option<&dyn Passdb> {
        self.order.first().and_then(|k| self.backends.get(k)).map(|b| b.as_ref())
    }
}

impl Default for PassdbRegistry {
    fn default() -> Self {
        Self::new()
    }
}
