// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome vocabulary shared by mechanisms, passdbs, and the request handler.

use smol_str::SmolStr;

/// What kind of credential a mechanism or passdb lookup is asking for.
///
/// `Plain` covers mechanisms (PLAIN, LOGIN, ANONYMOUS) that hand the passdb
/// a cleartext password to verify. `Lookup` covers challenge/response
/// mechanisms (CRAM-MD5, DIGEST-MD5) that need the stored credential itself
/// (or a scheme-specific derivation of it) back from the passdb so the
/// mechanism can complete the exchange locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Plain,
    Lookup,
}

/// Final outcome of an auth request, independent of how it was produced
/// (inline passdb call, worker round trip, or mechanism-internal rejection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Passdb confirmed the credential. `user` is the canonical username
    /// (the passdb may have rewritten it); `extra` carries additional
    /// `k=v` fields to surface on the `OK` reply.
    Ok { user: SmolStr, extra: Vec<(SmolStr, SmolStr)> },
    /// Passdb rejected the credential, or the mechanism/connection produced
    /// a definitive negative result. Subject to the failure-delay queue.
    Fail { user: Option<SmolStr>, reason: Option<SmolStr> },
    /// Backend could not be reached in time, or in a usable state (worker
    /// crash, queue overflow, deadline exceeded). Never delayed.
    Tempfail,
    /// Connection closed, or `CANCEL` received, before the request could
    /// complete.
    Aborted,
}

impl Verdict {
    pub fn is_delayed(&self) -> bool {
        matches!(self, Verdict::Fail { .. })
    }
}
