// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Id types used across the workspace.
//!
//! `RequestId` is wire-visible (it is the `<id>` field in every client- and
//! master-protocol line) and must round-trip through a plain `u32`.
//! `ConnectionId` and `WorkerTag` never cross the wire to a mail client; they
//! exist purely for log correlation and worker request matching.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Request id as carried on the client/master protocol wire. Unique only
/// within the connection that issued it — reuse of an active id is a
/// protocol error (see `authd-engine::handler`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(RequestId)
    }
}

/// Process-local, monotonically increasing id for an accepted connection.
/// Used only in log fields; never serialized to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generator for connection ids, one per listener set.
    pub fn generator() -> ConnectionIdGen {
        ConnectionIdGen::default()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Default)]
pub struct ConnectionIdGen(AtomicU64);

impl ConnectionIdGen {
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Monotonically increasing tag used to match a worker-protocol reply
/// (`<tag>\t<result>...`) to its request, per spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerTag(pub u32);

impl fmt::Display for WorkerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkerTag {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(WorkerTag)
    }
}

#[derive(Default)]
pub struct WorkerTagGen(AtomicU32);

impl WorkerTagGen {
    pub fn next(&self) -> WorkerTag {
        WorkerTag(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_generator_is_monotonic_and_unique() {
        let gen = ConnectionIdGen::default();
        let a = gen.next();
        let b = gen.next();
        assert_ne!(a, b);
        assert_eq!(format!("{a}"), "conn-0");
        assert_eq!(format!("{b}"), "conn-1");
    }

    #[test]
    fn request_id_round_trips_through_display_and_parse() {
        let id = RequestId(42);
        let parsed: RequestId = format!("{id}").parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn worker_tag_generator_is_monotonic() {
        let gen = WorkerTagGen::default();
        assert_eq!(gen.next(), WorkerTag(0));
        assert_eq!(gen.next(), WorkerTag(1));
    }
}
