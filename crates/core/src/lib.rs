// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! authd-core: shared types with no I/O.
//!
//! Everything here is reused by every other crate in the workspace: the
//! request/connection id vocabulary, the clock abstraction used to make
//! timers and delays testable, and the small enums (`Verdict`,
//! `CredentialKind`, `MechFlags`) that describe the outcome of an
//! authentication attempt without tying any crate to how that outcome was
//! produced.

pub mod clock;
pub mod flags;
pub mod ids;
pub mod verdict;

pub use clock::{Clock, FakeClock, SystemClock};
pub use flags::MechFlags;
pub use ids::{ConnectionId, ConnectionIdGen, RequestId, WorkerTag, WorkerTagGen};
pub use verdict::{CredentialKind, Verdict};
