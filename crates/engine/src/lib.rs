// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! authd-engine: SASL mechanism registry, passdb/scheme registries, the
//! per-connection request handler, and the failure-delay queue (spec.md
//! §4.3, §4.4, §5).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod failure_delay;
mod handler;
mod mechanisms;
mod passdb;
mod runtime;
mod scheme;

pub use error::{InvariantError, MechanismError, PassdbError, RuntimeError};
pub use failure_delay::{DelayedReply, FailureDelayQueue};
pub use handler::{ConnectionHandler, HandlerOutcome};
pub use mechanisms::{AuthMethod, MechOutcome, MechStepResult, Mechanism, MechanismRegistry, MechanismState};
pub use passdb::{MemoryPassdb, Passdb, PassdbRegistry, PassdbResult, StoredCredential, WorkerPassdb};
pub use runtime::{Runtime, RuntimeConfig};
pub use scheme::{resolve_scheme, PasswordScheme, PlainScheme, SaltedShaScheme, SchemeRegistry};
