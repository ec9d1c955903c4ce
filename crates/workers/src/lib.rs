// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! authd-workers: the blocking-passdb worker subprocess pool (spec.md
//! §4.5). Owns the frame protocol, subprocess spawning, and least-loaded
//! dispatch; the passdb trait and registry that decide whether a lookup
//! needs a worker at all live in `authd-engine`.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod frame;
mod handle;
mod pool;
mod serve;
mod spawn;

pub use error::WorkerError;
pub use frame::{WorkerOp, WorkerReply, WorkerRequest, WorkerResult};
pub use handle::WorkerHandle;
pub use pool::WorkerPool;
pub use serve::serve;
pub use spawn::{spawn_worker, WORKER_SERVER_FD};
