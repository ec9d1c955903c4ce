// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool and frame errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("malformed worker frame: {0:?}")]
    MalformedFrame(String),

    #[error("unknown worker op {0:?}")]
    UnknownOp(String),

    #[error("unknown worker result {0:?}")]
    UnknownResult(String),

    #[error("failed to spawn worker: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("worker pending-request queue is full")]
    QueueFull,

    #[error("worker socket closed with request outstanding")]
    WorkerGone,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
