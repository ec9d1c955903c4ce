// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error layers for the engine crate, one enum per concern (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MechanismError {
    #[error("unknown mechanism {0:?}")]
    UnknownMechanism(String),

    #[error("protocol violation in mechanism {mechanism}: {detail}")]
    ProtocolViolation { mechanism: &'static str, detail: String },

    #[error("mechanism {0} not implemented")]
    NotImplemented(&'static str),
}

#[derive(Debug, Error)]
pub enum PassdbError {
    #[error("passdb i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker dispatch failed: {0}")]
    Worker(#[from] authd_workers::WorkerError),

    #[error("passdb temporarily unavailable: {0}")]
    Tempfail(String),
}

/// Internal invariant violations are fatal per spec.md §7: the top-level
/// `main` logs this and turns it into a `panic!`, which is why
/// `clippy::panic` is allowed only at that one call site.
#[derive(Debug, Error)]
#[error("internal invariant violated: {0}")]
pub struct InvariantError(pub String);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Mechanism(#[from] MechanismError),

    #[error(transparent)]
    Passdb(#[from] PassdbError),

    #[error(transparent)]
    Protocol(#[from] authd_wire::ProtocolError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),
}
