// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level protocol errors.

use thiserror::Error;

/// A malformed line, duplicate id, or version mismatch. Per spec.md §7 this
/// is always fatal to the connection it occurred on — callers should
/// disconnect rather than try to resynchronize the stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("read timed out")]
    Timeout,

    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("invalid request id {0:?}")]
    InvalidRequestId(String),

    #[error("duplicate request id {0}")]
    DuplicateRequestId(u32),

    #[error("unknown request id {0}")]
    UnknownRequestId(u32),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("version line major mismatch: client={client_major} server={server_major}")]
    VersionMismatch { client_major: u32, server_major: u32 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
