// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker subprocess creation, recovered from `original_source/src/auth/
//! main.c`'s `worker` global and `WORKER_SERVER_FD` convention: a
//! `socketpair(2)` is created, the current binary is re-exec'd with `-w`,
//! and the inherited half of the pair is `dup2`'d onto the fixed
//! `WORKER_SERVER_FD` the worker-mode entry point expects to find open.
//!
//! The `dup2` happens in a `pre_exec` hook, which runs after `fork()` but
//! before `exec()` in the child — only async-signal-safe calls are valid
//! there, which is the one place in this workspace unsafe code is allowed.

#![allow(unsafe_code)]

use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::process::CommandExt as _;

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use tokio::net::UnixStream;
use tokio::process::Child;

use crate::error::WorkerError;

/// File descriptor number the worker-mode entry point dup2's its end of the
/// socketpair onto before exec, matching `main.c`'s `WORKER_SERVER_FD`.
pub const WORKER_SERVER_FD: i32 = 3;

/// Spawns one worker subprocess: the given binary re-exec'd with `-w` and a
/// connected `UnixStream` back to it.
///
/// `exe` is normally `std::env::current_exe()`; `extra_args` are appended
/// after `-w` (e.g. `--passdb-config <path>`).
pub async fn spawn_worker(
    exe: &std::path::Path,
    extra_args: &[String],
) -> Result<(UnixStream, Child), WorkerError> {
    let (parent_fd, child_fd) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )
    .map_err(|e| WorkerError::SpawnFailed(std::io::Error::from(e)))?;

    let parent_fd: OwnedFd = parent_fd;
    let child_fd: OwnedFd = child_fd;
    let child_raw = child_fd.as_raw_fd();

    let mut cmd = tokio::process::Command::new(exe);
    cmd.arg("-w").args(extra_args);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::null());
    cmd.kill_on_drop(true);

    // SAFETY: the closure runs in the forked child between fork() and
    // exec(), with only this process's memory and no other threads; dup2
    // and close are both async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            nix::unistd::dup2(child_raw, WORKER_SERVER_FD).map_err(std::io::Error::from)?;
            if child_raw != WORKER_SERVER_FD {
                let _ = nix::unistd::close(child_raw);
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(WorkerError::SpawnFailed)?;

    // The parent doesn't need its copy of the child's half; drop it after
    // spawning so a crashed worker's read end reliably sees EOF.
    drop(child_fd);

    let parent_raw = parent_fd.into_raw_fd();
    // SAFETY: parent_raw was just produced by socketpair(2) and has not
    // been given to anyone else; UnixStream takes ownership of it.
    let std_stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(parent_raw) };
    std_stream.set_nonblocking(true).map_err(WorkerError::SpawnFailed)?;
    let stream = UnixStream::from_std(std_stream).map_err(WorkerError::SpawnFailed)?;

    Ok((stream, child))
}
