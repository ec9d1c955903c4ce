// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Privilege manager (spec.md §4.1), recovered in detail from
//! `original_source/src/auth/main.c`'s `create_unix_listener` and
//! `drop_privileges`.
//!
//! Phase ordering is load-bearing: logging and the random source are
//! opened first (so every later phase may log and consume randomness),
//! listener sockets are created and chowned while still root, and
//! `restrict_access` — the chroot/setuid/setgid step — runs last.
//! `PrivilegeManager::drop_privileges` consumes `self`, so once it
//! returns there is no handle left in scope that could reach a
//! root-only syscall.
//!
//! `inherit_listener`/`inherit_stream` take ownership of fds the
//! supervisor is trusted to have set up correctly before exec, the same
//! trust boundary `authd-workers::spawn` relies on for `WORKER_SERVER_FD`.

#![allow(unsafe_code)]

use std::os::fd::FromRawFd;
use std::path::PathBuf;

use nix::sys::stat::{umask, Mode};
use nix::unistd::{Gid, Group, User};
use tokio::net::{UnixListener, UnixStream};

use crate::env::{ListenerSpec, RestrictAccess};

use super::{Config, LifecycleError};

/// Fixed fd the supervisor connects before exec when running
/// non-standalone (spec.md §6), mirroring the `WORKER_SERVER_FD`
/// convention used for worker subprocesses.
pub const MASTER_SOCKET_FD: i32 = 3;
/// Fixed fd carrying the pre-bound client listener in non-standalone mode.
pub const CLIENT_LISTEN_FD: i32 = 4;

/// The bound listener sockets handed back once privileges have been
/// dropped. Nothing in this type can be used to reopen a privileged
/// resource.
pub struct ListenerSet {
    pub client: Vec<(UnixListener, Option<PathBuf>)>,
    pub master: Vec<(UnixListener, Option<PathBuf>)>,
    /// The single pre-connected master channel inherited from the
    /// supervisor in non-standalone mode (spec.md §6). `None` in
    /// standalone mode, where master access (if any) comes only through
    /// `AUTH_<n>_MASTER` listeners.
    pub master_connection: Option<UnixStream>,
}

pub struct PrivilegeManager {
    config: Config,
}

impl PrivilegeManager {
    pub fn new(config: Config) -> PrivilegeManager {
        PrivilegeManager { config }
    }

    /// Runs phases (e) and (f) of spec.md §4.1. Phases (a)-(d) — logging,
    /// random source, passdb preinit, scheme registry init — have no
    /// privileged filesystem side effects in this implementation (no
    /// concrete passdb backend opens a root-only config file) and are
    /// performed by `main` before this call, matching the ordering
    /// constraint without a dedicated no-op phase object.
    pub fn drop_privileges(self) -> Result<ListenerSet, LifecycleError> {
        let mut client = Vec::with_capacity(self.config.client_listeners.len() + 1);
        for spec in &self.config.client_listeners {
            client.push((create_unix_listener(spec)?, Some(spec.path.clone())));
        }

        let mut master = Vec::with_capacity(self.config.master_listeners.len());
        for spec in &self.config.master_listeners {
            master.push((create_unix_listener(spec)?, Some(spec.path.clone())));
        }

        let master_connection = if self.config.standalone {
            None
        } else {
            client.push((inherit_listener(CLIENT_LISTEN_FD)?, None));
            Some(inherit_stream(MASTER_SOCKET_FD)?)
        };

        restrict_access(&self.config.restrict)?;

        Ok(ListenerSet { client, master, master_connection })
    }
}

/// Creates one listener socket per spec.md §4.1 (e): bind with the
/// inverted-mode umask trick, retrying up to 5 times if an existing path
/// turns out to be stale (`connect` refused).
fn create_unix_listener(spec: &ListenerSpec) -> Result<UnixListener, LifecycleError> {
    let mask = (spec.mode ^ 0o777) & 0o777;
    let new_mask = Mode::from_bits_truncate(mask);
    let old_mask = umask(new_mask);

    let mut bound = None;
    for _ in 0..5 {
        match std::os::unix::net::UnixListener::bind(&spec.path) {
            Ok(listener) => {
                bound = Some(listener);
                break;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                match std::os::unix::net::UnixStream::connect(&spec.path) {
                    Err(ref connect_err) if connect_err.kind() == std::io::ErrorKind::ConnectionRefused => {
                        std::fs::remove_file(&spec.path)?;
                        continue;
                    }
                    _ => {
                        umask(old_mask);
                        return Err(LifecycleError::StaleSocketLivePeer(spec.path.clone()));
                    }
                }
            }
            Err(e) => {
                umask(old_mask);
                return Err(e.into());
            }
        }
    }
    umask(old_mask);

    let listener = bound.ok_or_else(|| LifecycleError::StaleSocketLivePeer(spec.path.clone()))?;
    listener.set_nonblocking(true)?;
    chown_listener(&spec.path, spec.user.as_deref(), spec.group.as_deref())?;
    Ok(UnixListener::from_std(listener)?)
}

fn chown_listener(path: &std::path::Path, user: Option<&str>, group: Option<&str>) -> Result<(), LifecycleError> {
    let uid = match user {
        Some(name) => Some(
            User::from_name(name)
                .map_err(LifecycleError::SetId)?
                .ok_or_else(|| LifecycleError::UnknownUser(name.to_string()))?
                .uid,
        ),
        None => None,
    };
    let gid = match group {
        Some(name) => Some(
            Group::from_name(name)
                .map_err(LifecycleError::SetId)?
                .ok_or_else(|| LifecycleError::UnknownGroup(name.to_string()))?
                .gid,
        ),
        None => None,
    };
    if uid.is_some() || gid.is_some() {
        nix::unistd::chown(path, uid, gid).map_err(LifecycleError::SetId)?;
    }
    Ok(())
}

/// Takes ownership of a pre-bound listening socket inherited at a fixed
/// fd number (spec.md §6, non-standalone mode).
fn inherit_listener(fd: i32) -> Result<UnixListener, LifecycleError> {
    // SAFETY: the supervisor guarantees this fd is open and is a bound,
    // listening Unix socket before exec'ing this process; it is not used
    // anywhere else in this process.
    let std_listener = unsafe { std::os::unix::net::UnixListener::from_raw_fd(fd) };
    std_listener.set_nonblocking(true)?;
    Ok(UnixListener::from_std(std_listener)?)
}

/// Takes ownership of a pre-connected stream inherited at a fixed fd
/// number (the master channel, spec.md §6).
fn inherit_stream(fd: i32) -> Result<UnixStream, LifecycleError> {
    // SAFETY: see `inherit_listener`; the supervisor connects this fd
    // before exec.
    let std_stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(fd) };
    std_stream.set_nonblocking(true)?;
    Ok(UnixStream::from_std(std_stream)?)
}

/// Phase (f): the last privileged step. Chroots (if configured), joins
/// supplementary groups, then drops to the unprivileged gid and uid in
/// that order — setgid before setuid, since setuid discards the
/// privilege setgid would otherwise need.
fn restrict_access(restrict: &RestrictAccess) -> Result<(), LifecycleError> {
    let gid = restrict
        .gid
        .as_deref()
        .map(|name| {
            Group::from_name(name)
                .map_err(LifecycleError::SetId)?
                .ok_or_else(|| LifecycleError::UnknownGroup(name.to_string()))
                .map(|g| g.gid)
        })
        .transpose()?;
    let uid = restrict
        .uid
        .as_deref()
        .map(|name| {
            User::from_name(name)
                .map_err(LifecycleError::SetId)?
                .ok_or_else(|| LifecycleError::UnknownUser(name.to_string()))
                .map(|u| u.uid)
        })
        .transpose()?;

    if let Some(path) = &restrict.chroot {
        nix::unistd::chroot(path).map_err(|e| LifecycleError::Chroot(path.clone(), e))?;
        nix::unistd::chdir("/").map_err(LifecycleError::SetId)?;
    }

    if !restrict.extra_groups.is_empty() {
        let extra_gids = restrict
            .extra_groups
            .iter()
            .map(|name| {
                Group::from_name(name)
                    .map_err(LifecycleError::SetId)?
                    .ok_or_else(|| LifecycleError::UnknownGroup(name.to_string()))
                    .map(|g| g.gid)
            })
            .collect::<Result<Vec<Gid>, LifecycleError>>()?;
        nix::unistd::setgroups(&extra_gids).map_err(LifecycleError::SetId)?;
    }

    if let Some(gid) = gid {
        nix::unistd::setgid(gid).map_err(LifecycleError::SetId)?;
    }
    if let Some(uid) = uid {
        nix::unistd::setuid(uid).map_err(LifecycleError::SetId)?;
    }

    Ok(())
}
