// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process/privilege lifecycle (spec.md §4.1): assembling `Config` from the
//! environment, then running the privileged phases that open listener
//! sockets before handing off to the unprivileged event loop.

mod privilege;

pub use privilege::{ListenerSet, PrivilegeManager, CLIENT_LISTEN_FD, MASTER_SOCKET_FD};

use std::time::Duration;

use thiserror::Error;

use crate::env::{self, ListenerSpec, LogSink, RestrictAccess};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("socket {0} exists and has a live peer")]
    StaleSocketLivePeer(std::path::PathBuf),

    #[error("{0}: invalid mode")]
    InvalidListenerMode(String),

    #[error("user {0:?} does not exist")]
    UnknownUser(String),

    #[error("group {0:?} does not exist")]
    UnknownGroup(String),

    #[error("chroot({0:?}) failed: {1}")]
    Chroot(std::path::PathBuf, #[source] nix::errno::Errno),

    #[error("failed to drop to unprivileged identity: {0}")]
    SetId(#[source] nix::errno::Errno),

    #[error("standalone mode requires at least one AUTH_1 client listener")]
    NoStandaloneListeners,

    #[error("failed to start worker pool: {0}")]
    WorkerPoolInit(#[from] authd_workers::WorkerError),
}

/// Daemon configuration, assembled once from the environment before any
/// privileged step runs.
pub struct Config {
    pub client_listeners: Vec<ListenerSpec>,
    pub master_listeners: Vec<ListenerSpec>,
    pub standalone: bool,
    pub foreground: bool,
    pub restrict: RestrictAccess,
    pub log_sink: LogSink,
    pub worker_count: usize,
    pub worker_queue_max: usize,
    pub failure_delay: Duration,
    pub request_deadline: Duration,
    pub connection_inactivity_timeout: Duration,
    pub timer_check: Duration,
}

impl Config {
    pub fn load(foreground: bool) -> Result<Config, LifecycleError> {
        let standalone = env::is_standalone();
        let client_listeners = env::client_listeners();
        let master_listeners = env::master_listeners();

        if standalone && client_listeners.is_empty() {
            return Err(LifecycleError::NoStandaloneListeners);
        }

        Ok(Config {
            client_listeners,
            master_listeners,
            standalone,
            foreground,
            restrict: env::restrict_access(),
            log_sink: env::log_sink(),
            worker_count: env::worker_count(),
            worker_queue_max: env::worker_queue_max(),
            failure_delay: env::failure_delay(),
            request_deadline: env::request_deadline(),
            connection_inactivity_timeout: env::connection_inactivity_timeout(),
            timer_check: env::timer_check_ms(),
        })
    }
}
