// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (spec.md
//! §6). The supervisor configures this daemon entirely through the
//! environment; there is no on-disk config file.

use std::path::PathBuf;
use std::time::Duration;

/// One listener's worth of `AUTH_<n>[_MASTER]` + `_MODE`/`_USER`/`_GROUP`.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    pub path: PathBuf,
    pub mode: u32,
    pub user: Option<String>,
    pub group: Option<String>,
}

fn listener_spec(base_var: &str) -> Option<ListenerSpec> {
    let path = std::env::var(base_var).ok()?;
    let mode = std::env::var(format!("{base_var}_MODE"))
        .ok()
        .and_then(|m| u32::from_str_radix(&m, 8).ok())
        .unwrap_or(0o600);
    let user = std::env::var(format!("{base_var}_USER")).ok();
    let group = std::env::var(format!("{base_var}_GROUP")).ok();
    Some(ListenerSpec { path: PathBuf::from(path), mode, user, group })
}

/// Every `AUTH_<n>` client listener, n starting at 1, stopping at the
/// first gap. A one-sided listener (client set, master absent, or vice
/// versa — spec.md §9's Open Question) is permitted: each is collected
/// independently rather than requiring both to be present for a given n.
pub fn client_listeners() -> Vec<ListenerSpec> {
    (1..).map_while(|n| listener_spec(&format!("AUTH_{n}"))).collect()
}

pub fn master_listeners() -> Vec<ListenerSpec> {
    (1..).map_while(|n| listener_spec(&format!("AUTH_{n}_MASTER"))).collect()
}

/// Absence of `DOVECOT_MASTER` means this process was started standalone
/// and owns its own daemonization; its presence means a supervisor created
/// the listening sockets and passed them as inherited fds.
pub fn is_standalone() -> bool {
    std::env::var_os("DOVECOT_MASTER").is_none()
}

/// Where diagnostic output goes (spec.md §6: `LOG_TO_MASTER`, `USE_SYSLOG`,
/// `LOGFILE`). Syslog transport itself is out of scope (SPEC_FULL.md §2);
/// this only selects which sink `main`'s logging setup wires up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Master,
    Syslog,
    File(PathBuf),
    Stderr,
}

pub fn log_sink() -> LogSink {
    if std::env::var_os("LOG_TO_MASTER").is_some() {
        LogSink::Master
    } else if std::env::var_os("USE_SYSLOG").is_some() {
        LogSink::Syslog
    } else if let Some(path) = std::env::var_os("LOGFILE") {
        LogSink::File(PathBuf::from(path))
    } else {
        LogSink::Stderr
    }
}

pub fn info_log_file() -> Option<PathBuf> {
    std::env::var_os("INFOLOGFILE").map(PathBuf::from)
}

/// `strftime`-style timestamp prefix for log lines, or `None` for no
/// timestamp. Passed straight through to whatever formats the sink.
pub fn log_timestamp_format() -> Option<String> {
    std::env::var("LOGSTAMP").ok()
}

/// Restrict-access policy: target identity, optional chroot, and
/// supplementary groups applied as the last privileged step (spec.md
/// §4.1). Variable names are this daemon's own (the upstream fragment
/// names the concept but not its env vars — SPEC_FULL.md §9 Open
/// Question, resolved in DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct RestrictAccess {
    pub uid: Option<String>,
    pub gid: Option<String>,
    pub chroot: Option<PathBuf>,
    pub extra_groups: Vec<String>,
}

pub fn restrict_access() -> RestrictAccess {
    RestrictAccess {
        uid: std::env::var("AUTHD_UID").ok(),
        gid: std::env::var("AUTHD_GID").ok(),
        chroot: std::env::var_os("AUTHD_CHROOT").map(PathBuf::from),
        extra_groups: std::env::var("AUTHD_EXTRA_GROUPS")
            .ok()
            .map(|s| s.split(',').map(str::to_string).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default(),
    }
}

/// Bound on the worker pool's pending-request queue (spec.md §4.5); new
/// ambient config, default 1000.
pub fn worker_queue_max() -> usize {
    env_usize("AUTHD_WORKER_QUEUE_MAX").unwrap_or(1000)
}

/// Number of worker subprocesses to maintain (spec.md §4.5: "typically
/// 1-30, configurable").
pub fn worker_count() -> usize {
    env_usize("AUTHD_WORKER_COUNT").unwrap_or(1)
}

pub fn failure_delay() -> Duration {
    env_millis("AUTHD_FAILURE_DELAY_MS").unwrap_or(Duration::from_secs(2))
}

pub fn request_deadline() -> Duration {
    env_millis("AUTHD_REQUEST_DEADLINE_MS").unwrap_or(Duration::from_secs(30))
}

pub fn connection_inactivity_timeout() -> Duration {
    env_millis("AUTHD_INACTIVITY_TIMEOUT_MS").unwrap_or(Duration::from_secs(60))
}

/// Timer-tick resolution for flushing the failure-delay queue and scanning
/// for idle connections; not spec-named, ambient scheduling knob.
pub fn timer_check_ms() -> Duration {
    env_millis("AUTHD_TIMER_CHECK_MS").unwrap_or(Duration::from_millis(250))
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).map(Duration::from_millis)
}
