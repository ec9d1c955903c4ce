// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! authd: standalone SASL authentication daemon (spec.md §1, §6).
//!
//! Two-flag interface: `-F` keeps the process in the foreground instead of
//! daemonizing in standalone mode, `-w` re-enters this same binary as a
//! worker subprocess (spec.md §4.5) instead of running the accept loop.

mod env;
mod lifecycle;
mod listener;
mod worker_entry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authd_core::SystemClock;
use authd_engine::{PassdbRegistry, Runtime, RuntimeConfig, WorkerPassdb};
use authd_workers::WorkerPool;

use crate::env::LogSink;
use crate::lifecycle::{Config, LifecycleError, PrivilegeManager};
use crate::listener::ListenCtx;

fn main() -> std::process::ExitCode {
    let mut foreground = false;
    let mut worker_mode = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-F" => foreground = true,
            "-w" => worker_mode = true,
            other => {
                eprintln!("authd: unknown argument {other:?}");
                return std::process::ExitCode::FAILURE;
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("authd: failed to start async runtime: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let outcome = if worker_mode {
        runtime.block_on(worker_entry::run()).map_err(|e| e.to_string())
    } else {
        runtime.block_on(run_daemon(foreground)).map_err(|e| e.to_string())
    };

    match outcome {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("authd: {message}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run_daemon(foreground: bool) -> Result<(), LifecycleError> {
    let config = Config::load(foreground)?;
    let _log_guard = setup_logging(&config);

    info!(standalone = config.standalone, foreground = config.foreground, "authd starting");

    let worker_count = config.worker_count;
    let worker_queue_max = config.worker_queue_max;
    let failure_delay = config.failure_delay;
    let request_deadline = config.request_deadline;
    let connection_inactivity_timeout = config.connection_inactivity_timeout;
    let timer_check = config.timer_check;

    // Listener sockets are opened and chowned while still root; the
    // returned `ListenerSet` is the only thing carried past this point
    // (spec.md §4.1's post-condition — no privileged handle survives).
    let listeners = PrivilegeManager::new(config).drop_privileges()?;
    info!("privileges dropped");

    let exe = std::env::current_exe().map_err(LifecycleError::Io)?;
    let pool = WorkerPool::spawn(exe, Vec::new(), worker_count, worker_queue_max, SystemClock).await?;

    let mut passdbs = PassdbRegistry::new();
    passdbs.register(Box::new(WorkerPassdb::new(pool)));

    let runtime_config = RuntimeConfig { failure_delay, request_deadline, connection_inactivity_timeout };
    let runtime = Arc::new(Runtime::new(passdbs, runtime_config));

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(ListenCtx {
        runtime,
        connection_ids: authd_core::ConnectionId::generator(),
        request_deadline,
        inactivity_timeout: connection_inactivity_timeout,
        shutdown: shutdown.clone(),
        reply_routes: parking_lot::Mutex::new(std::collections::HashMap::new()),
    });

    let timer = tokio::spawn(timer_loop(Arc::clone(&ctx), timer_check, shutdown.clone()));
    let accept = tokio::spawn(listener::run(listeners, Arc::clone(&ctx)));

    wait_for_signal().await;
    shutdown.cancel();

    let _ = accept.await;
    let _ = timer.await;
    info!("authd stopped");
    Ok(())
}

async fn timer_loop(ctx: Arc<ListenCtx>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => ctx.deliver_ready_delays(Instant::now()),
        }
    }
}

async fn wait_for_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

/// Opens the configured logging sink (spec.md §6's `LOG_TO_MASTER`/
/// `USE_SYSLOG`/`LOGFILE`). `LOG_TO_MASTER`/`USE_SYSLOG` transports
/// themselves are out of scope (SPEC_FULL.md §2's ambient-stack notes);
/// both fall back to stderr, matching the upstream behavior when neither
/// a master channel nor syslog is reachable.
fn setup_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &config.log_sink {
        LogSink::File(path) => {
            let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("authd: failed to create log directory: {e}");
            }
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("authd.log"));
            let appender = tracing_appender::rolling::never(parent, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();
            Some(guard)
        }
        LogSink::Master | LogSink::Syslog | LogSink::Stderr => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            None
        }
    }
}
