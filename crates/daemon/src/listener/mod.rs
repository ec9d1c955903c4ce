// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener set & event loop (spec.md §4.2). Each accepted connection is
//! spawned as its own task; there is no shared mutable state between them
//! beyond the process-global `Runtime`, so correctness does not depend on
//! single-threaded scheduling (a deliberate REDESIGN from the upstream
//! single-threaded event loop — see DESIGN.md).

mod client;
mod master;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use authd_core::ConnectionId;
use authd_wire::{ClientReply, ProtocolError};

use crate::lifecycle::ListenerSet;

/// Shared, read-only (after startup) context handed to every connection
/// task (spec.md §5's "process-global, read-only after initialization").
pub struct ListenCtx {
    pub runtime: Arc<authd_engine::Runtime>,
    pub connection_ids: authd_core::ConnectionIdGen,
    pub request_deadline: std::time::Duration,
    pub inactivity_timeout: std::time::Duration,
    pub shutdown: CancellationToken,
    /// Where a connection task's delayed `FAIL` replies get delivered once
    /// the timer loop drains the failure-delay queue (spec.md §4.4). A
    /// connection registers itself on accept and deregisters on close;
    /// a `send` against a closed connection is simply dropped.
    pub reply_routes: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<ClientReply>>>,
}

impl ListenCtx {
    pub fn register(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ClientReply> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.reply_routes.lock().insert(id, tx);
        rx
    }

    pub fn deregister(&self, id: ConnectionId) {
        self.reply_routes.lock().remove(&id);
    }

    /// Runs on the timer tick: hands every reply whose delay has elapsed
    /// back to its connection task, if that connection is still alive.
    pub fn deliver_ready_delays(&self, now: std::time::Instant) {
        for delayed in self.runtime.failure_delay.drain_ready(now) {
            let routes = self.reply_routes.lock();
            if let Some(tx) = routes.get(&delayed.connection) {
                let _ = tx.send(delayed.reply);
            }
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

fn log_connection_error(connection: ConnectionId, e: ConnectionError) {
    let ConnectionError::Protocol(err) = e;
    match &err {
        ProtocolError::ConnectionClosed => debug!(%connection, "client disconnected"),
        ProtocolError::Timeout => warn!(%connection, "connection inactivity timeout"),
        // spec.md §7: protocol errors are disconnect-and-log-at-debug unless
        // repeated; this daemon doesn't yet track a per-peer repeat
        // counter, so every occurrence logs at debug.
        ProtocolError::DuplicateRequestId(_) | ProtocolError::MalformedLine(_) => {
            debug!(%connection, error = %err, "protocol error")
        }
        _ => error!(%connection, error = %err, "connection error"),
    }
}

/// Runs all accept loops (client listeners, master listeners, and the
/// single inherited master connection if present) until `ctx.shutdown` is
/// cancelled.
pub async fn run(listeners: ListenerSet, ctx: Arc<ListenCtx>) {
    let mut tasks = Vec::new();

    for (listener, path) in listeners.client {
        let ctx = Arc::clone(&ctx);
        tasks.push(tokio::spawn(accept_client_loop(listener, path, ctx)));
    }
    for (listener, path) in listeners.master {
        let ctx = Arc::clone(&ctx);
        tasks.push(tokio::spawn(accept_master_loop(listener, path, ctx)));
    }
    if let Some(stream) = listeners.master_connection {
        let ctx = Arc::clone(&ctx);
        let id = ctx.connection_ids.next();
        tasks.push(tokio::spawn(run_connection(master::handle(stream, id, Arc::clone(&ctx)), id, ctx)));
    }

    ctx.shutdown.cancelled().await;
    info!("shutdown requested, draining accept loops");
    // Every spawned task already selects on `ctx.shutdown`, so waiting here
    // lets each one finish its own cleanup (unlinking its socket path)
    // instead of aborting it mid-teardown.
    for task in tasks {
        let _ = task.await;
    }
}

async fn accept_client_loop(listener: UnixListener, path: Option<PathBuf>, ctx: Arc<ListenCtx>) {
    loop {
        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => spawn_client(stream, Arc::clone(&ctx)),
                    Err(e) => error!(error = %e, "client accept failed"),
                }
            }
        }
    }
    unlink_path(path);
}

async fn accept_master_loop(listener: UnixListener, path: Option<PathBuf>, ctx: Arc<ListenCtx>) {
    loop {
        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => spawn_master(stream, Arc::clone(&ctx)),
                    Err(e) => error!(error = %e, "master accept failed"),
                }
            }
        }
    }
    unlink_path(path);
}

fn spawn_client(stream: UnixStream, ctx: Arc<ListenCtx>) {
    let id = ctx.connection_ids.next();
    tokio::spawn(run_connection(client::handle(stream, id, Arc::clone(&ctx)), id, ctx));
}

fn spawn_master(stream: UnixStream, ctx: Arc<ListenCtx>) {
    let id = ctx.connection_ids.next();
    tokio::spawn(run_connection(master::handle(stream, id, Arc::clone(&ctx)), id, ctx));
}

/// Races a connection task against process shutdown, since neither
/// `client::handle` nor `master::handle` otherwise watches for it —
/// cancellation here is cooperative, relying on the socket being dropped
/// to unblock the peer rather than forcing the in-flight read/write.
async fn run_connection(
    handle: impl std::future::Future<Output = Result<(), ConnectionError>>,
    id: ConnectionId,
    ctx: Arc<ListenCtx>,
) {
    tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => {}
        result = handle => {
            if let Err(e) = result {
                log_connection_error(id, e);
            }
        }
    }
}

/// Unlinks a listener's socket path on exit (spec.md §4.2); `None` means
/// the listener was inherited from a supervisor and is not ours to remove.
fn unlink_path(path: Option<PathBuf>) {
    if let Some(path) = path {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to unlink listener socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use authd_core::RequestId;
    use authd_engine::{DelayedReply, PassdbRegistry, Runtime, RuntimeConfig};

    fn test_ctx() -> Arc<ListenCtx> {
        let runtime = Runtime::new(PassdbRegistry::new(), RuntimeConfig::default());
        Arc::new(ListenCtx {
            runtime: Arc::new(runtime),
            connection_ids: authd_core::ConnectionId::generator(),
            request_deadline: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(5),
            shutdown: CancellationToken::new(),
            reply_routes: Mutex::new(HashMap::new()),
        })
    }

    #[tokio::test]
    async fn ready_delay_is_delivered_to_registered_connection() {
        let ctx = test_ctx();
        let id = ctx.connection_ids.next();
        let mut rx = ctx.register(id);

        ctx.runtime.failure_delay.push(
            Instant::now() - Duration::from_secs(10),
            DelayedReply {
                connection: id,
                request_id: RequestId(1),
                reply: ClientReply::Fail { id: RequestId(1), fields: Vec::new() },
            },
        );

        ctx.deliver_ready_delays(Instant::now());
        let reply = rx.try_recv().expect("expected a delivered reply");
        assert!(matches!(reply, ClientReply::Fail { id: RequestId(1), .. }));
    }

    #[tokio::test]
    async fn delay_for_deregistered_connection_is_dropped_silently() {
        let ctx = test_ctx();
        let id = ctx.connection_ids.next();
        let mut rx = ctx.register(id);
        ctx.deregister(id);

        ctx.runtime.failure_delay.push(
            Instant::now() - Duration::from_secs(10),
            DelayedReply {
                connection: id,
                request_id: RequestId(1),
                reply: ClientReply::Fail { id: RequestId(1), fields: Vec::new() },
            },
        );

        ctx.deliver_ready_delays(Instant::now());
        assert!(rx.try_recv().is_err());
    }
}
