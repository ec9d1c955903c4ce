// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single worker subprocess's connection: a framed Unix stream plus a
//! pending-request table keyed by [`WorkerTag`], resolved by a background
//! reader task. Writes go through a dedicated writer task over an mpsc
//! channel so `dispatch` never holds a lock across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use authd_core::{WorkerTag, WorkerTagGen};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};

use crate::error::WorkerError;
use crate::frame::{WorkerReply, WorkerRequest};

type PendingMap = Arc<Mutex<HashMap<WorkerTag, oneshot::Sender<WorkerReply>>>>;

/// A live worker subprocess. Cloning shares the underlying connection and
/// pending-request table, so a handle can be dispatched to concurrently.
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<Inner>,
}

struct Inner {
    outbox: mpsc::Sender<Vec<u8>>,
    pending: PendingMap,
    tags: WorkerTagGen,
    active: AtomicUsize,
    pid: i32,
}

impl WorkerHandle {
    /// Takes ownership of a connected socket to a freshly spawned worker and
    /// starts the background reader and writer tasks.
    pub fn new(stream: UnixStream, pid: i32) -> WorkerHandle {
        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (outbox, outbox_rx) = mpsc::channel::<Vec<u8>>(64);

        tokio::spawn(reader_task(read_half, pending.clone(), pid));
        tokio::spawn(writer_task(write_half, outbox_rx, pid));

        WorkerHandle {
            inner: Arc::new(Inner {
                outbox,
                pending,
                tags: WorkerTagGen::default(),
                active: AtomicUsize::new(0),
                pid,
            }),
        }
    }

    pub fn pid(&self) -> i32 {
        self.inner.pid
    }

    /// Number of requests currently dispatched to this worker and awaiting a
    /// reply. Used by the pool for least-loaded selection.
    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    /// Sends a request and awaits its matching reply. Returns
    /// [`WorkerError::WorkerGone`] if the worker's connection closes before a
    /// reply for this tag arrives.
    pub async fn dispatch(
        &self,
        op: crate::frame::WorkerOp,
        fields: Vec<String>,
    ) -> Result<WorkerReply, WorkerError> {
        let tag = self.inner.tags.next();
        let req = WorkerRequest::new(tag, op, fields);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(tag, tx);
        self.inner.active.fetch_add(1, Ordering::Relaxed);
        let _active = ActiveGuard(&self.inner.active);

        let send_result = self.inner.outbox.send(req.to_line().into_bytes()).await;

        if send_result.is_err() {
            self.inner.pending.lock().remove(&tag);
            return Err(WorkerError::WorkerGone);
        }

        rx.await.map_err(|_| WorkerError::WorkerGone)
    }
}

/// Keeps `Inner::active` counting a request from dispatch until the reply
/// resolves (or the connection drops), not merely until it's enqueued.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn writer_task(
    mut write_half: tokio::net::unix::OwnedWriteHalf,
    mut outbox: mpsc::Receiver<Vec<u8>>,
    pid: i32,
) {
    while let Some(bytes) = outbox.recv().await {
        if let Err(e) = write_half.write_all(&bytes).await {
            tracing::warn!(pid, error = %e, "worker write failed");
            break;
        }
        if let Err(e) = write_half.flush().await {
            tracing::warn!(pid, error = %e, "worker flush failed");
            break;
        }
    }
}

async fn reader_task(read_half: tokio::net::unix::OwnedReadHalf, pending: PendingMap, pid: i32) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::warn!(pid, "worker connection closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                match WorkerReply::parse(trimmed) {
                    Ok(reply) => {
                        if let Some(tx) = pending.lock().remove(&reply.tag) {
                            let _ = tx.send(reply);
                        } else {
                            tracing::warn!(pid, tag = %reply.tag, "reply for unknown tag");
                        }
                    }
                    Err(e) => tracing::warn!(pid, error = %e, "malformed worker reply"),
                }
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "worker connection read error");
                break;
            }
        }
    }
    // Any still-pending requests will see their oneshot sender dropped and
    // surface WorkerError::WorkerGone.
    pending.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{WorkerOp, WorkerReply, WorkerRequest, WorkerResult};
    use tokio::io::{AsyncBufReadExt, BufReader as TokioBufReader};

    #[tokio::test]
    async fn active_count_stays_elevated_until_reply_resolves() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let handle = WorkerHandle::new(ours, 1);
        let mut worker_side = TokioBufReader::new(theirs);

        let dispatch = tokio::spawn({
            let handle = handle.clone();
            async move { handle.dispatch(WorkerOp::PassV, vec!["alice".to_string()]).await }
        });

        let mut line = String::new();
        worker_side.read_line(&mut line).await.unwrap();
        let req = WorkerRequest::parse(line.trim_end()).unwrap();

        // The request has been read by the worker but no reply sent yet:
        // active_count must still reflect it as in flight.
        assert_eq!(handle.active_count(), 1);

        let reply = WorkerReply::new(req.tag, WorkerResult::Ok, Vec::new());
        worker_side.get_mut().write_all(reply.to_line().as_bytes()).await.unwrap();

        let result = dispatch.await.unwrap();
        assert!(matches!(result, Ok(r) if r.result == WorkerResult::Ok));
        assert_eq!(handle.active_count(), 0);
    }
}
