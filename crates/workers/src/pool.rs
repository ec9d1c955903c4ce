// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon-side worker pool: least-loaded dispatch across a fixed set of
//! worker subprocesses, a bounded FIFO overflow queue, and exponential
//! backoff (capped at 1/s) when replacing a crashed worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use authd_core::Clock;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::WorkerError;
use crate::frame::{WorkerOp, WorkerReply};
use crate::handle::WorkerHandle;
use crate::spawn::spawn_worker;

/// Backoff ceiling for worker respawn after a crash (spec.md §4.5).
const MAX_RESPAWN_BACKOFF: Duration = Duration::from_secs(1);

struct PoolState {
    handles: Vec<WorkerHandle>,
    respawn_backoff: Duration,
}

/// Owns a fixed-size set of worker subprocesses and dispatches requests to
/// the least-loaded one, queuing overflow up to `max_queue` pending slots.
pub struct WorkerPool<C: Clock> {
    exe: PathBuf,
    extra_args: Vec<String>,
    target_count: usize,
    max_queue: usize,
    queue_permits: Arc<Semaphore>,
    state: Mutex<PoolState>,
    clock: C,
}

impl<C: Clock> WorkerPool<C> {
    /// Spawns `target_count` workers up front. Fails only if the very first
    /// spawn fails; later crashes are handled by `respawn_one`.
    pub async fn spawn(
        exe: PathBuf,
        extra_args: Vec<String>,
        target_count: usize,
        max_queue: usize,
        clock: C,
    ) -> Result<WorkerPool<C>, WorkerError> {
        let mut handles = Vec::with_capacity(target_count);
        for _ in 0..target_count {
            handles.push(spawn_one(&exe, &extra_args).await?);
        }
        Ok(WorkerPool {
            exe,
            extra_args,
            target_count,
            max_queue,
            queue_permits: Arc::new(Semaphore::new(max_queue)),
            state: Mutex::new(PoolState { handles, respawn_backoff: Duration::from_millis(10) }),
            clock,
        })
    }

    /// Dispatches one request to the least-loaded live worker. If every
    /// worker is saturated and the overflow queue is full, returns
    /// `WorkerError::QueueFull` and the caller should reply `TEMPFAIL`
    /// immediately (spec.md §4.5).
    pub async fn dispatch(&self, op: WorkerOp, fields: Vec<String>) -> Result<WorkerReply, WorkerError> {
        let permit = self
            .queue_permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| WorkerError::QueueFull)?;

        let handle = self.least_loaded().ok_or(WorkerError::WorkerGone)?;
        let result = handle.dispatch(op, fields).await;
        drop(permit);

        match result {
            Ok(reply) => Ok(reply),
            Err(WorkerError::WorkerGone) => {
                self.respawn(handle.pid()).await;
                Ok(WorkerReply::tempfail(authd_core::WorkerTag(0)))
            }
            Err(e) => Err(e),
        }
    }

    fn least_loaded(&self) -> Option<WorkerHandle> {
        let state = self.state.lock();
        state.handles.iter().min_by_key(|h| h.active_count()).cloned()
    }

    /// Replaces a crashed worker, backing off exponentially (capped at 1s)
    /// between consecutive respawn attempts.
    async fn respawn(&self, dead_pid: i32) {
        let backoff = {
            let mut state = self.state.lock();
            state.handles.retain(|h| h.pid() != dead_pid);
            state.respawn_backoff = (state.respawn_backoff * 2).min(MAX_RESPAWN_BACKOFF);
            state.respawn_backoff
        };

        tracing::warn!(pid = dead_pid, backoff_ms = backoff.as_millis() as u64, "respawning worker");
        tokio::time::sleep(backoff).await;

        match spawn_one(&self.exe, &self.extra_args).await {
            Ok(handle) => {
                let new_pid = handle.pid();
                let mut state = self.state.lock();
                state.handles.push(handle);
                state.respawn_backoff = Duration::from_millis(10);
                tracing::info!(pid = new_pid, "worker respawned");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to respawn worker");
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Exposed so callers building request-scoped deadlines (spec.md §4.4)
    /// share the same clock as the pool, rather than reading the system
    /// clock directly — this is what makes deadline tests controllable via
    /// `FakeClock`.
    pub fn now(&self) -> std::time::Instant {
        self.clock.now()
    }
}

async fn spawn_one(exe: &std::path::Path, extra_args: &[String]) -> Result<WorkerHandle, WorkerError> {
    let (stream, child) = spawn_worker(exe, extra_args).await?;
    let pid = child.id().unwrap_or(0) as i32;
    // The child handle itself is not polled further; a dedicated reaper
    // task collects its exit status so it never becomes a zombie.
    tokio::spawn(reap(child, pid));
    Ok(WorkerHandle::new(stream, pid))
}

async fn reap(mut child: tokio::process::Child, pid: i32) {
    match child.wait().await {
        Ok(status) => tracing::warn!(pid, %status, "worker process exited"),
        Err(e) => tracing::error!(pid, error = %e, "failed to wait on worker process"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authd_core::FakeClock;

    #[test]
    fn backoff_doubles_and_caps_at_one_second() {
        let mut backoff = Duration::from_millis(10);
        for _ in 0..20 {
            backoff = (backoff * 2).min(MAX_RESPAWN_BACKOFF);
        }
        assert_eq!(backoff, MAX_RESPAWN_BACKOFF);
    }

    #[test]
    fn fake_clock_is_usable_in_pool_state() {
        let clock = FakeClock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(1));
        assert!(clock.now() > before);
    }
}
