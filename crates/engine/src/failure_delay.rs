// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure-delay queue (spec.md §4.4): every `FAIL` reply is held for a
//! fixed interval (default 2s) before being sent, to slow down password
//! guessing. Because the delay is the same fixed duration for every
//! entry, insertion order already is deadline order — a `VecDeque` with
//! `pop_front` while the head is due is sufficient, no `BinaryHeap`
//! needed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use authd_core::{ConnectionId, RequestId};
use authd_wire::ClientReply;
use parking_lot::Mutex;

/// A `FAIL` (or `MECH`/`OK`, in principle — only `FAIL` is enqueued per
/// spec.md §4.4) reply waiting to be written back to its connection.
pub struct DelayedReply {
    pub connection: ConnectionId,
    pub request_id: RequestId,
    pub reply: ClientReply,
}

struct Entry {
    at: Instant,
    delayed: DelayedReply,
}

pub struct FailureDelayQueue {
    delay: Duration,
    entries: Mutex<VecDeque<Entry>>,
}

impl FailureDelayQueue {
    pub fn new(delay: Duration) -> FailureDelayQueue {
        FailureDelayQueue { delay, entries: Mutex::new(VecDeque::new()) }
    }

    /// Enqueues a reply to be released `self.delay` from `now`.
    pub fn push(&self, now: Instant, delayed: DelayedReply) {
        self.entries.lock().push_back(Entry { at: now + self.delay, delayed });
    }

    /// Removes and returns every entry whose deadline has passed as of
    /// `now`. Called from the daemon's timer tick.
    pub fn drain_ready(&self, now: Instant) -> Vec<DelayedReply> {
        let mut entries = self.entries.lock();
        let mut ready = Vec::new();
        loop {
            match entries.front() {
                Some(front) if front.at <= now => {
                    if let Some(entry) = entries.pop_front() {
                        ready.push(entry.delayed);
                    }
                }
                _ => break,
            }
        }
        ready
    }

    /// Deadline of the earliest pending entry, for sizing the next sleep
    /// in the daemon's timer loop.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.lock().front().map(|e| e.at)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authd_wire::ClientReply;

    fn reply(id: u32) -> DelayedReply {
        DelayedReply {
            connection: authd_core::ConnectionId::generator().next(),
            request_id: RequestId(id),
            reply: ClientReply::Fail { id: RequestId(id), fields: Vec::new() },
        }
    }

    #[test]
    fn entries_drain_in_fifo_order_once_due() {
        let queue = FailureDelayQueue::new(Duration::from_secs(2));
        let t0 = Instant::now();
        queue.push(t0, reply(1));
        queue.push(t0, reply(2));

        assert!(queue.drain_ready(t0).is_empty());
        let ready = queue.drain_ready(t0 + Duration::from_secs(2));
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].request_id, RequestId(1));
        assert_eq!(ready[1].request_id, RequestId(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn next_deadline_reflects_earliest_entry() {
        let queue = FailureDelayQueue::new(Duration::from_secs(2));
        assert!(queue.next_deadline().is_none());
        let t0 = Instant::now();
        queue.push(t0, reply(1));
        assert_eq!(queue.next_deadline(), Some(t0 + Duration::from_secs(2)));
    }

    proptest::proptest! {
        // spec.md §8 invariant 2: a FAIL response is never observed before
        // the configured delay has elapsed since submission.
        #[test]
        fn drain_never_releases_before_configured_delay(
            delay_ms in 1u64..5_000,
            elapsed_ms in 0u64..10_000,
        ) {
            let queue = FailureDelayQueue::new(Duration::from_millis(delay_ms));
            let t0 = Instant::now();
            queue.push(t0, reply(1));

            let observed_at = t0 + Duration::from_millis(elapsed_ms);
            let drained = !queue.drain_ready(observed_at).is_empty();
            prop_assert_eq!(drained, elapsed_ms >= delay_ms);
        }
    }
}
