// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-mode entry point (spec.md §4.5): this binary re-exec's itself
//! with `-w`, and a worker process inherits its connected socket at
//! `authd_workers::WORKER_SERVER_FD` rather than listening for anything.
//!
//! Concrete passdb backends are out of scope (spec.md §1), so the worker
//! answers requests against the same in-memory reference store
//! `authd-engine::MemoryPassdb` already provides, seeded with one fixture
//! user — enough to exercise the blocking-dispatch path end to end.

#![allow(unsafe_code)]

use std::os::fd::FromRawFd;
use std::sync::Arc;

use authd_engine::{MemoryPassdb, Passdb as _, PassdbResult};
use authd_workers::{WorkerOp, WorkerReply, WorkerRequest, WorkerResult, WORKER_SERVER_FD};

pub async fn run() -> std::io::Result<()> {
    // SAFETY: the parent (`authd_workers::spawn_worker`) dup2's its end of
    // a socketpair onto this fd before exec; it is not used anywhere else
    // in this process.
    let std_stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(WORKER_SERVER_FD) };
    std_stream.set_nonblocking(true)?;
    let stream = tokio::net::UnixStream::from_std(std_stream)?;

    let passdb = Arc::new(seed_passdb());
    authd_workers::serve(stream, move |request| {
        let passdb = Arc::clone(&passdb);
        async move { handle_request(&passdb, request).await }
    })
    .await
}

fn seed_passdb() -> MemoryPassdb {
    let passdb = MemoryPassdb::new();
    passdb.insert("alice", "secret");
    passdb
}

async fn handle_request(passdb: &MemoryPassdb, request: WorkerRequest) -> WorkerReply {
    match request.op {
        WorkerOp::PassV => {
            let user = request.fields.first().map(String::as_str).unwrap_or("");
            let password = request.fields.get(1).map(String::as_str).unwrap_or("");
            match passdb.verify_plain(user, password).await {
                Ok(PassdbResult::Ok { extra }) => WorkerReply::new(request.tag, WorkerResult::Ok, extra),
                Ok(PassdbResult::Mismatch) => WorkerReply::new(request.tag, WorkerResult::Fail, Vec::new()),
                Ok(PassdbResult::UserUnknown) => WorkerReply::new(request.tag, WorkerResult::NotFound, Vec::new()),
                Err(_) => WorkerReply::tempfail(request.tag),
            }
        }
        WorkerOp::PassL => {
            let user = request.fields.first().map(String::as_str).unwrap_or("");
            match passdb.lookup_credentials(user).await {
                Ok(Some(cred)) => WorkerReply::new(
                    request.tag,
                    WorkerResult::Ok,
                    vec![("scheme".to_string(), cred.scheme), ("encoded".to_string(), cred.encoded)],
                ),
                Ok(None) => WorkerReply::new(request.tag, WorkerResult::NotFound, Vec::new()),
                Err(_) => WorkerReply::tempfail(request.tag),
            }
        }
        // Userdb lookups are answered by the master connection task
        // in-process, not by a worker, in this implementation.
        WorkerOp::User => WorkerReply::new(request.tag, WorkerResult::NotFound, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authd_core::WorkerTag;

    #[tokio::test]
    async fn passv_accepts_correct_password() {
        let passdb = seed_passdb();
        let request = WorkerRequest::new(
            WorkerTag(1),
            WorkerOp::PassV,
            vec!["alice".to_string(), "secret".to_string()],
        );
        let reply = handle_request(&passdb, request).await;
        assert!(matches!(reply.result, WorkerResult::Ok));
    }

    #[tokio::test]
    async fn passv_rejects_wrong_password() {
        let passdb = seed_passdb();
        let request = WorkerRequest::new(
            WorkerTag(1),
            WorkerOp::PassV,
            vec!["alice".to_string(), "wrong".to_string()],
        );
        let reply = handle_request(&passdb, request).await;
        assert!(matches!(reply.result, WorkerResult::Fail));
    }

    #[tokio::test]
    async fn passv_reports_unknown_user() {
        let passdb = seed_passdb();
        let request = WorkerRequest::new(
            WorkerTag(1),
            WorkerOp::PassV,
            vec!["bob".to_string(), "anything".to_string()],
        );
        let reply = handle_request(&passdb, request).await;
        assert!(matches!(reply.result, WorkerResult::NotFound));
    }

    #[tokio::test]
    async fn passl_returns_stored_scheme() {
        let passdb = seed_passdb();
        let request = WorkerRequest::new(WorkerTag(1), WorkerOp::PassL, vec!["alice".to_string()]);
        let reply = handle_request(&passdb, request).await;
        assert!(matches!(reply.result, WorkerResult::Ok));
        assert!(reply.fields.iter().any(|(k, _)| k == "scheme"));
    }

    #[tokio::test]
    async fn user_lookup_is_not_served_by_a_worker() {
        let passdb = seed_passdb();
        let request = WorkerRequest::new(WorkerTag(1), WorkerOp::User, vec!["alice".to_string()]);
        let reply = handle_request(&passdb, request).await;
        assert!(matches!(reply.result, WorkerResult::NotFound));
    }
}
