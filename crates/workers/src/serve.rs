// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-subprocess side of the frame protocol: reads `WorkerRequest`
//! frames from the inherited socket and writes back a `WorkerReply` per
//! request. Generic over the handler so `authd-engine`'s passdb dispatch
//! can plug in without this crate depending on it.

use std::future::Future;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::frame::{WorkerReply, WorkerRequest};

/// Runs the worker side of the protocol until the daemon closes its end.
/// Each frame is handled concurrently; `handler` must be cheap to clone
/// (typically an `Arc`-wrapped passdb registry).
pub async fn serve<H, Fut>(stream: UnixStream, handler: H) -> std::io::Result<()>
where
    H: Fn(WorkerRequest) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = WorkerReply> + Send + 'static,
{
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<WorkerReply>(64);

    let writer_task = tokio::spawn(async move {
        let mut write_half = write_half;
        while let Some(reply) = rx.recv().await {
            if write_half.write_all(reply.to_line().as_bytes()).await.is_err() {
                break;
            }
            if write_half.flush().await.is_err() {
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
        let request = match WorkerRequest::parse(&trimmed) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request frame from daemon");
                continue;
            }
        };
        let handler = handler.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let reply = handler(request).await;
            let _ = tx.send(reply).await;
        });
    }

    drop(tx);
    let _ = writer_task.await;
    Ok(())
}
