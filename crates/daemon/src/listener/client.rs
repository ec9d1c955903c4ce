// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection client protocol task (spec.md §4.4, §4.7).
//!
//! State machine: a greeting (`VERSION` + `MECH` lines) is sent first, the
//! client must answer with a compatible `VERSION` before anything else is
//! accepted, and from then on `AUTH`/`CONT`/`CANCEL` lines are dispatched to
//! a per-connection `ConnectionHandler` until the peer disconnects or an
//! inactivity timeout / protocol error ends the connection.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use authd_core::{ConnectionId, RequestId};
use authd_wire::{read_line, write_line, ClientLine, ClientReply, Version, SERVER_VERSION};
use authd_engine::{ConnectionHandler, HandlerOutcome};

use super::{ConnectionError, ListenCtx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    AwaitingVersion,
    Ready,
}

pub(crate) async fn handle(
    stream: UnixStream,
    id: ConnectionId,
    ctx: Arc<ListenCtx>,
) -> Result<(), ConnectionError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut delayed = ctx.register(id);

    let greeting = greeting_lines(&ctx.runtime);
    write_line(&mut write_half, &greeting, ctx.inactivity_timeout).await?;

    let mut state = ConnectionState::AwaitingVersion;
    let mut handler = ConnectionHandler::new(id);

    let result = loop {
        tokio::select! {
            biased;
            reply = delayed.recv() => {
                let Some(reply) = reply else { continue };
                if write_line(&mut write_half, &reply.to_line(), ctx.inactivity_timeout).await.is_err() {
                    break Ok(());
                }
            }
            line = read_line(&mut reader, ctx.inactivity_timeout) => {
                match line {
                    Ok(line) => {
                        if let Err(e) = process_line(&ctx, &mut state, &mut handler, &mut write_half, id, &line).await {
                            break Err(e);
                        }
                    }
                    Err(e) => break Err(e.into()),
                }
            }
        }
    };

    ctx.deregister(id);
    let _ = write_half.shutdown().await;
    result
}

fn greeting_lines(runtime: &authd_engine::Runtime) -> String {
    let mut lines = SERVER_VERSION.to_line();
    for mechanism in runtime.mechanisms.iter() {
        let flags = mechanism.flags().names().into_iter().map(str::to_string).collect();
        lines.push_str(&ClientReply::Mech { name: mechanism.name().to_string(), flags }.to_line());
    }
    lines
}

async fn process_line(
    ctx: &ListenCtx,
    state: &mut ConnectionState,
    handler: &mut ConnectionHandler,
    write_half: &mut tokio::net::unix::OwnedWriteHalf,
    id: ConnectionId,
    line: &str,
) -> Result<(), ConnectionError> {
    if *state == ConnectionState::AwaitingVersion {
        let client_version = Version::parse_line(line)?;
        client_version.check_compatible(SERVER_VERSION)?;
        *state = ConnectionState::Ready;
        return Ok(());
    }

    let parsed = ClientLine::parse(line)?;
    let now = Instant::now();
    if let Some(outcome) = dispatch(ctx, handler, now, parsed).await? {
        match outcome {
            HandlerOutcome::Reply(reply) => {
                write_line(write_half, &reply.to_line(), ctx.inactivity_timeout).await?;
            }
            HandlerOutcome::Delayed => {}
        }
    }
    tracing::debug!(%id, "processed client line");
    Ok(())
}

/// `None` means no reply is owed at all — `CANCEL` is fire-and-forget
/// (spec.md §4.4: the handler just drops the in-flight request).
async fn dispatch(
    ctx: &ListenCtx,
    handler: &mut ConnectionHandler,
    now: Instant,
    line: ClientLine,
) -> Result<Option<HandlerOutcome>, ConnectionError> {
    match line {
        ClientLine::Auth { id, mechanism, fields, .. } => {
            deadline_race(ctx, id, handler.handle_auth(&ctx.runtime, now, id, &mechanism, &fields)).await.map(Some)
        }
        ClientLine::Cont { id, data } => {
            deadline_race(ctx, id, handler.handle_cont(&ctx.runtime, now, id, &data)).await.map(Some)
        }
        ClientLine::Cancel { id } => {
            handler.handle_cancel(id);
            Ok(None)
        }
    }
}

/// Races a passdb-bound handler call against spec.md §4.4's request
/// deadline; a timeout yields an immediate `TEMPFAIL`-flavored `FAIL`
/// rather than going through the failure-delay queue, since the backend
/// itself — not the credential — is what's at fault.
async fn deadline_race(
    ctx: &ListenCtx,
    id: RequestId,
    fut: impl std::future::Future<Output = Result<HandlerOutcome, authd_wire::ProtocolError>>,
) -> Result<HandlerOutcome, ConnectionError> {
    match tokio::time::timeout(ctx.request_deadline, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Ok(HandlerOutcome::Reply(ClientReply::Fail {
            id,
            fields: vec![("temp".to_string(), "1".to_string())],
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use authd_engine::{MemoryPassdb, PassdbRegistry, Runtime, RuntimeConfig};
    use authd_wire::ProtocolError;
    use tokio::io::AsyncBufReadExt;

    fn test_ctx() -> Arc<ListenCtx> {
        let mut passdbs = PassdbRegistry::new();
        let memory = MemoryPassdb::new();
        memory.insert("alice", "secret");
        passdbs.register(Box::new(memory));
        let runtime = Runtime::new(passdbs, RuntimeConfig::default());
        Arc::new(ListenCtx {
            runtime: Arc::new(runtime),
            connection_ids: authd_core::ConnectionId::generator(),
            request_deadline: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(5),
            shutdown: tokio_util::sync::CancellationToken::new(),
            reply_routes: parking_lot::Mutex::new(std::collections::HashMap::new()),
        })
    }

    async fn read_line(reader: &mut (impl tokio::io::AsyncBufRead + Unpin)) -> String {
        let mut buf = String::new();
        reader.read_line(&mut buf).await.unwrap();
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        buf
    }

    #[tokio::test]
    async fn greeting_then_plain_success() {
        let ctx = test_ctx();
        let id = ctx.connection_ids.next();
        let (daemon_side, client_side) = UnixStream::pair().unwrap();
        tokio::spawn(handle(daemon_side, id, Arc::clone(&ctx)));

        let (read_half, mut write_half) = client_side.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        assert_eq!(read_line(&mut reader).await, "VERSION\t1\t1");
        let mut mech_lines = Vec::new();
        for _ in 0..7 {
            mech_lines.push(read_line(&mut reader).await);
        }
        assert!(mech_lines.iter().any(|l| l.starts_with("MECH\tPLAIN\t") && l.contains("PLAINTEXT")));

        write_line(&mut write_half, &Version { major: 1, minor: 0 }.to_line(), Duration::from_secs(1))
            .await
            .unwrap();

        let resp = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"\0alice\0secret");
        let auth_line = format!("AUTH\t1\tPLAIN\timap\tresp={resp}\n");
        write_line(&mut write_half, &auth_line, Duration::from_secs(1)).await.unwrap();

        let reply = read_line(&mut reader).await;
        assert!(reply.starts_with("OK\t1"), "unexpected reply: {reply}");
    }

    #[tokio::test]
    async fn incompatible_major_version_ends_connection() {
        let ctx = test_ctx();
        let id = ctx.connection_ids.next();
        let (daemon_side, client_side) = UnixStream::pair().unwrap();
        let task = tokio::spawn(handle(daemon_side, id, Arc::clone(&ctx)));

        let (read_half, mut write_half) = client_side.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);
        for _ in 0..8 {
            read_line(&mut reader).await;
        }

        write_line(&mut write_half, &Version { major: 99, minor: 0 }.to_line(), Duration::from_secs(1))
            .await
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::Protocol(ProtocolError::VersionMismatch { .. }))));
    }

    #[tokio::test]
    async fn cancel_produces_no_reply() {
        let ctx = test_ctx();
        let id = ctx.connection_ids.next();
        let (daemon_side, client_side) = UnixStream::pair().unwrap();
        tokio::spawn(handle(daemon_side, id, Arc::clone(&ctx)));

        let (read_half, mut write_half) = client_side.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);
        for _ in 0..8 {
            read_line(&mut reader).await;
        }
        write_line(&mut write_half, &Version { major: 1, minor: 0 }.to_line(), Duration::from_secs(1))
            .await
            .unwrap();

        write_line(&mut write_half, "AUTH\t1\tLOGIN\timap\n", Duration::from_secs(1)).await.unwrap();
        let cont = read_line(&mut reader).await;
        assert!(cont.starts_with("CONT\t1"));

        write_line(&mut write_half, "CANCEL\t1\n", Duration::from_secs(1)).await.unwrap();

        // Confirm the connection is still alive and answers a fresh AUTH;
        // CANCEL must not have produced a reply line of its own.
        write_line(
            &mut write_half,
            &format!(
                "AUTH\t2\tPLAIN\timap\tresp={}\n",
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"\0alice\0secret")
            ),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        let reply = read_line(&mut reader).await;
        assert!(reply.starts_with("OK\t2"), "unexpected reply: {reply}");
    }
}
