// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master protocol connection task (spec.md §4.6): a privileged peer asks
//! for user lookups, no SASL state involved.
//!
//! Concrete userdb backends are out of scope (spec.md §1's Non-goals cover
//! passdb and apply equally here), so a lookup is answered by checking
//! whether the primary passdb knows the user at all — `lookup_credentials`
//! returning `Some` stands in for a userdb hit. This is a simplification,
//! not a protocol shortcut: the wire shape (`USER`/`NOTFOUND`/`FAIL`) is
//! unaffected.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::UnixStream;

use authd_core::ConnectionId;
use authd_wire::{read_line, write_line, MasterReply, MasterUserRequest, Version, SERVER_VERSION};

use super::{ConnectionError, ListenCtx};

pub(crate) async fn handle(
    stream: UnixStream,
    id: ConnectionId,
    ctx: Arc<ListenCtx>,
) -> Result<(), ConnectionError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_line(&mut write_half, &SERVER_VERSION.to_line(), ctx.inactivity_timeout).await?;
    let version_line = read_line(&mut reader, ctx.inactivity_timeout).await?;
    Version::parse_line(&version_line)?.check_compatible(SERVER_VERSION)?;

    loop {
        let line = read_line(&mut reader, ctx.inactivity_timeout).await?;
        let request = MasterUserRequest::parse(&line)?;
        let reply = resolve_user(&ctx.runtime, &request).await;
        write_line(&mut write_half, &reply.to_line(), ctx.inactivity_timeout).await?;
        tracing::debug!(%id, user = %request.user, "resolved master user lookup");
    }
}

async fn resolve_user(runtime: &authd_engine::Runtime, request: &MasterUserRequest) -> MasterReply {
    let Some(passdb) = runtime.passdbs.primary() else {
        return MasterReply::Fail { id: request.id };
    };
    match passdb.lookup_credentials(&request.user).await {
        Ok(Some(_)) => MasterReply::User { id: request.id, user: request.user.clone(), fields: Vec::new() },
        Ok(None) => MasterReply::NotFound { id: request.id },
        Err(_) => MasterReply::Fail { id: request.id },
    }
}
