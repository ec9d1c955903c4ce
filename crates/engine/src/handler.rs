// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection request handler arena (spec.md §4.4): tracks in-flight
//! `AuthRequest`s by id, dispatches `AUTH`/`CONT`/`CANCEL`, and decides
//! between an immediate reply and enqueueing on the failure-delay queue.

use std::collections::HashMap;
use std::time::Instant;

use authd_core::{ConnectionId, RequestId};
use authd_wire::{ClientReply, ProtocolError};

use crate::error::PassdbError;
use crate::mechanisms::{AuthMethod, MechOutcome, MechStepResult, MechanismState};
use crate::passdb::{Passdb, PassdbResult};
use crate::runtime::Runtime;

use crate::mechanisms::cram_md5::expected_digest;
use crate::failure_delay::DelayedReply;

struct AuthRequest {
    mechanism: &'static str,
    state: Box<dyn MechanismState>,
    created_at: Instant,
}

/// Result of handling one client-protocol line.
pub enum HandlerOutcome {
    /// Send this line back immediately.
    Reply(ClientReply),
    /// The reply was pushed onto the runtime's failure-delay queue; the
    /// daemon's timer loop will deliver it later.
    Delayed,
}

pub struct ConnectionHandler {
    connection: ConnectionId,
    arena: HashMap<RequestId, AuthRequest>,
}

impl ConnectionHandler {
    pub fn new(connection: ConnectionId) -> ConnectionHandler {
        ConnectionHandler { connection, arena: HashMap::new() }
    }

    pub fn in_flight(&self) -> usize {
        self.arena.len()
    }

    pub async fn handle_auth(
        &mut self,
        runtime: &Runtime,
        now: Instant,
        id: RequestId,
        mechanism: &str,
        fields: &[(String, String)],
    ) -> Result<HandlerOutcome, ProtocolError> {
        if self.arena.contains_key(&id) {
            return Err(ProtocolError::DuplicateRequestId(id.0));
        }

        let mechanism_obj = match runtime.mechanisms.get(mechanism) {
            Ok(m) => m,
            Err(_) => {
                // Unknown mechanism still goes through the failure-delay
                // path (SPEC_FULL.md §7's Open Question resolution).
                return Ok(self.delay_fail(runtime, now, id, Vec::new()));
            }
        };
        let mut state = mechanism_obj.create();

        let resp = fields.iter().find(|(k, _)| k == "resp").map(|(_, v)| v.as_str());
        let step_result = match resp {
            Some(initial) => {
                let initial_bytes =
                    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, initial)
                        .unwrap_or_default();
                state.step(&initial_bytes)
            }
            // No "resp" field at all: server-first mechanisms (LOGIN) get a
            // chance to emit their first prompt instead of having an empty
            // slice mistaken for client input (client-first mechanisms fall
            // back to stepping with an empty slice, same as before).
            None => state.initial(),
        };
        self.dispatch_step(runtime, now, id, mechanism_obj.name(), state, step_result).await
    }

    pub async fn handle_cont(
        &mut self,
        runtime: &Runtime,
        now: Instant,
        id: RequestId,
        data: &[u8],
    ) -> Result<HandlerOutcome, ProtocolError> {
        let Some(mut request) = self.arena.remove(&id) else {
            return Err(ProtocolError::UnknownRequestId(id.0));
        };
        let step_result = request.state.step(data);
        self.dispatch_step(runtime, now, id, request.mechanism, request.state, step_result).await
    }

    pub fn handle_cancel(&mut self, id: RequestId) {
        self.arena.remove(&id);
    }

    async fn dispatch_step(
        &mut self,
        runtime: &Runtime,
        now: Instant,
        id: RequestId,
        mechanism: &'static str,
        state: Box<dyn MechanismState>,
        step_result: MechStepResult,
    ) -> Result<HandlerOutcome, ProtocolError> {
        match step_result {
            MechStepResult::Continue(bytes) => {
                self.arena.insert(id, AuthRequest { mechanism, state, created_at: now });
                Ok(HandlerOutcome::Reply(ClientReply::Cont { id, data: bytes }))
            }
            MechStepResult::Done(outcome) => Ok(self.resolve_outcome(runtime, now, id, outcome).await),
        }
    }

    async fn resolve_outcome(
        &mut self,
        runtime: &Runtime,
        now: Instant,
        id: RequestId,
        outcome: MechOutcome,
    ) -> HandlerOutcome {
        match outcome {
            MechOutcome::Failure => self.delay_fail(runtime, now, id, Vec::new()),
            MechOutcome::InternalError(reason) => {
                self.delay_fail(runtime, now, id, vec![("reason".to_string(), reason.to_string())])
            }
            MechOutcome::Authenticate { authzid, authcid, method } => {
                match self.check_credentials(runtime, &authcid, &method).await {
                    Ok(PassdbResult::Ok { extra }) => {
                        let mut fields = vec![("user".to_string(), authzid)];
                        fields.extend(extra);
                        HandlerOutcome::Reply(ClientReply::Ok { id, fields })
                    }
                    Ok(PassdbResult::Mismatch) | Ok(PassdbResult::UserUnknown) => {
                        self.delay_fail(runtime, now, id, vec![("user".to_string(), authzid)])
                    }
                    Err(PassdbError::Tempfail(_)) => {
                        HandlerOutcome::Reply(ClientReply::Fail {
                            id,
                            fields: vec![("temp".to_string(), "1".to_string())],
                        })
                    }
                    Err(_) => self.delay_fail(runtime, now, id, Vec::new()),
                }
            }
        }
    }

    async fn check_credentials(
        &self,
        runtime: &Runtime,
        user: &str,
        method: &AuthMethod,
    ) -> Result<PassdbResult, PassdbError> {
        let Some(passdb) = runtime.passdbs.primary() else {
            return Err(PassdbError::Tempfail("no passdb configured".to_string()));
        };
        match method {
            AuthMethod::Plain { password } => passdb.verify_plain(user, password).await,
            AuthMethod::NoCredentials => Ok(PassdbResult::Ok { extra: Vec::new() }),
            AuthMethod::Response { challenge, digest } => {
                let Some(stored) = passdb.lookup_credentials(user).await? else {
                    return Ok(PassdbResult::UserUnknown);
                };
                if stored.scheme != "PLAIN" {
                    // CRAM-MD5 needs the plaintext-equivalent password; a
                    // salted scheme can't reproduce it.
                    return Ok(PassdbResult::Mismatch);
                }
                let expected = expected_digest(&stored.encoded, challenge);
                if &expected == digest {
                    Ok(PassdbResult::Ok { extra: Vec::new() })
                } else {
                    Ok(PassdbResult::Mismatch)
                }
            }
        }
    }

    fn delay_fail(
        &self,
        runtime: &Runtime,
        now: Instant,
        id: RequestId,
        fields: Vec<(String, String)>,
    ) -> HandlerOutcome {
        runtime.failure_delay.push(
            now,
            DelayedReply {
                connection: self.connection,
                request_id: id,
                reply: ClientReply::Fail { id, fields },
            },
        );
        HandlerOutcome::Delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passdb::MemoryPassdb;
    use crate::passdb::PassdbRegistry;
    use crate::runtime::RuntimeConfig;
    use std::time::Duration;

    fn test_runtime() -> Runtime {
        let mut passdbs = PassdbRegistry::new();
        let memory = MemoryPassdb::new();
        memory.insert("alice", "secret");
        passdbs.register(Box::new(memory));
        Runtime::new(passdbs, RuntimeConfig::default())
    }

    #[tokio::test]
    async fn plain_success_replies_ok_immediately() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        let resp = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b"\0alice\0secret",
        );
        let outcome = handler
            .handle_auth(&runtime, now, RequestId(1), "PLAIN", &[("resp".to_string(), resp)])
            .await
            .unwrap();
        assert!(matches!(outcome, HandlerOutcome::Reply(ClientReply::Ok { .. })));
        assert_eq!(handler.in_flight(), 0);
    }

    #[tokio::test]
    async fn plain_mismatch_is_delayed() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        let resp = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b"\0alice\0wrong",
        );
        let outcome = handler
            .handle_auth(&runtime, now, RequestId(1), "PLAIN", &[("resp".to_string(), resp)])
            .await
            .unwrap();
        assert!(matches!(outcome, HandlerOutcome::Delayed));
        assert_eq!(runtime.failure_delay.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_request_id_is_rejected() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        handler.handle_auth(&runtime, now, RequestId(1), "LOGIN", &[]).await.unwrap();
        let err = handler.handle_auth(&runtime, now, RequestId(1), "LOGIN", &[]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateRequestId(1)));
    }

    #[tokio::test]
    async fn cancel_removes_in_flight_request_silently() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        handler.handle_auth(&runtime, now, RequestId(1), "LOGIN", &[]).await.unwrap();
        assert_eq!(handler.in_flight(), 1);
        handler.handle_cancel(RequestId(1));
        assert_eq!(handler.in_flight(), 0);
    }

    #[tokio::test]
    async fn unknown_mechanism_is_delayed_not_rejected_outright() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        let outcome =
            handler.handle_auth(&runtime, now, RequestId(1), "GSSAPI", &[]).await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Delayed));
    }

    #[tokio::test]
    async fn cram_md5_handshake_succeeds_against_plain_stored_password() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        let outcome =
            handler.handle_auth(&runtime, now, RequestId(1), "CRAM-MD5", &[]).await.unwrap();
        let challenge = match outcome {
            HandlerOutcome::Reply(ClientReply::Cont { data, .. }) => data,
            _ => panic!("expected a challenge"),
        };
        let digest = expected_digest("secret", &challenge);
        let response = format!("alice {}", digest.iter().map(|b| format!("{b:02x}")).collect::<String>());
        let outcome = handler.handle_cont(&runtime, now, RequestId(1), response.as_bytes()).await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Reply(ClientReply::Ok { .. })));
    }

    #[tokio::test]
    async fn login_with_no_initial_response_prompts_for_username_first() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        let outcome = handler.handle_auth(&runtime, now, RequestId(1), "LOGIN", &[]).await.unwrap();
        let prompt = match outcome {
            HandlerOutcome::Reply(ClientReply::Cont { data, .. }) => data,
            _ => panic!("expected a username prompt"),
        };
        assert_eq!(prompt, b"Username:");

        let outcome =
            handler.handle_cont(&runtime, now, RequestId(1), b"alice").await.unwrap();
        let prompt = match outcome {
            HandlerOutcome::Reply(ClientReply::Cont { data, .. }) => data,
            _ => panic!("expected a password prompt"),
        };
        assert_eq!(prompt, b"Password:");

        let outcome =
            handler.handle_cont(&runtime, now, RequestId(1), b"secret").await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Reply(ClientReply::Ok { .. })));
    }

    #[tokio::test]
    async fn login_mismatch_reports_the_attempted_user() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        handler.handle_auth(&runtime, now, RequestId(1), "LOGIN", &[]).await.unwrap();
        handler.handle_cont(&runtime, now, RequestId(1), b"alice").await.unwrap();
        handler.handle_cont(&runtime, now, RequestId(1), b"wrong").await.unwrap();

        let delayed = runtime.failure_delay.drain_ready(now + Duration::from_secs(10));
        let reply = delayed.into_iter().next().unwrap().reply;
        match reply {
            ClientReply::Fail { fields, .. } => {
                assert_eq!(fields, vec![("user".to_string(), "alice".to_string())]);
            }
            other => panic!("expected a FAIL reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_continuation_id_is_a_protocol_error() {
        let runtime = test_runtime();
        let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
        let now = Instant::now();
        let err = handler.handle_cont(&runtime, now, RequestId(99), b"x").await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRequestId(99)));
    }

    #[test]
    fn failure_delay_default_matches_spec() {
        let runtime = test_runtime();
        assert_eq!(runtime.config.failure_delay, Duration::from_secs(2));
    }

    proptest::proptest! {
        // spec.md §8 invariant 1: every AUTH either resolves to a terminal
        // reply (here, immediately for PLAIN) or is delayed — it never
        // leaves the request arena occupied once `handle_auth` returns.
        #[test]
        fn plain_auth_always_reaches_a_terminal_outcome(password in "[a-zA-Z0-9]{0,16}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let runtime = test_runtime();
                let mut handler = ConnectionHandler::new(authd_core::ConnectionId::generator().next());
                let resp = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("\0alice\0{password}").as_bytes(),
                );
                let outcome = handler
                    .handle_auth(&runtime, Instant::now(), RequestId(1), "PLAIN", &[("resp".to_string(), resp)])
                    .await
                    .unwrap();
                prop_assert!(matches!(outcome, HandlerOutcome::Reply(_) | HandlerOutcome::Delayed));
                prop_assert_eq!(handler.in_flight(), 0);
                Ok(())
            })?;
        }
    }
}
