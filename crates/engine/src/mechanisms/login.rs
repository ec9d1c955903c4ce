// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LOGIN: a two-step prompt/response mechanism (`Username:` then
//! `Password:`), included as the simplest multi-`CONT` mechanism per
//! SPEC_FULL.md §6.

use authd_core::MechFlags;

use super::{AuthMethod, MechOutcome, MechStepResult, Mechanism, MechanismState};

pub struct Login;

impl Mechanism for Login {
    fn name(&self) -> &'static str {
        "LOGIN"
    }

    fn flags(&self) -> MechFlags {
        MechFlags::PLAINTEXT
    }

    fn create(&self) -> Box<dyn MechanismState> {
        Box::new(LoginState::Start)
    }
}

enum LoginState {
    Start,
    AwaitingUsername,
    AwaitingPassword { username: String },
    Done,
}

impl MechanismState for LoginState {
    fn step(&mut self, client_bytes: &[u8]) -> MechStepResult {
        match std::mem::replace(self, LoginState::Done) {
            LoginState::Start => {
                // A client that sends an initial response anyway (rather
                // than waiting for the prompt) has nowhere for that data to
                // go; fail instead of silently discarding it.
                if !client_bytes.is_empty() {
                    return MechStepResult::Done(MechOutcome::Failure);
                }
                *self = LoginState::AwaitingUsername;
                MechStepResult::Continue(b"Username:".to_vec())
            }
            LoginState::AwaitingUsername => {
                let username = match std::str::from_utf8(client_bytes) {
                    Ok(s) => s.to_string(),
                    Err(_) => return MechStepResult::Done(MechOutcome::Failure),
                };
                *self = LoginState::AwaitingPassword { username };
                MechStepResult::Continue(b"Password:".to_vec())
            }
            LoginState::AwaitingPassword { username } => {
                let password = match std::str::from_utf8(client_bytes) {
                    Ok(s) => s.to_string(),
                    Err(_) => return MechStepResult::Done(MechOutcome::Failure),
                };
                MechStepResult::Done(MechOutcome::Authenticate {
                    authzid: username.clone(),
                    authcid: username,
                    method: AuthMethod::Plain { password },
                })
            }
            LoginState::Done => MechStepResult::Done(MechOutcome::Failure),
        }
    }

    fn initial(&mut self) -> MechStepResult {
        match std::mem::replace(self, LoginState::Done) {
            LoginState::Start => {
                *self = LoginState::AwaitingUsername;
                MechStepResult::Continue(b"Username:".to_vec())
            }
            other => {
                *self = other;
                self.step(&[])
            }
        }
    }
}
