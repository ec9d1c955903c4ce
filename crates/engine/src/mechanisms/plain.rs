// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PLAIN (RFC 4616): single message, `\0authzid\0authcid\0passwd`.

use authd_core::MechFlags;

use super::{AuthMethod, MechOutcome, MechStepResult, Mechanism, MechanismState};

pub struct Plain;

impl Mechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn flags(&self) -> MechFlags {
        MechFlags::PLAINTEXT
    }

    fn create(&self) -> Box<dyn MechanismState> {
        Box::new(PlainState)
    }
}

struct PlainState;

impl MechanismState for PlainState {
    fn step(&mut self, client_bytes: &[u8]) -> MechStepResult {
        let parts: Vec<&[u8]> = client_bytes.splitn(3, |&b| b == 0).collect();
        let [authzid, authcid, passwd] = match parts.as_slice() {
            [a, b, c] => [*a, *b, *c],
            _ => return MechStepResult::Done(MechOutcome::Failure),
        };
        let authcid = match std::str::from_utf8(authcid) {
            Ok(s) => s.to_string(),
            Err(_) => return MechStepResult::Done(MechOutcome::Failure),
        };
        let password = match std::str::from_utf8(passwd) {
            Ok(s) => s.to_string(),
            Err(_) => return MechStepResult::Done(MechOutcome::Failure),
        };
        let authzid = if authzid.is_empty() {
            authcid.clone()
        } else {
            match std::str::from_utf8(authzid) {
                Ok(s) => s.to_string(),
                Err(_) => return MechStepResult::Done(MechOutcome::Failure),
            }
        };
        MechStepResult::Done(MechOutcome::Authenticate {
            authzid,
            authcid,
            method: AuthMethod::Plain { password },
        })
    }
}
