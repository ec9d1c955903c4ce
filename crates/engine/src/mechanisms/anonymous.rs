// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ANONYMOUS (RFC 4505): single message carrying trace information only.
//! Always authenticates against a passdb willing to accept it.

use authd_core::MechFlags;

use super::{AuthMethod, MechOutcome, MechStepResult, Mechanism, MechanismState};

pub struct Anonymous;

impl Mechanism for Anonymous {
    fn name(&self) -> &'static str {
        "ANONYMOUS"
    }

    fn flags(&self) -> MechFlags {
        MechFlags::ANONYMOUS
    }

    fn create(&self) -> Box<dyn MechanismState> {
        Box::new(AnonymousState)
    }
}

struct AnonymousState;

impl MechanismState for AnonymousState {
    fn step(&mut self, client_bytes: &[u8]) -> MechStepResult {
        let trace = String::from_utf8_lossy(client_bytes).into_owned();
        MechStepResult::Done(MechOutcome::Authenticate {
            authzid: "anonymous".to_string(),
            authcid: trace,
            method: AuthMethod::NoCredentials,
        })
    }
}
