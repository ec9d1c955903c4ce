// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry-only placeholders for DIGEST-MD5, OTP, and RPA: advertised in
//! `MECH` lines and routable like any other mechanism, but their handshake
//! math is out of scope (SPEC_FULL.md §6's Open Question resolution).

use authd_core::MechFlags;

use super::{MechOutcome, MechStepResult, Mechanism, MechanismState};

pub struct StubMechanism {
    name: &'static str,
}

impl StubMechanism {
    pub fn new(name: &'static str) -> StubMechanism {
        StubMechanism { name }
    }
}

impl Mechanism for StubMechanism {
    fn name(&self) -> &'static str {
        self.name
    }

    fn flags(&self) -> MechFlags {
        MechFlags::NONE
    }

    fn create(&self) -> Box<dyn MechanismState> {
        Box::new(StubState { name: self.name })
    }
}

struct StubState {
    name: &'static str,
}

impl MechanismState for StubState {
    fn step(&mut self, _client_bytes: &[u8]) -> MechStepResult {
        tracing::debug!(mechanism = self.name, "mechanism not implemented");
        MechStepResult::Done(MechOutcome::InternalError("not implemented"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_internal_error() {
        let mut state = StubState { name: "OTP" };
        assert!(matches!(
            state.step(b"anything"),
            MechStepResult::Done(MechOutcome::InternalError("not implemented"))
        ));
    }
}
