// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRAM-MD5 (RFC 2195): server sends a challenge, client replies with
//! `user hex(hmac-md5(password, challenge))`. This mechanism never sees the
//! password; it hands the challenge and digest to the request handler,
//! which looks up the stored credential from the passdb and recomputes the
//! HMAC itself (spec.md §8's worked example).

use hmac::{Hmac, Mac};
use md5::Md5;
use rand::RngCore;

use authd_core::MechFlags;

use super::{AuthMethod, MechOutcome, MechStepResult, Mechanism, MechanismState};

type HmacMd5 = Hmac<Md5>;

pub struct CramMd5;

impl Mechanism for CramMd5 {
    fn name(&self) -> &'static str {
        "CRAM-MD5"
    }

    fn flags(&self) -> MechFlags {
        MechFlags::NONE
    }

    fn create(&self) -> Box<dyn MechanismState> {
        Box::new(CramMd5State::Start)
    }
}

enum CramMd5State {
    Start,
    AwaitingResponse { challenge: Vec<u8> },
    Done,
}

fn make_challenge() -> Vec<u8> {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "authd".to_string());
    format!("<{}@{}>", hex::encode(nonce), hostname).into_bytes()
}

impl MechanismState for CramMd5State {
    fn step(&mut self, client_bytes: &[u8]) -> MechStepResult {
        match std::mem::replace(self, CramMd5State::Done) {
            CramMd5State::Start => {
                if !client_bytes.is_empty() {
                    return MechStepResult::Done(MechOutcome::Failure);
                }
                let challenge = make_challenge();
                let reply = challenge.clone();
                *self = CramMd5State::AwaitingResponse { challenge };
                MechStepResult::Continue(reply)
            }
            CramMd5State::AwaitingResponse { challenge } => {
                let response = match std::str::from_utf8(client_bytes) {
                    Ok(s) => s,
                    Err(_) => return MechStepResult::Done(MechOutcome::Failure),
                };
                let (username, digest_hex) = match response.rsplit_once(' ') {
                    Some(pair) => pair,
                    None => return MechStepResult::Done(MechOutcome::Failure),
                };
                let digest = match hex::decode(digest_hex) {
                    Ok(bytes) => bytes,
                    Err(_) => return MechStepResult::Done(MechOutcome::Failure),
                };
                MechStepResult::Done(MechOutcome::Authenticate {
                    authzid: username.to_string(),
                    authcid: username.to_string(),
                    method: AuthMethod::Response { challenge, digest },
                })
            }
            CramMd5State::Done => MechStepResult::Done(MechOutcome::Failure),
        }
    }
}

/// Recomputes the expected digest for a stored plaintext-equivalent
/// password; used by the request handler, not by the mechanism itself.
#[allow(clippy::expect_used)]
pub fn expected_digest(password: &str, challenge: &[u8]) -> Vec<u8> {
    // HmacMd5::new_from_slice rejects no key length; the Result is infallible.
    let mut mac = HmacMd5::new_from_slice(password.as_bytes()).expect("hmac-md5 accepts any key length");
    mac.update(challenge);
    mac.finalize().into_bytes().to_vec()
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, ()> {
        if s.len() % 2 != 0 {
            return Err(());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_then_response_round_trip() {
        let mut state = CramMd5State::Start;
        let challenge = match state.step(b"") {
            MechStepResult::Continue(bytes) => bytes,
            _ => panic!("expected a challenge"),
        };
        let digest = expected_digest("secret", &challenge);
        let response = format!("alice {}", hex::encode(&digest));
        match state.step(response.as_bytes()) {
            MechStepResult::Done(MechOutcome::Authenticate { authcid, method, .. }) => {
                assert_eq!(authcid, "alice");
                match method {
                    AuthMethod::Response { digest: got, challenge: got_challenge } => {
                        assert_eq!(got, digest);
                        assert_eq!(got_challenge, challenge);
                    }
                    _ => panic!("expected Response method"),
                }
            }
            _ => panic!("expected Authenticate outcome"),
        }
    }

    #[test]
    fn initial_client_bytes_must_be_empty() {
        let mut state = CramMd5State::Start;
        assert!(matches!(state.step(b"garbage"), MechStepResult::Done(MechOutcome::Failure)));
    }

    #[test]
    fn malformed_response_fails() {
        let mut state = CramMd5State::AwaitingResponse { challenge: vec![1, 2, 3] };
        assert!(matches!(state.step(b"no-space-separator"), MechStepResult::Done(MechOutcome::Failure)));
    }
}
