// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSHA256: `base64(salt || sha256(password || salt))`, salt length 16
//! bytes. The reference salted scheme named in SPEC_FULL.md §1 as the
//! replacement for out-of-scope CRYPT-style storage.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::PasswordScheme;

const SALT_LEN: usize = 16;

pub struct SaltedShaScheme;

impl SaltedShaScheme {
    /// Produces a stored value (without the `{SSHA256}` tag) for a given
    /// plaintext password, for use by reference/test passdbs.
    pub fn encode(plaintext: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::encode_with_salt(plaintext, &salt)
    }

    fn encode_with_salt(plaintext: &str, salt: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();
        let mut combined = Vec::with_capacity(salt.len() + digest.len());
        combined.extend_from_slice(salt);
        combined.extend_from_slice(&digest);
        STANDARD.encode(combined)
    }
}

impl PasswordScheme for SaltedShaScheme {
    fn name(&self) -> &'static str {
        "SSHA256"
    }

    fn verify(&self, plaintext: &str, encoded: &str) -> bool {
        let Ok(combined) = STANDARD.decode(encoded) else {
            return false;
        };
        if combined.len() <= SALT_LEN {
            return false;
        }
        let (salt, _) = combined.split_at(SALT_LEN);
        let recomputed = Self::encode_with_salt(plaintext, salt);
        recomputed == encoded
    }
}
