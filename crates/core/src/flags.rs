// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mechanism capability flags (spec.md §4.3).

use std::ops::{BitOr, BitOrAssign};

/// Capability flags advertised by a SASL mechanism.
///
/// Modeled as a small bitset rather than pulling in the `bitflags` crate:
/// there are exactly five flags and no consumer needs anything beyond
/// union/containment, so a hand-rolled `u8` keeps the dependency surface
/// matched to what this one enum actually needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MechFlags(u8);

impl MechFlags {
    pub const NONE: MechFlags = MechFlags(0);
    /// Mechanism transmits the password in the clear (e.g. PLAIN, LOGIN).
    pub const PLAINTEXT: MechFlags = MechFlags(1 << 0);
    /// Mechanism authenticates without a real user identity.
    pub const ANONYMOUS: MechFlags = MechFlags(1 << 1);
    /// Mechanism is vulnerable to dictionary attacks against the exchange.
    pub const DICTIONARY: MechFlags = MechFlags(1 << 2);
    /// Mechanism actively probes the server (e.g. requires a live session).
    pub const ACTIVE: MechFlags = MechFlags(1 << 3);
    /// Mechanism requires the plaintext password to be available to the
    /// passdb (i.e. it cannot be satisfied by credential-lookup alone).
    pub const PASS_CREDENTIALS: MechFlags = MechFlags(1 << 4);

    pub fn contains(self, other: MechFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Token names for the `MECH` advertisement line (spec.md §6), in a
    /// stable order.
    pub fn names(self) -> Vec<&'static str> {
        let table: [(MechFlags, &'static str); 5] = [
            (MechFlags::PLAINTEXT, "PLAINTEXT"),
            (MechFlags::ANONYMOUS, "ANONYMOUS"),
            (MechFlags::DICTIONARY, "DICTIONARY"),
            (MechFlags::ACTIVE, "ACTIVE"),
            (MechFlags::PASS_CREDENTIALS, "PASS_CREDENTIALS"),
        ];
        table.into_iter().filter(|(flag, _)| self.contains(*flag)).map(|(_, name)| name).collect()
    }
}

impl BitOr for MechFlags {
    type Output = MechFlags;

    fn bitor(self, rhs: MechFlags) -> MechFlags {
        MechFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MechFlags {
    fn bitor_assign(&mut self, rhs: MechFlags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_contains_both_flags() {
        let flags = MechFlags::PLAINTEXT | MechFlags::ANONYMOUS;
        assert!(flags.contains(MechFlags::PLAINTEXT));
        assert!(flags.contains(MechFlags::ANONYMOUS));
        assert!(!flags.contains(MechFlags::ACTIVE));
    }

    #[test]
    fn none_contains_nothing_but_itself() {
        assert!(MechFlags::NONE.contains(MechFlags::NONE));
        assert!(!MechFlags::NONE.contains(MechFlags::PLAINTEXT));
    }

    #[test]
    fn names_lists_every_set_flag() {
        let flags = MechFlags::PLAINTEXT | MechFlags::ACTIVE;
        assert_eq!(flags.names(), vec!["PLAINTEXT", "ACTIVE"]);
        assert!(MechFlags::NONE.names().is_empty());
    }
}
