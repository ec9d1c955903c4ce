// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `VERSION\t<major>\t<minor>` handshake shared by the client and master
//! protocols (spec.md §4.6, §6).

use crate::error::ProtocolError;

/// Protocol version this daemon speaks. A client/master whose major version
/// differs is rejected; minor version differences are tolerated (new
/// optional fields only).
pub const SERVER_VERSION: Version = Version { major: 1, minor: 1 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn parse_line(line: &str) -> Result<Version, ProtocolError> {
        let mut fields = line.split('\t');
        match fields.next() {
            Some("VERSION") => {}
            _ => return Err(ProtocolError::MalformedLine(line.to_string())),
        }
        let major = fields
            .next()
            .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
            .parse()
            .map_err(|_| ProtocolError::MalformedLine(line.to_string()))?;
        let minor = fields
            .next()
            .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
            .parse()
            .map_err(|_| ProtocolError::MalformedLine(line.to_string()))?;
        Ok(Version { major, minor })
    }

    pub fn to_line(self) -> String {
        format!("VERSION\t{}\t{}\n", self.major, self.minor)
    }

    /// Checks the handshake per spec.md §4.6: "a mismatch in major version
    /// terminates the connection."
    pub fn check_compatible(self, server: Version) -> Result<(), ProtocolError> {
        if self.major != server.major {
            return Err(ProtocolError::VersionMismatch {
                client_major: self.major,
                server_major: server.major,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_version_line() {
        let v = Version::parse_line("VERSION\t1\t0").unwrap();
        assert_eq!(v, Version { major: 1, minor: 0 });
        assert_eq!(v.to_line(), "VERSION\t1\t0\n");
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(Version::parse_line("NOTVERSION\t1\t0").is_err());
        assert!(Version::parse_line("VERSION\t1").is_err());
        assert!(Version::parse_line("VERSION\tx\t0").is_err());
    }

    #[test]
    fn major_mismatch_is_rejected_minor_is_not() {
        let server = Version { major: 1, minor: 5 };
        assert!(Version { major: 1, minor: 0 }.check_compatible(server).is_ok());
        assert!(Version { major: 2, minor: 0 }.check_compatible(server).is_err());
    }
}
