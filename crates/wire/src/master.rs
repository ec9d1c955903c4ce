// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master protocol (spec.md §4.6): the privileged channel the front-end
//! uses for user lookups and session metadata. No SASL state.

use authd_core::RequestId;

use crate::error::ProtocolError;
use crate::fields::{parse_kv, render_kv};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterUserRequest {
    pub id: RequestId,
    pub user: String,
    pub service: String,
    pub fields: Vec<(String, String)>,
}

impl MasterUserRequest {
    pub fn parse(line: &str) -> Result<MasterUserRequest, ProtocolError> {
        let mut parts = line.split('\t');
        match parts.next() {
            Some("USER") => {}
            _ => return Err(ProtocolError::MalformedLine(line.to_string())),
        }
        let id: RequestId = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
            .parse()
            .map_err(|_| ProtocolError::MalformedLine(line.to_string()))?;
        let user = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
            .to_string();
        let service = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
            .to_string();
        let rest: Vec<&str> = parts.collect();
        Ok(MasterUserRequest { id, user, service, fields: parse_kv(&rest) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterReply {
    User { id: RequestId, user: String, fields: Vec<(String, String)> },
    NotFound { id: RequestId },
    Fail { id: RequestId },
}

impl MasterReply {
    pub fn to_line(&self) -> String {
        match self {
            MasterReply::User { id, user, fields } => {
                format!("USER\t{id}\t{user}{}\n", render_kv(fields))
            }
            MasterReply::NotFound { id } => format!("NOTFOUND\t{id}\n"),
            MasterReply::Fail { id } => format!("FAIL\t{id}\n"),
        }
    }
}
