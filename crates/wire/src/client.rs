// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client protocol (spec.md §4.4): the channel the mail front-end uses to
//! forward one end user's SASL exchange to the daemon.

use authd_core::RequestId;

use crate::error::ProtocolError;
use crate::fields::{parse_kv, render_kv};

/// A line received from the client on an already-handshaken connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    Auth { id: RequestId, mechanism: String, service: String, fields: Vec<(String, String)> },
    Cont { id: RequestId, data: Vec<u8> },
    Cancel { id: RequestId },
}

impl ClientLine {
    pub fn parse(line: &str) -> Result<ClientLine, ProtocolError> {
        let mut parts = line.split('\t');
        let cmd = parts.next().ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?;
        match cmd {
            "AUTH" => {
                let id = parse_id(parts.next(), line)?;
                let mechanism = parts
                    .next()
                    .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
                    .to_string();
                let service = parts
                    .next()
                    .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?
                    .to_string();
                let rest: Vec<&str> = parts.collect();
                Ok(ClientLine::Auth { id, mechanism, service, fields: parse_kv(&rest) })
            }
            "CONT" => {
                let id = parse_id(parts.next(), line)?;
                let data_b64 = parts.next().unwrap_or("");
                let data = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data_b64)?;
                Ok(ClientLine::Cont { id, data })
            }
            "CANCEL" => {
                let id = parse_id(parts.next(), line)?;
                Ok(ClientLine::Cancel { id })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// A line sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientReply {
    Mech { name: String, flags: Vec<String> },
    Ok { id: RequestId, fields: Vec<(String, String)> },
    Fail { id: RequestId, fields: Vec<(String, String)> },
    Cont { id: RequestId, data: Vec<u8> },
}

impl ClientReply {
    pub fn to_line(&self) -> String {
        match self {
            ClientReply::Mech { name, flags } => {
                if flags.is_empty() {
                    format!("MECH\t{name}\n")
                } else {
                    format!("MECH\t{name}\t{}\n", flags.join("\t"))
                }
            }
            ClientReply::Ok { id, fields } => format!("OK\t{id}{}\n", render_kv(fields)),
            ClientReply::Fail { id, fields } => format!("FAIL\t{id}{}\n", render_kv(fields)),
            ClientReply::Cont { id, data } => {
                let encoded =
                    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data);
                format!("CONT\t{id}\t{encoded}\n")
            }
        }
    }
}

fn parse_id(field: Option<&str>, line: &str) -> Result<RequestId, ProtocolError> {
    let raw = field.ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))?;
    raw.parse().map_err(|_| ProtocolError::InvalidRequestId(raw.to_string()))
}
