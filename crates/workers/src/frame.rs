// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker protocol frames (spec.md §4.5):
//!
//! ```text
//! daemon -> worker: <tag>\t<op>\t<field1>\t<field2>\t...\n
//! worker -> daemon: <tag>\t<result>[\t<field>=<value>...]\n
//! ```

use authd_core::WorkerTag;

use crate::error::WorkerError;

/// The passdb/userdb operation a worker is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOp {
    /// verify-plain
    PassV,
    /// lookup-credentials
    PassL,
    /// userdb lookup
    User,
}

impl WorkerOp {
    fn as_str(self) -> &'static str {
        match self {
            WorkerOp::PassV => "PASSV",
            WorkerOp::PassL => "PASSL",
            WorkerOp::User => "USER",
        }
    }

    fn parse(s: &str) -> Result<WorkerOp, WorkerError> {
        match s {
            "PASSV" => Ok(WorkerOp::PassV),
            "PASSL" => Ok(WorkerOp::PassL),
            "USER" => Ok(WorkerOp::User),
            other => Err(WorkerError::UnknownOp(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub tag: WorkerTag,
    pub op: WorkerOp,
    pub fields: Vec<String>,
}

impl WorkerRequest {
    pub fn new(tag: WorkerTag, op: WorkerOp, fields: Vec<String>) -> Self {
        Self { tag, op, fields }
    }

    pub fn parse(line: &str) -> Result<WorkerRequest, WorkerError> {
        let mut parts = line.split('\t');
        let tag: WorkerTag = parts
            .next()
            .ok_or_else(|| WorkerError::MalformedFrame(line.to_string()))?
            .parse()
            .map_err(|_| WorkerError::MalformedFrame(line.to_string()))?;
        let op = WorkerOp::parse(
            parts.next().ok_or_else(|| WorkerError::MalformedFrame(line.to_string()))?,
        )?;
        let fields = parts.map(str::to_string).collect();
        Ok(WorkerRequest { tag, op, fields })
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("{}\t{}", self.tag, self.op.as_str());
        for f in &self.fields {
            line.push('\t');
            line.push_str(f);
        }
        line.push('\n');
        line
    }
}

/// Coarse-grained result of a worker op. `NotFound` and `Fail` are distinct:
/// `NotFound` means the backend was reachable and definitively has no such
/// user; `Fail` means the credential check itself failed (e.g. password
/// mismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerResult {
    Ok,
    Fail,
    NotFound,
    Tempfail,
}

impl WorkerResult {
    fn as_str(self) -> &'static str {
        match self {
            WorkerResult::Ok => "OK",
            WorkerResult::Fail => "FAIL",
            WorkerResult::NotFound => "NOTFOUND",
            WorkerResult::Tempfail => "TEMPFAIL",
        }
    }

    fn parse(s: &str) -> Result<WorkerResult, WorkerError> {
        match s {
            "OK" => Ok(WorkerResult::Ok),
            "FAIL" => Ok(WorkerResult::Fail),
            "NOTFOUND" => Ok(WorkerResult::NotFound),
            "TEMPFAIL" => Ok(WorkerResult::Tempfail),
            other => Err(WorkerError::UnknownResult(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReply {
    pub tag: WorkerTag,
    pub result: WorkerResult,
    pub fields: Vec<(String, String)>,
}

impl WorkerReply {
    pub fn new(tag: WorkerTag, result: WorkerResult, fields: Vec<(String, String)>) -> Self {
        Self { tag, result, fields }
    }

    pub fn tempfail(tag: WorkerTag) -> Self {
        Self { tag, result: WorkerResult::Tempfail, fields: Vec::new() }
    }

    pub fn parse(line: &str) -> Result<WorkerReply, WorkerError> {
        let mut parts = line.split('\t');
        let tag: WorkerTag = parts
            .next()
            .ok_or_else(|| WorkerError::MalformedFrame(line.to_string()))?
            .parse()
            .map_err(|_| WorkerError::MalformedFrame(line.to_string()))?;
        let result = WorkerResult::parse(
            parts.next().ok_or_else(|| WorkerError::MalformedFrame(line.to_string()))?,
        )?;
        let fields = parts
            .map(|f| match f.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (f.to_string(), String::new()),
            })
            .collect();
        Ok(WorkerReply { tag, result, fields })
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("{}\t{}", self.tag, self.result.as_str());
        for (k, v) in &self.fields {
            line.push('\t');
            line.push_str(k);
            line.push('=');
            line.push_str(v);
        }
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_wire_format() {
        let req = WorkerRequest::new(
            authd_core::WorkerTag(1),
            WorkerOp::PassV,
            vec!["foo".to_string(), "bar".to_string()],
        );
        let line = req.to_line();
        assert_eq!(line, "1\tPASSV\tfoo\tbar\n");
        let parsed = WorkerRequest::parse(line.trim_end()).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn reply_round_trips_through_wire_format() {
        let reply = WorkerReply::new(
            authd_core::WorkerTag(7),
            WorkerResult::Ok,
            vec![("user".to_string(), "foo".to_string())],
        );
        let line = reply.to_line();
        assert_eq!(line, "7\tOK\tuser=foo\n");
        assert_eq!(WorkerReply::parse(line.trim_end()).unwrap(), reply);
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(matches!(WorkerRequest::parse("1\tBOGUS"), Err(WorkerError::UnknownOp(_))));
    }

    #[test]
    fn unknown_result_is_rejected() {
        assert!(matches!(WorkerReply::parse("1\tBOGUS"), Err(WorkerError::UnknownResult(_))));
    }
}
