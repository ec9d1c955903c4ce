// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `k=v` trailing-field parsing shared by the client and master protocols.

/// Parses the `[k=v ...]` tail of a protocol line. Fields with no `=` are
/// kept with an empty value rather than rejected — the original mechanisms
/// occasionally send bare flags this way, and a malformed field here should
/// not be promoted to a connection-terminating protocol error.
pub fn parse_kv(fields: &[&str]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|f| match f.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (f.to_string(), String::new()),
        })
        .collect()
}

/// Renders `k=v` pairs back onto the wire, tab-separated, with a leading
/// tab so callers can simply `write!(line, "{}", render_kv(&fields))`.
pub fn render_kv(fields: &[(String, String)]) -> String {
    fields.iter().map(|(k, v)| format!("\t{k}={v}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let parsed = parse_kv(&["user=foo", "service=imap"]);
        assert_eq!(
            parsed,
            vec![("user".to_string(), "foo".to_string()), ("service".to_string(), "imap".to_string())]
        );
    }

    #[test]
    fn bare_flag_keeps_empty_value() {
        assert_eq!(parse_kv(&["nodelay"]), vec![("nodelay".to_string(), String::new())]);
    }

    #[test]
    fn render_round_trips_through_parse() {
        let fields = vec![("user".to_string(), "foo".to_string())];
        let rendered = render_kv(&fields);
        assert_eq!(rendered, "\tuser=foo");
    }
}
