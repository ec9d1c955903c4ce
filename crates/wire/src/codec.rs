// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line framing shared by the client and master protocols: newline
//! terminated, UTF-8, read and write with a timeout so a stalled peer
//! cannot pin a connection task forever.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use crate::error::ProtocolError;

/// Reads one `\n`-terminated line, stripping the trailing newline. Returns
/// `Err(ProtocolError::ConnectionClosed)` on EOF so callers can distinguish
/// a clean disconnect from a malformed line.
pub async fn read_line<R>(reader: &mut R, timeout: Duration) -> Result<String, ProtocolError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut buf = String::new();
    let n = tokio::time::timeout(timeout, reader.read_line(&mut buf))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if !buf.is_ascii() && std::str::from_utf8(buf.as_bytes()).is_err() {
        return Err(ProtocolError::MalformedLine(buf));
    }
    while buf.ends_with('\n') || buf.ends_with('\r') {
        buf.pop();
    }
    Ok(buf)
}

/// Writes a pre-formatted line (caller includes the trailing `\n`).
pub async fn write_line<W>(writer: &mut W, line: &str, timeout: Duration) -> Result<(), ProtocolError>
where
    W: AsyncWriteExt + Unpin,
{
    tokio::time::timeout(timeout, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_line_without_trailing_newline() {
        let mut cursor = Cursor::new(b"AUTH\t1\tPLAIN\timap\n".to_vec());
        let line = read_line(&mut cursor, Duration::from_secs(1)).await.unwrap();
        assert_eq!(line, "AUTH\t1\tPLAIN\timap");
    }

    #[tokio::test]
    async fn eof_is_connection_closed() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = read_line(&mut cursor, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn write_line_round_trips() {
        let mut buf = Vec::new();
        write_line(&mut buf, "OK\t1\tuser=foo\n", Duration::from_secs(1)).await.unwrap();
        assert_eq!(buf, b"OK\t1\tuser=foo\n");
    }
}
