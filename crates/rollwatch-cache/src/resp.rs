//! Minimal RESP2 encoding and reply parsing.
//!
//! Commands are always sent as arrays of bulk strings:
//!
//! ```text
//! *3\r\n$3\r\nSET\r\n$12\r\n482-checkout\r\n$4\r\nSkip\r\n
//! ```
//!
//! Only the scalar reply types are understood; the commands we send never
//! produce array replies.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{CacheError, CacheResult};

/// Longest bulk reply accepted.
const MAX_BULK_LEN: usize = 512 * 1024;

/// Build a RESP array command from parts.
pub fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut cmd = Vec::new();
    // Array header: *<count>\r\n
    cmd.push(b'*');
    cmd.extend_from_slice(parts.len().to_string().as_bytes());
    cmd.extend_from_slice(b"\r\n");

    for part in parts {
        // Bulk string: $<len>\r\n<data>\r\n
        cmd.push(b'$');
        cmd.extend_from_slice(part.len().to_string().as_bytes());
        cmd.extend_from_slice(b"\r\n");
        cmd.extend_from_slice(part.as_bytes());
        cmd.extend_from_slice(b"\r\n");
    }
    cmd
}

/// A single server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`
    Simple(String),
    /// `-ERR ...`
    Error(String),
    /// `:1`
    Integer(i64),
    /// `$n` payload, `None` for the null bulk string `$-1`.
    Bulk(Option<String>),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "+{s}"),
            Reply::Error(e) => write!(f, "-{e}"),
            Reply::Integer(n) => write!(f, ":{n}"),
            Reply::Bulk(Some(s)) => write!(f, "${s:?}"),
            Reply::Bulk(None) => f.write_str("$nil"),
        }
    }
}

/// Read one reply from the stream.
pub async fn read_reply<R>(reader: &mut R) -> CacheResult<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(CacheError::Protocol("connection closed by server".to_string()));
    }
    let line = line
        .strip_suffix("\r\n")
        .ok_or_else(|| CacheError::Protocol(format!("unterminated reply line: {line:?}")))?;

    let mut chars = line.chars();
    let kind = chars.next();
    let body = chars.as_str();
    match kind {
        Some('+') => Ok(Reply::Simple(body.to_string())),
        Some('-') => Ok(Reply::Error(body.to_string())),
        Some(':') => body
            .parse()
            .map(Reply::Integer)
            .map_err(|_| CacheError::Protocol(format!("invalid integer reply: {body:?}"))),
        Some('$') => read_bulk(reader, body).await,
        other => Err(CacheError::Protocol(format!("unsupported reply type {other:?}"))),
    }
}

async fn read_bulk<R>(reader: &mut R, header: &str) -> CacheResult<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let len: i64 = header
        .parse()
        .map_err(|_| CacheError::Protocol(format!("invalid bulk length: {header:?}")))?;
    if len < 0 {
        return Ok(Reply::Bulk(None));
    }
    let len = len as usize;
    if len > MAX_BULK_LEN {
        return Err(CacheError::Protocol(format!("bulk reply too large: {len} bytes")));
    }

    let mut payload = vec![0u8; len + 2];
    reader.read_exact(&mut payload).await?;
    if !payload.ends_with(b"\r\n") {
        return Err(CacheError::Protocol("bulk reply missing terminator".to_string()));
    }
    payload.truncate(len);
    String::from_utf8(payload)
        .map(|s| Reply::Bulk(Some(s)))
        .map_err(|_| CacheError::Protocol("bulk reply is not utf-8".to_string()))
}
