//! Request/reply framing for the node text protocol
//!
//! Requests are arrays of bulk strings. Replies are one of five kinds, told
//! apart by their first byte: `+` simple, `-` error, `:` integer, `$` bulk,
//! `*` array.

use bytes::{BufMut, BytesMut};
use std::fmt;

const CRLF: &[u8] = b"\r\n";
/// Refuse replies nesting deeper than this
const MAX_DEPTH: usize = 32;
/// Largest bulk string a node may announce, matching `proto-max-bulk-len`
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest element count a node may announce for one array
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Text payload of a simple or bulk reply
    pub fn as_text(&self) -> Option<String> {
        match self {
            Reply::Simple(s) => Some(s.clone()),
            Reply::Bulk(Some(b)) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Simple(s) if s == "OK")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(e) => write!(f, "(error) {}", e),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Bulk(None) | Reply::Array(None) => write!(f, "(nil)"),
            Reply::Bulk(Some(b)) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            Reply::Array(Some(items)) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Framing failure; the connection cannot be trusted afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError(pub String);

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed reply: {}", self.0)
    }
}

/// Encode a command as an array of bulk strings
pub fn encode_command(args: &[&str]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    buf.put_u8(b'*');
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(CRLF);
    for arg in args {
        buf.put_u8(b'$');
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(arg.as_bytes());
        buf.put_slice(CRLF);
    }
    buf
}

/// Try to decode one reply from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the reply and
/// the number of bytes it occupied.
pub fn parse_reply(buf: &[u8]) -> Result<Option<(Reply, usize)>, FrameError> {
    parse_at(buf, 0, 0)
}

fn parse_at(buf: &[u8], pos: usize, depth: usize) -> Result<Option<(Reply, usize)>, FrameError> {
    if depth > MAX_DEPTH {
        return Err(FrameError("nesting too deep".into()));
    }
    let Some((line, next)) = read_line(buf, pos) else {
        return Ok(None);
    };
    if line.is_empty() {
        return Err(FrameError("empty line".into()));
    }
    let body = std::str::from_utf8(&line[1..])
        .map_err(|_| FrameError("header is not utf-8".into()))?;

    match line[0] {
        b'+' => Ok(Some((Reply::Simple(body.to_string()), next))),
        b'-' => Ok(Some((Reply::Error(body.to_string()), next))),
        b':' => {
            let n = parse_int(body)?;
            Ok(Some((Reply::Integer(n), next)))
        }
        b'$' => {
            let len = parse_int(body)?;
            if len < 0 {
                return Ok(Some((Reply::Bulk(None), next)));
            }
            if len > MAX_BULK_LEN {
                return Err(FrameError(format!("bulk length {} over limit", len)));
            }
            let end = next + len as usize;
            if buf.len() < end + CRLF.len() {
                return Ok(None);
            }
            if &buf[end..end + CRLF.len()] != CRLF {
                return Err(FrameError("bulk string not terminated".into()));
            }
            Ok(Some((Reply::Bulk(Some(buf[next..end].to_vec())), end + CRLF.len())))
        }
        b'*' => {
            let len = parse_int(body)?;
            if len < 0 {
                return Ok(Some((Reply::Array(None), next)));
            }
            if len > MAX_ARRAY_LEN {
                return Err(FrameError(format!("array length {} over limit", len)));
            }
            // every element takes at least three bytes on the wire
            let mut items = Vec::with_capacity((len as usize).min((buf.len() - next) / 3));
            let mut cursor = next;
            for _ in 0..len {
                match parse_at(buf, cursor, depth + 1)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Reply::Array(Some(items)), cursor)))
        }
        other => Err(FrameError(format!("unknown reply type {:?}", other as char))),
    }
}

fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let idx = rest.windows(2).position(|w| w == CRLF)?;
    Some((&rest[..idx], pos + idx + CRLF.len()))
}

fn parse_int(s: &str) -> Result<i64, FrameError> {
    s.parse()
        .map_err(|_| FrameError(format!("invalid integer {:?}", s)))
}
