/*!
 * RESP wire protocol
 *
 * Parsing and encoding for the Redis serialization protocol subset the
 * server speaks. Requests arrive as a RESP array of bulk strings; replies
 * go out as simple strings, bulk strings or errors. The parser is
 * streaming-aware: a buffer that truncates mid-value reports
 * [`DecodeError::Incomplete`] so the connection layer can keep
 * accumulating bytes instead of failing the request.
 */

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// A single RESP value.
///
/// Arrays nest arbitrarily; `$-1` and `*-1` both decode to [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR something went wrong\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`, binary safe
    Bulk(Bytes),
    /// `*2\r\n...` followed by that many encoded elements
    Array(Vec<Value>),
    /// `$-1\r\n` or `*-1\r\n`
    Null,
}

/// Failures while decoding RESP input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before the value does. Streaming callers read more
    /// bytes; one-shot callers treat it as malformed input.
    #[error("incomplete RESP value")]
    Incomplete,
    #[error("protocol error: unknown type byte {0:#04x}")]
    UnknownType(u8),
    #[error("protocol error: expected CRLF")]
    ExpectedCrlf,
    #[error("protocol error: invalid length")]
    InvalidLength,
    #[error("protocol error: invalid integer")]
    InvalidInteger,
    #[error("protocol error: expected array")]
    ExpectedArray,
    #[error("protocol error: expected string element")]
    ExpectedString,
    #[error("protocol error: invalid UTF-8 in command")]
    InvalidUtf8,
}

/// Failures while encoding a reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// No current verb replies with integers, arrays or nulls; the match in
    /// [`encode`] is where those reply shapes get added.
    #[error("unsupported reply type")]
    UnsupportedReply,
}

/// Decode one complete value from the front of `data`.
///
/// Returns the value and the number of bytes it consumed. The leading byte
/// selects the reader: `+` simple string, `-` error, `:` integer, `$` bulk
/// string, `*` array.
pub fn parse(data: &[u8]) -> Result<(Value, usize), DecodeError> {
    let Some(&tag) = data.first() else {
        return Err(DecodeError::Incomplete);
    };
    match tag {
        b'+' => {
            let (line, n) = read_line(&data[1..])?;
            Ok((Value::Simple(into_utf8(line)?), 1 + n))
        }
        b'-' => {
            let (line, n) = read_line(&data[1..])?;
            Ok((Value::Error(into_utf8(line)?), 1 + n))
        }
        b':' => {
            let (line, n) = read_line(&data[1..])?;
            Ok((Value::Integer(read_integer(line)?), 1 + n))
        }
        b'$' => read_bulk(data),
        b'*' => read_array(data),
        other => Err(DecodeError::UnknownType(other)),
    }
}

/// Streaming request entry point.
///
/// Decodes one top-level array and asserts every element is a string,
/// yielding the ordered token sequence and the bytes consumed. `Ok(None)`
/// means the buffer does not yet hold one complete request. An empty array
/// (`*0\r\n`) is a valid request carrying zero tokens.
pub fn parse_request(data: &[u8]) -> Result<Option<(Vec<String>, usize)>, DecodeError> {
    let (value, consumed) = match parse(data) {
        Ok(parsed) => parsed,
        Err(DecodeError::Incomplete) => return Ok(None),
        Err(e) => return Err(e),
    };
    let Value::Array(items) = value else {
        return Err(DecodeError::ExpectedArray);
    };
    let mut tokens = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Bulk(bytes) => {
                let token =
                    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)?;
                tokens.push(token);
            }
            Value::Simple(s) => tokens.push(s),
            _ => return Err(DecodeError::ExpectedString),
        }
    }
    Ok(Some((tokens, consumed)))
}

/// One-shot request decode for callers holding a complete buffer.
///
/// Unlike [`parse_request`], an empty or truncated buffer is an error here.
pub fn decode_request(data: &[u8]) -> Result<Vec<String>, DecodeError> {
    match parse_request(data)? {
        Some((tokens, _)) => Ok(tokens),
        None => Err(DecodeError::Incomplete),
    }
}

/// Encode a reply value into `out`.
///
/// Strings are the only payloads current verbs produce: simple strings,
/// bulk strings and errors. Integer, array and null replies are rejected
/// until a verb needs them.
pub fn encode(value: &Value, out: &mut BytesMut) -> Result<(), EncodeError> {
    match value {
        Value::Simple(s) => write_simple(s, out),
        Value::Bulk(b) => write_bulk(b, out),
        Value::Error(msg) => write_error(msg, out),
        Value::Integer(_) | Value::Array(_) | Value::Null => {
            return Err(EncodeError::UnsupportedReply)
        }
    }
    Ok(())
}

/// Encode `+<s>\r\n`.
pub fn write_simple(s: &str, out: &mut BytesMut) {
    out.reserve(s.len() + 3);
    out.put_u8(b'+');
    out.put_slice(s.as_bytes());
    out.put_slice(b"\r\n");
}

/// Encode `$<len>\r\n<b>\r\n`.
pub fn write_bulk(b: &[u8], out: &mut BytesMut) {
    let len = b.len().to_string();
    out.reserve(1 + len.len() + 2 + b.len() + 2);
    out.put_u8(b'$');
    out.put_slice(len.as_bytes());
    out.put_slice(b"\r\n");
    out.put_slice(b);
    out.put_slice(b"\r\n");
}

/// Encode `-<msg>\r\n`. Every failure sent to a client goes through here.
pub fn write_error(msg: &str, out: &mut BytesMut) {
    out.reserve(msg.len() + 3);
    out.put_u8(b'-');
    out.put_slice(msg.as_bytes());
    out.put_slice(b"\r\n");
}

/// Serialize a token sequence as a RESP array of bulk strings, the form
/// clients use to submit commands.
pub fn write_request<S: AsRef<[u8]>>(tokens: &[S], out: &mut BytesMut) {
    let count = tokens.len().to_string();
    out.reserve(1 + count.len() + 2);
    out.put_u8(b'*');
    out.put_slice(count.as_bytes());
    out.put_slice(b"\r\n");
    for token in tokens {
        write_bulk(token.as_ref(), out);
    }
}

/// Bytes up to the next CRLF, plus the count consumed including the CRLF.
fn read_line(data: &[u8]) -> Result<(&[u8], usize), DecodeError> {
    let Some(pos) = data.iter().position(|&b| b == b'\r') else {
        return Err(DecodeError::Incomplete);
    };
    if pos + 1 >= data.len() {
        return Err(DecodeError::Incomplete);
    }
    if data[pos + 1] != b'\n' {
        return Err(DecodeError::ExpectedCrlf);
    }
    Ok((&data[..pos], pos + 2))
}

/// Decimal length header of a bulk string or array. `-1` marks the null
/// value; anything else must be an unsigned decimal.
fn read_length(line: &[u8]) -> Result<Option<usize>, DecodeError> {
    if line == b"-1" {
        return Ok(None);
    }
    if line.is_empty() || !line.iter().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidLength);
    }
    let mut len: usize = 0;
    for &b in line {
        len = len
            .checked_mul(10)
            .and_then(|len| len.checked_add(usize::from(b - b'0')))
            .ok_or(DecodeError::InvalidLength)?;
    }
    Ok(Some(len))
}

fn read_integer(line: &[u8]) -> Result<i64, DecodeError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(DecodeError::InvalidInteger)
}

fn read_bulk(data: &[u8]) -> Result<(Value, usize), DecodeError> {
    let (header, n) = read_line(&data[1..])?;
    let pos = 1 + n;
    let Some(len) = read_length(header)? else {
        return Ok((Value::Null, pos));
    };
    // The payload plus its trailing CRLF must be fully present before any
    // of it is read; a declared length never licenses reading past the end.
    if data.len() < pos + len + 2 {
        return Err(DecodeError::Incomplete);
    }
    if &data[pos + len..pos + len + 2] != b"\r\n" {
        return Err(DecodeError::ExpectedCrlf);
    }
    let payload = Bytes::copy_from_slice(&data[pos..pos + len]);
    Ok((Value::Bulk(payload), pos + len + 2))
}

fn read_array(data: &[u8]) -> Result<(Value, usize), DecodeError> {
    let (header, n) = read_line(&data[1..])?;
    let mut pos = 1 + n;
    let Some(count) = read_length(header)? else {
        return Ok((Value::Null, pos));
    };
    // Cap the preallocation; the declared count is client-controlled.
    let mut items = Vec::with_capacity(count.min(32));
    for _ in 0..count {
        let (item, used) = parse(&data[pos..])?;
        items.push(item);
        pos += used;
    }
    Ok((Value::Array(items), pos))
}

fn into_utf8(line: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(line.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}
