//! Byte-exact RESP framing: reading a [`Reply`] off a stream and writing a
//! command as an array of bulk strings.
//!
//! Unlike the teacher's `protocol_resp` module, which tokenizes on `String`
//! and indexes by `char`, everything here operates on raw bytes so that
//! binary-safe bulk payloads round-trip exactly and so a single line is
//! never re-validated as UTF-8 before its tag is even known.

use std::io::{BufRead, Write};

use bytes::Bytes;

use super::{CRLF, MAX_ARRAY_LEN, MAX_LEN_BULK_TYPE, TAG_ARRAY, TAG_BULK, TAG_ERROR, TAG_INTEGER, TAG_STATUS};
use crate::error::{RedisError, RedisResult};
use crate::resp::reply::Reply;

/// Reads one complete RESP reply from `r`, recursing into `Multi` children.
pub fn read_reply(r: &mut impl BufRead) -> RedisResult<Reply> {
    let line = read_line(r)?;
    let (&tag, rest) = line
        .split_first()
        .ok_or_else(|| RedisError::protocol("empty reply line"))?;

    match tag {
        TAG_STATUS => Ok(Reply::Status(Bytes::copy_from_slice(rest))),
        TAG_ERROR => {
            let text = std::str::from_utf8(rest)?;
            Ok(Reply::error_line(text.to_string()))
        }
        TAG_INTEGER => {
            let text = std::str::from_utf8(rest)?;
            let n: i64 = text
                .parse()
                .map_err(|_| RedisError::protocol(format!("invalid integer reply: {text:?}")))?;
            Ok(Reply::Integer(n))
        }
        TAG_BULK => read_bulk(r, rest),
        TAG_ARRAY => read_array(r, rest),
        other => Err(RedisError::protocol(format!(
            "unrecognised reply tag: {:?}",
            other as char
        ))),
    }
}

fn read_bulk(r: &mut impl BufRead, len_field: &[u8]) -> RedisResult<Reply> {
    let len_text = std::str::from_utf8(len_field)?;
    let len: i64 = len_text
        .parse()
        .map_err(|_| RedisError::protocol(format!("invalid bulk length: {len_text:?}")))?;

    if len < 0 {
        return Ok(Reply::Nil);
    }
    let len = len as usize;
    if len > MAX_LEN_BULK_TYPE {
        return Err(RedisError::protocol(format!(
            "bulk length {len} exceeds maximum {MAX_LEN_BULK_TYPE}"
        )));
    }

    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    let mut crlf = [0u8; 2];
    r.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(RedisError::protocol("bulk payload missing trailing CRLF"));
    }
    Ok(Reply::Bulk(Bytes::from(buf)))
}

fn read_array(r: &mut impl BufRead, len_field: &[u8]) -> RedisResult<Reply> {
    let len_text = std::str::from_utf8(len_field)?;
    let len: i64 = len_text
        .parse()
        .map_err(|_| RedisError::protocol(format!("invalid array length: {len_text:?}")))?;

    if len < 0 {
        return Ok(Reply::Nil);
    }
    let len = len as usize;
    if len > MAX_ARRAY_LEN {
        return Err(RedisError::protocol(format!(
            "array length {len} exceeds maximum {MAX_ARRAY_LEN}"
        )));
    }

    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(read_reply(r)?);
    }
    Ok(Reply::Multi(items))
}

/// Reads up to but not including the terminating CRLF, which is consumed
/// and discarded.
fn read_line(r: &mut impl BufRead) -> RedisResult<Vec<u8>> {
    let mut line = Vec::new();
    let n = r.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(RedisError::protocol("connection closed before a reply line"));
    }
    if line.last() != Some(&b'\n') {
        return Err(RedisError::protocol("reply line missing terminating LF"));
    }
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    } else {
        return Err(RedisError::protocol("reply line missing terminating CR"));
    }
    Ok(line)
}

/// Serialises `args` as a RESP array of bulk strings and writes it as a
/// single buffered write.
pub fn write_command(w: &mut impl Write, args: &[Vec<u8>]) -> RedisResult<()> {
    let mut buf = Vec::with_capacity(32 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    buf.extend_from_slice(b"*");
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    for arg in args {
        buf.extend_from_slice(b"$");
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(arg);
        buf.extend_from_slice(CRLF);
    }
    w.write_all(&buf)?;
    Ok(())
}
