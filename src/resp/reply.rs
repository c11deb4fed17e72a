//! The tagged reply value and its coercions to scalar, list and map shapes.

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};

/// A single RESP reply, parsed into one of the five wire forms.
///
/// Equivalent to the teacher's `DatoRedis` tagged union, narrowed to the
/// six reply kinds the wire contract actually names (`Status`, `Error`,
/// `Integer`, `Nil`, `Bulk`, `Multi`) and carrying byte-exact payloads
/// rather than owned `String`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A short ASCII status line, e.g. `OK`.
    Status(Bytes),
    /// A server-sent error line (without the leading `-` tag).
    Error(RedisError),
    /// A signed 64-bit integer.
    Integer(i64),
    /// The absence of a value (`$-1` or `*-1`).
    Nil,
    /// A length-prefixed, binary-safe byte string.
    Bulk(Bytes),
    /// An ordered sequence of sub-replies.
    Multi(Vec<Reply>),
}

impl Reply {
    pub fn status(s: impl Into<Bytes>) -> Self {
        Reply::Status(s.into())
    }

    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Reply::Bulk(b.into())
    }

    pub fn error_line(line: impl Into<String>) -> Self {
        Reply::Error(RedisError::from_server_error_line(line))
    }

    /// Valid for [`Reply::Status`] and [`Reply::Bulk`]; everything else is
    /// a `TypeMismatch`, and an `Error` reply surfaces its carried error.
    pub fn as_bytes(&self) -> RedisResult<&[u8]> {
        match self {
            Reply::Status(b) | Reply::Bulk(b) => Ok(b),
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as bytes"
            ))),
        }
    }

    pub fn as_string(&self) -> RedisResult<String> {
        let bytes = self.as_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RedisError::type_mismatch(format!("not valid utf-8: {e}")))
    }

    /// `Integer` directly; on `Bulk`, parses the ASCII decimal contents.
    /// `Status` is not accepted — the wire contract names only Integer/Bulk.
    pub fn as_int(&self) -> RedisResult<i64> {
        match self {
            Reply::Integer(i) => Ok(*i),
            Reply::Bulk(b) => {
                let s = std::str::from_utf8(b).map_err(|e| RedisError::type_mismatch(format!("not valid utf-8: {e}")))?;
                s.trim()
                    .parse::<i64>()
                    .map_err(|e| RedisError::type_mismatch(format!("not an integer: {e}")))
            }
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as int"
            ))),
        }
    }

    /// `Bulk` parsed as a decimal float; otherwise error. Unlike `as_int`,
    /// `Status` is not accepted here — the wire contract names only Bulk.
    pub fn as_float(&self) -> RedisResult<f64> {
        match self {
            Reply::Bulk(b) => {
                let s = std::str::from_utf8(b).map_err(|e| RedisError::type_mismatch(format!("not valid utf-8: {e}")))?;
                s.trim()
                    .parse::<f64>()
                    .map_err(|e| RedisError::type_mismatch(format!("not a float: {e}")))
            }
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as float"
            ))),
        }
    }

    /// `Integer`/`Bulk`: `0` / `"0"` is `false`, anything else is `true`.
    /// `Status` is not accepted — the wire contract names only Integer/Bulk.
    pub fn as_bool(&self) -> RedisResult<bool> {
        match self {
            Reply::Integer(i) => Ok(*i != 0),
            Reply::Bulk(b) => {
                let s = std::str::from_utf8(b).map_err(|e| RedisError::type_mismatch(format!("not valid utf-8: {e}")))?;
                Ok(s != "0")
            }
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as bool"
            ))),
        }
    }

    /// `Multi` only; each child must be `Bulk` (used verbatim) or `Nil`
    /// (rendered as an empty string).
    pub fn as_list(&self) -> RedisResult<Vec<Vec<u8>>> {
        match self {
            Reply::Multi(items) => items
                .iter()
                .map(|item| match item {
                    Reply::Bulk(b) => Ok(b.to_vec()),
                    Reply::Nil => Ok(Vec::new()),
                    Reply::Error(e) => Err(e.clone()),
                    other => Err(RedisError::type_mismatch(format!(
                        "list element {other:?} is neither Bulk nor Nil"
                    ))),
                })
                .collect(),
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as list"
            ))),
        }
    }

    /// `Multi` with an even child count, alternating Bulk keys and
    /// Bulk-or-Nil values; Nil values are dropped from the result.
    pub fn as_map(&self) -> RedisResult<std::collections::HashMap<String, Vec<u8>>> {
        match self {
            Reply::Multi(items) => {
                if items.len() % 2 != 0 {
                    return Err(RedisError::type_mismatch(
                        "multi reply has an odd number of children for a map",
                    ));
                }
                let mut map = std::collections::HashMap::with_capacity(items.len() / 2);
                for pair in items.chunks_exact(2) {
                    let key = match &pair[0] {
                        Reply::Bulk(b) => String::from_utf8(b.to_vec())
                            .map_err(|e| RedisError::type_mismatch(format!("key not utf-8: {e}")))?,
                        other => {
                            return Err(RedisError::type_mismatch(format!(
                                "map key {other:?} is not Bulk"
                            )));
                        }
                    };
                    match &pair[1] {
                        Reply::Bulk(b) => {
                            map.insert(key, b.to_vec());
                        }
                        Reply::Nil => {
                            // dropped, per the HGETALL scenario in the wire contract
                        }
                        other => {
                            return Err(RedisError::type_mismatch(format!(
                                "map value {other:?} is neither Bulk nor Nil"
                            )));
                        }
                    }
                }
                Ok(map)
            }
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as map"
            ))),
        }
    }

    /// `Nil` succeeds; `Error` surfaces its carried error; anything else
    /// is a `TypeMismatch`.
    pub fn expect_nil(&self) -> RedisResult<()> {
        match self {
            Reply::Nil => Ok(()),
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "expected Nil, got {self:?}"
            ))),
        }
    }

    /// `Multi` of sub-replies; `Error` surfaces its carried error.
    pub fn as_multi(&self) -> RedisResult<&[Reply]> {
        match self {
            Reply::Multi(items) => Ok(items),
            Reply::Error(e) => Err(e.clone()),
            _ => Err(RedisError::type_mismatch(format!(
                "cannot read {self:?} as multi"
            ))),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}
