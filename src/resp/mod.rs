//! RESP (REdis Serialization Protocol) wire codec and typed reply model.

pub mod codec;
pub mod reply;

pub use codec::{read_reply, write_command};
pub use reply::Reply;

/// Tag bytes for the five RESP reply forms.
pub(crate) const TAG_STATUS: u8 = b'+';
pub(crate) const TAG_ERROR: u8 = b'-';
pub(crate) const TAG_INTEGER: u8 = b':';
pub(crate) const TAG_BULK: u8 = b'$';
pub(crate) const TAG_ARRAY: u8 = b'*';

/// Upper bound on a declared bulk-string length, "in spirit" per the wire
/// contract (512 MiB). Also applied to array/multi length headers: an
/// oversized or corrupted length prefix is the same failure mode whether
/// it precedes a bulk payload or a list of sub-replies.
pub const MAX_LEN_BULK_TYPE: usize = 512 * 1024 * 1024;
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

pub(crate) const CRLF: &[u8] = b"\r\n";
