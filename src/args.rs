//! Typed conversion of Rust values into RESP command arguments.
//!
//! Replaces the `interface{}`-splatting calling convention of the original
//! with a small sealed-ish trait implemented for the scalar types a command
//! argument can reasonably be.

/// Converts a value into its canonical byte-string form for use as one
/// argument of a [`crate::resp::codec::write_command`] call.
pub trait ToRedisArg {
    fn to_redis_arg(&self) -> Vec<u8>;
}

impl ToRedisArg for &str {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToRedisArg for String {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToRedisArg for &[u8] {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl ToRedisArg for Vec<u8> {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.clone()
    }
}

impl ToRedisArg for i64 {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToRedisArg for i32 {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToRedisArg for u64 {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToRedisArg for f64 {
    fn to_redis_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToRedisArg for bool {
    fn to_redis_arg(&self) -> Vec<u8> {
        if *self { b"1".to_vec() } else { b"0".to_vec() }
    }
}

/// Builds a command's argument vector from a slice of heterogeneous values
/// that all happen to implement [`ToRedisArg`] once boxed behind a common
/// call site; most callers instead just push `to_redis_arg()` results
/// directly, this helper exists for the common "name + args" shape.
pub fn command(name: &str, args: impl IntoIterator<Item = Vec<u8>>) -> Vec<Vec<u8>> {
    let mut out = vec![name.as_bytes().to_vec()];
    out.extend(args);
    out
}
