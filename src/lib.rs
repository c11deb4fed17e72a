//! A client library for a Redis-compatible key/value server.
//!
//! Synchronous and thread-based throughout — no async runtime. Provides
//! RESP framing, a typed reply model, connection pooling, sentinel-driven
//! master discovery with automatic failover, consistent-hash sharding, and
//! pub/sub demultiplexing.

pub mod args;
pub mod client;
pub mod connection;
pub mod error;
pub mod hostport;
pub mod pool;
pub mod pubsub;
pub mod resp;
pub mod sentinel;
pub mod shard;

pub use args::ToRedisArg;
pub use client::Client;
pub use connection::Connection;
pub use error::{RedisError, RedisErrorKind, RedisResult};
pub use hostport::HostAndPort;
pub use pool::{Pool, PooledConnection};
pub use pubsub::{PubSubClient, PubSubReply};
pub use resp::Reply;
pub use sentinel::SentinelPool;
pub use shard::{ShardInfo, ShardedClient, ShardedPool};
