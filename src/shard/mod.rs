//! Consistent-hash sharding: routing keys across a fixed set of servers.

pub mod client;
pub mod pool;
pub mod ring;

pub use client::ShardedClient;
pub use pool::{new_sharded_pool, PooledShardedClient, ShardedPool};
pub use ring::{Ring, ShardInfo, VIRTUAL_NODE_MAGIC};
