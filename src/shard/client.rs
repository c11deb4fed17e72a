//! A client that routes commands across a fixed set of shards by
//! consistent hash.

use crate::client::Client;
use crate::error::{RedisError, RedisResult};
use crate::resp::reply::Reply;
use crate::shard::ring::{Ring, ShardInfo};

/// A client owning one [`Client`] connection per shard, routing each key
/// to its shard via [`Ring`].
///
/// Grounded in `gedis.ShardedGedis`: built once from a fixed shard list,
/// dialing every shard eagerly and inserting each shard's virtual nodes
/// into the ring only once its connection has actually been established.
pub struct ShardedClient {
    shards: Vec<ShardInfo>,
    connections: Vec<Client>,
    ring: Ring,
}

impl ShardedClient {
    /// Dials every shard in `shards` in order. A shard whose dial fails
    /// aborts construction entirely and closes every connection already
    /// opened, matching the all-or-nothing construction of the original's
    /// pool builders; a partially up cluster is not a valid starting state.
    pub fn new(shards: Vec<ShardInfo>) -> RedisResult<Self> {
        let mut connections = Vec::with_capacity(shards.len());
        let mut ring = Ring::new();

        for (i, shard) in shards.iter().enumerate() {
            match Client::dial(shard.addr(), None, None) {
                Ok(client) => {
                    connections.push(client);
                    ring.insert_shard(i, shard);
                }
                Err(e) => {
                    for mut c in connections {
                        c.close();
                    }
                    return Err(e);
                }
            }
        }

        Ok(ShardedClient { shards, connections, ring })
    }

    /// Routes `key` to its shard's [`Client`].
    pub fn client_for(&mut self, key: &str) -> RedisResult<&mut Client> {
        let idx = self
            .ring
            .locate(key)
            .ok_or_else(|| RedisError::protocol("ring has no shards to route to"))?;
        Ok(&mut self.connections[idx])
    }

    pub fn get(&mut self, key: &str) -> RedisResult<Reply> {
        self.client_for(key)?.get(key)
    }

    pub fn set(&mut self, key: &str, value: &str) -> RedisResult<Reply> {
        self.client_for(key)?.set(key, value)
    }

    pub fn del(&mut self, key: &str) -> RedisResult<Reply> {
        self.client_for(key)?.del(key)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Closes every owned connection. A [`ShardedClient`] built directly
    /// via `new` does not belong to any pool, so closing it always closes
    /// its connections outright rather than returning them anywhere.
    pub fn close(&mut self) {
        for c in &mut self.connections {
            c.close();
        }
    }
}

impl Drop for ShardedClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::thread;

    fn always_ok_server() -> (std::net::SocketAddr, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            if let Ok((mut sock, _)) = listener.accept() {
                let mut buf = [0u8; 256];
                loop {
                    match sock.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            if sock.write_all(b"+OK\r\n").is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });
        (addr, handle)
    }

    #[test]
    fn routes_consistently_to_the_same_shard() {
        let (addr1, h1) = always_ok_server();
        let (addr2, h2) = always_ok_server();
        let shards = vec![
            ShardInfo::new(addr1.ip().to_string(), addr1.port(), 1),
            ShardInfo::new(addr2.ip().to_string(), addr2.port(), 1),
        ];
        let mut client = ShardedClient::new(shards).unwrap();
        let idx1 = client.ring.locate("same-key");
        let idx2 = client.ring.locate("same-key");
        assert_eq!(idx1, idx2);
        client.close();
        drop(client);
        h1.join().unwrap();
        h2.join().unwrap();
    }
}
