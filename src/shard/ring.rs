//! Consistent-hash ring: weighted virtual-node placement and key routing.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::hostport::HostAndPort;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Virtual nodes inserted per unit of weight, grounded in the original's
/// `Virtual_Node_Magic = 160`.
pub const VIRTUAL_NODE_MAGIC: u32 = 160;

/// Static description of one shard: its address and its weight in the
/// ring. `name`, when present, changes the virtual-node key formula.
///
/// Equality considers only the `(host, port)` pair, via [`HostAndPort`]'s
/// loopback-alias normalisation — two `ShardInfo`s naming the same machine
/// under different loopback spellings are the same shard regardless of
/// `name` or `weight`.
#[derive(Debug, Clone)]
pub struct ShardInfo {
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    pub weight: u32,
}

impl ShardInfo {
    pub fn new(host: impl Into<String>, port: u16, weight: u32) -> Self {
        ShardInfo { host: host.into(), port, name: None, weight }
    }

    pub fn named(name: impl Into<String>, host: impl Into<String>, port: u16, weight: u32) -> Self {
        ShardInfo { host: host.into(), port, name: Some(name.into()), weight }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn host_and_port(&self) -> HostAndPort {
        HostAndPort::new(self.host.clone(), self.port)
    }
}

impl PartialEq for ShardInfo {
    fn eq(&self, other: &Self) -> bool {
        self.host_and_port() == other.host_and_port()
    }
}

impl Eq for ShardInfo {}

fn hash(data: &str) -> u32 {
    CRC32.checksum(data.as_bytes())
}

/// The virtual-node key for shard index `shard_index`'s `n`th virtual
/// node. Unnamed shards hash `"SHARD-{i}-NODE-{n}"`; named shards hash
/// `"{name}*{weight}{n}"`, with no separator before `n` — preserved as-is
/// rather than "fixed", since the specification calls this one out as
/// deliberately unchanged.
fn virtual_node_key(shard_index: usize, shard: &ShardInfo, n: u32) -> String {
    match &shard.name {
        Some(name) => format!("{name}*{}{n}", shard.weight),
        None => format!("SHARD-{shard_index}-NODE-{n}"),
    }
}

/// A sorted hash ring mapping `crc32(key)` to the shard whose virtual node
/// is nearest clockwise, wrapping to the first entry past the maximum
/// hash value.
#[derive(Debug, Default)]
pub struct Ring {
    // Sorted by hash ascending.
    nodes: Vec<(u32, usize)>,
}

impl Ring {
    pub fn new() -> Self {
        Ring { nodes: Vec::new() }
    }

    /// Inserts `160 * shard.weight` virtual nodes for `shard_index`. Only
    /// called once that shard's connection has been dialed successfully —
    /// the original inverts this condition (`if err != nil { insert }`),
    /// which would populate the ring with nodes for shards that are not
    /// actually reachable; this corrects it to insert on success.
    pub fn insert_shard(&mut self, shard_index: usize, shard: &ShardInfo) {
        let count = VIRTUAL_NODE_MAGIC * shard.weight;
        for n in 0..count {
            let key = virtual_node_key(shard_index, shard, n);
            let h = hash(&key);
            let pos = self.nodes.partition_point(|&(existing, _)| existing < h);
            self.nodes.insert(pos, (h, shard_index));
        }
    }

    /// Removes every virtual node belonging to `shard_index`, used when a
    /// shard is taken out of rotation.
    pub fn remove_shard(&mut self, shard_index: usize) {
        self.nodes.retain(|&(_, idx)| idx != shard_index);
    }

    /// Routes `key` to a shard index by locating the first virtual node
    /// whose hash is greater than or equal to `crc32(key)`, wrapping to
    /// the ring's first entry when `key` hashes past every node.
    pub fn locate(&self, key: &str) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let h = hash(key);
        let pos = self.nodes.partition_point(|&(existing, _)| existing < h);
        let pos = if pos == self.nodes.len() { 0 } else { pos };
        Some(self.nodes[pos].1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
