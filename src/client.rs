//! A convenience façade over [`Connection`] exposing the normative command
//! set as typed methods.

use std::net::ToSocketAddrs;
use std::time::Duration;

use crate::args::{command, ToRedisArg};
use crate::connection::Connection;
use crate::error::RedisResult;
use crate::resp::reply::Reply;

/// Wraps one [`Connection`] with named methods for the normative command
/// set, grounded in the original's `Gedis` convenience methods but with
/// every argument actually sent — the original drops the key in both
/// `Set` and `Get`, which this implementation corrects.
pub struct Client {
    conn: Connection,
}

impl Client {
    pub fn dial(
        addr: impl ToSocketAddrs,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> RedisResult<Self> {
        Ok(Client {
            conn: Connection::dial(addr, read_timeout, write_timeout)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Client { conn }
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Sends an arbitrary command and returns the raw reply.
    pub fn exec(&mut self, args: &[Vec<u8>]) -> RedisResult<Reply> {
        self.conn.exec(args)
    }

    /// Writes `args` without reading a reply. Used by the pub/sub
    /// demultiplexer, which needs to send a subscribe-family command and
    /// then read back a variable, interleaved number of replies itself
    /// rather than have `exec` consume the first one.
    pub(crate) fn send_command(&mut self, args: &[Vec<u8>]) -> RedisResult<()> {
        self.conn.append(args)?;
        self.conn.flush()
    }

    /// Reads one reply without writing a command first, tolerating a
    /// timeout rather than treating it as fatal. Used by the pub/sub
    /// demultiplexer, which issues a batch of subscribe commands and then
    /// drains replies one at a time, and for which a bare timeout is an
    /// ordinary "nothing to deliver yet" outcome rather than a protocol
    /// desync.
    pub(crate) fn read_reply_only(&mut self) -> RedisResult<Reply> {
        self.conn.read_reply_lenient()
    }

    pub fn ping(&mut self) -> RedisResult<Reply> {
        self.exec(&[b"PING".to_vec()])
    }

    pub fn echo(&mut self, message: &str) -> RedisResult<Reply> {
        self.exec(&command("ECHO", vec![message.to_redis_arg()]))
    }

    pub fn select(&mut self, index: i64) -> RedisResult<Reply> {
        self.exec(&command("SELECT", vec![index.to_redis_arg()]))
    }

    pub fn quit(&mut self) -> RedisResult<Reply> {
        self.exec(&[b"QUIT".to_vec()])
    }

    pub fn save(&mut self) -> RedisResult<Reply> {
        self.exec(&[b"SAVE".to_vec()])
    }

    pub fn shutdown(&mut self) -> RedisResult<Reply> {
        self.exec(&[b"SHUTDOWN".to_vec()])
    }

    /// `GET key`. The original sends only the command name, dropping the
    /// key entirely; this sends the key as spec.md §9 directs.
    pub fn get(&mut self, key: &str) -> RedisResult<Reply> {
        self.exec(&command("GET", vec![key.to_redis_arg()]))
    }

    /// `SET key value`. The original sends only `SET value`, omitting the
    /// key; this sends both arguments.
    pub fn set(&mut self, key: &str, value: impl ToRedisArg) -> RedisResult<Reply> {
        self.exec(&command("SET", vec![key.to_redis_arg(), value.to_redis_arg()]))
    }

    pub fn del(&mut self, key: &str) -> RedisResult<Reply> {
        self.exec(&command("DEL", vec![key.to_redis_arg()]))
    }

    pub fn sentinel_get_master_addr_by_name(&mut self, name: &str) -> RedisResult<Reply> {
        self.exec(&command(
            "SENTINEL",
            vec![b"get-master-addr-by-name".to_vec(), name.to_redis_arg()],
        ))
    }

    /// Clones a shutdown handle to the underlying socket, letting a third
    /// party cancel an in-flight blocking read from another thread.
    pub(crate) fn shutdown_handle(&self) -> RedisResult<std::net::TcpStream> {
        self.conn.shutdown_handle()
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    pub fn close(&mut self) {
        self.conn.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::thread;

    /// Replies `+OK\r\n` to everything it receives, recording the raw bytes
    /// of the first command so the test can assert on wire content.
    fn recording_server() -> (std::net::SocketAddr, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 256];
            let n = sock.read(&mut buf).unwrap();
            buf.truncate(n);
            let _ = sock.write_all(b"+OK\r\n");
            buf
        });
        (addr, handle)
    }

    #[test]
    fn set_sends_key_and_value() {
        let (addr, handle) = recording_server();
        let mut client = Client::dial(addr, None, None).unwrap();
        client.set("mykey", "myvalue").unwrap();
        let sent = handle.join().unwrap();
        let text = String::from_utf8(sent).unwrap();
        assert!(text.contains("SET"));
        assert!(text.contains("mykey"));
        assert!(text.contains("myvalue"));
    }

    #[test]
    fn get_sends_key() {
        let (addr, handle) = recording_server();
        let mut client = Client::dial(addr, None, None).unwrap();
        client.get("mykey").unwrap();
        let sent = handle.join().unwrap();
        let text = String::from_utf8(sent).unwrap();
        assert!(text.contains("GET"));
        assert!(text.contains("mykey"));
    }
}
