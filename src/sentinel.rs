//! Sentinel-monitored master discovery and automatic failover.
//!
//! Grounded in `gedis.SentinelGedisPool`: master address discovery via
//! `SENTINEL get-master-addr-by-name`, one listener thread per configured
//! sentinel subscribing to `+switch-master`, and a mutex-guarded pool
//! rebuild when a switch event names the monitored master. Unlike the
//! original's listener goroutines, which poll a `running` boolean, the
//! listener threads here are cancelled by shutting down their socket: the
//! blocked `receive()` call returns an I/O error, the thread checks a
//! `closing` flag to tell a deliberate shutdown from a real fault, and
//! exits either way.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::Client;
use crate::connection::Connection;
use crate::error::{RedisError, RedisResult};
use crate::hostport::HostAndPort;
use crate::pool::{Pool, PooledConnection};
use crate::pubsub::{PubSubClient, PubSubReply};

const SWITCH_MASTER_CHANNEL: &str = "+switch-master";

/// A pool of connections to whichever server the configured sentinels
/// currently agree is master for `master_name`, rebuilt transparently on
/// failover.
pub struct SentinelPool {
    master_name: String,
    pool_size: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    current: Mutex<(HostAndPort, Arc<Pool<Connection>>)>,
    listeners: Mutex<Vec<ListenerHandle>>,
}

struct ListenerHandle {
    shutdown: TcpStream,
    closing: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SentinelPool {
    /// Discovers the current master by asking each sentinel in turn,
    /// failing with `MasterUnreachable` only if none of them answer. Then
    /// eagerly dials `pool_size` connections to that master and spawns one
    /// listener thread per sentinel.
    pub fn new(
        sentinels: Vec<String>,
        master_name: impl Into<String>,
        pool_size: usize,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> RedisResult<Arc<Self>> {
        let master_name = master_name.into();
        let master = discover_master(&sentinels, &master_name)?;
        let pool = build_master_pool(&master, pool_size, read_timeout, write_timeout)?;

        let this = Arc::new(SentinelPool {
            master_name,
            pool_size,
            read_timeout,
            write_timeout,
            current: Mutex::new((master, pool)),
            listeners: Mutex::new(Vec::with_capacity(sentinels.len())),
        });

        for addr in sentinels {
            match spawn_listener(Arc::clone(&this), addr.clone()) {
                Ok(handle) => this.listeners.lock().unwrap().push(handle),
                Err(e) => warn!(sentinel = %addr, error = %e, "failed to start sentinel listener"),
            }
        }

        Ok(this)
    }

    /// Non-blocking acquire against the current master pool. Unlike the
    /// basic [`Pool`], an empty reservoir is an `Exhausted` error rather
    /// than an overflow construction, matching the original's
    /// `SentinelGedisPool.Get`.
    pub fn acquire(&self) -> RedisResult<PooledConnection<Connection>> {
        let (_, pool) = &*self.current.lock().unwrap();
        pool.try_acquire_existing().ok_or_else(RedisError::exhausted)
    }

    pub fn current_master(&self) -> HostAndPort {
        self.current.lock().unwrap().0.clone()
    }

    fn rebuild(&self, new_master: HostAndPort) {
        let mut guard = self.current.lock().unwrap();
        if guard.0 == new_master {
            return;
        }
        match build_master_pool(&new_master, self.pool_size, self.read_timeout, self.write_timeout) {
            Ok(new_pool) => {
                info!(master = %new_master, "sentinel pool rebuilt after master switch");
                let (_, old_pool) = std::mem::replace(&mut *guard, (new_master, new_pool));
                old_pool.drain();
            }
            Err(e) => {
                warn!(master = %new_master, error = %e, "failed to rebuild pool for new master");
            }
        }
    }

    /// Shuts down every sentinel listener socket, which unblocks each
    /// thread's in-flight read, then joins all the threads and drains the
    /// current master pool.
    pub fn close(&self) {
        let mut listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter_mut() {
            listener.closing.store(true, Ordering::SeqCst);
            let _ = listener.shutdown.shutdown(std::net::Shutdown::Both);
        }
        for listener in listeners.iter_mut() {
            if let Some(join) = listener.join.take() {
                let _ = join.join();
            }
        }
        drop(listeners);
        self.current.lock().unwrap().1.drain();
    }
}

impl Drop for SentinelPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn discover_master(sentinels: &[String], master_name: &str) -> RedisResult<HostAndPort> {
    for addr in sentinels {
        match Client::dial(addr, Some(Duration::from_secs(2)), Some(Duration::from_secs(2))) {
            Ok(mut client) => match client.sentinel_get_master_addr_by_name(master_name) {
                Ok(reply) => {
                    if let Ok(parts) = reply.as_list() {
                        if parts.len() == 2 {
                            let host = String::from_utf8_lossy(&parts[0]).to_string();
                            let port: u16 = String::from_utf8_lossy(&parts[1])
                                .parse()
                                .map_err(|_| RedisError::protocol("invalid sentinel port"))?;
                            return Ok(HostAndPort::new(host, port));
                        }
                    }
                }
                Err(e) => debug!(sentinel = %addr, error = %e, "sentinel query failed"),
            },
            Err(e) => debug!(sentinel = %addr, error = %e, "could not dial sentinel"),
        }
    }
    Err(RedisError::new(
        crate::error::RedisErrorKind::MasterUnreachable,
        format!("no sentinel in {sentinels:?} could name a master for {master_name:?}"),
    ))
}

fn build_master_pool(
    master: &HostAndPort,
    pool_size: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> RedisResult<Arc<Pool<Connection>>> {
    let addr = master.to_string();
    Pool::new(pool_size, move || Connection::dial(addr.clone(), read_timeout, write_timeout))
}

fn spawn_listener(pool: Arc<SentinelPool>, sentinel_addr: String) -> RedisResult<ListenerHandle> {
    let client = Client::dial(&sentinel_addr, None, None)?;
    let shutdown = client.shutdown_handle()?;
    let mut pubsub = PubSubClient::new(client);
    pubsub.subscribe(&[SWITCH_MASTER_CHANNEL])?;

    let closing = Arc::new(AtomicBool::new(false));
    let closing_for_thread = Arc::clone(&closing);
    let master_name = pool.master_name.clone();

    let join = std::thread::spawn(move || {
        loop {
            match pubsub.receive() {
                Ok(PubSubReply::Message { channel, payload }) if channel == SWITCH_MASTER_CHANNEL => {
                    let text = String::from_utf8_lossy(&payload);
                    let fields: Vec<&str> = text.split_whitespace().collect();
                    if fields.len() == 5 && fields[0] == master_name {
                        if let Ok(port) = fields[4].parse::<u16>() {
                            pool.rebuild(HostAndPort::new(fields[3], port));
                        }
                    }
                }
                Ok(_) => continue,
                Err(e) => {
                    if closing_for_thread.load(Ordering::SeqCst) {
                        debug!("sentinel listener shutting down");
                    } else {
                        warn!(error = %e, "sentinel listener lost its connection");
                    }
                    break;
                }
            }
        }
        pubsub.close();
    });

    Ok(ListenerHandle {
        shutdown,
        closing,
        join: Some(join),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn host_and_port_equality_drives_rebuild_skip() {
        let a = HostAndPort::new("127.0.0.1", 6379);
        let b = HostAndPort::new("localhost", 6379);
        assert_eq!(a, b);
    }

    /// A fake Redis server that replies `+OK\r\n` to every command on every
    /// connection it accepts, counting how many of those connections it has
    /// seen closed (by EOF or error) so a test can confirm a drained pool's
    /// connections were actually torn down, not merely forgotten about.
    fn always_ok_server() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let closed = Arc::new(AtomicUsize::new(0));
        let closed_for_thread = Arc::clone(&closed);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut sock) = stream else { break };
                let closed = Arc::clone(&closed_for_thread);
                thread::spawn(move || {
                    let mut buf = [0u8; 512];
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
                    closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        (addr, closed)
    }

    fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !condition() {
            if Instant::now() > deadline {
                panic!("condition did not become true within {timeout:?}");
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// End-to-end scenario 6 from the wire contract: a sentinel answers
    /// `SENTINEL get-master-addr-by-name` with the old master, then
    /// publishes a matching `+switch-master` message naming a new one; the
    /// pool's believed master moves to the new address and the old
    /// reservoir's connections are closed, not silently dropped.
    #[test]
    fn master_switch_rebuilds_pool_and_closes_old_connections() {
        let (old_master_addr, old_master_closed) = always_ok_server();
        let (new_master_addr, _new_master_closed) = always_ok_server();

        let sentinel_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let sentinel_addr = sentinel_listener.local_addr().unwrap();

        let master_name = "mymaster";
        let old_host = old_master_addr.ip().to_string();
        let old_port = old_master_addr.port();
        let new_host = new_master_addr.ip().to_string();
        let new_port = new_master_addr.port();

        let sentinel_thread = {
            let old_host = old_host.clone();
            let new_host = new_host.clone();
            thread::spawn(move || {
                // First connection: SENTINEL get-master-addr-by-name.
                let (mut discovery, _) = sentinel_listener.accept().unwrap();
                let mut buf = [0u8; 512];
                let _ = discovery.read(&mut buf).unwrap();
                let reply = format!(
                    "*2\r\n${}\r\n{old_host}\r\n${}\r\n{old_port}\r\n",
                    old_host.len(),
                    old_port.to_string().len()
                );
                discovery.write_all(reply.as_bytes()).unwrap();

                // Second connection: the +switch-master subscription.
                let (mut listen_sock, _) = sentinel_listener.accept().unwrap();
                let _ = listen_sock.read(&mut buf).unwrap();
                listen_sock
                    .write_all(b"*3\r\n$9\r\nsubscribe\r\n$14\r\n+switch-master\r\n:1\r\n")
                    .unwrap();

                thread::sleep(Duration::from_millis(50));

                let payload = format!("{master_name} {old_host} {old_port} {new_host} {new_port}");
                let msg = format!(
                    "*3\r\n$7\r\nmessage\r\n$14\r\n+switch-master\r\n${}\r\n{payload}\r\n",
                    payload.len()
                );
                listen_sock.write_all(msg.as_bytes()).unwrap();

                thread::sleep(Duration::from_millis(200));
            })
        };

        let pool = SentinelPool::new(vec![sentinel_addr.to_string()], master_name, 2, None, None).unwrap();
        assert_eq!(pool.current_master(), HostAndPort::new(old_host, old_port));

        let expected_new_master = HostAndPort::new(new_host, new_port);
        wait_until(
            || pool.current_master() == expected_new_master,
            Duration::from_secs(2),
        );

        wait_until(
            || old_master_closed.load(Ordering::SeqCst) >= 2,
            Duration::from_secs(2),
        );

        pool.close();
        sentinel_thread.join().unwrap();
    }
}
