//! A single, owned TCP connection to a server, speaking RESP.

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{RedisError, RedisResult};
use crate::resp::codec::{read_reply, write_command};
use crate::resp::reply::Reply;

/// One TCP connection, owned exclusively by whoever holds it.
///
/// Mirrors the teacher's `RedisDriver` wrapping a `TcpStream`, minus the
/// `Deref`-to-socket surface (callers go through `exec`, not raw I/O) and
/// minus the HELLO/AUTH handshake, which is out of the normative command
/// set here.
pub struct Connection {
    stream: BufReader<TcpStream>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    closed: bool,
}

impl Connection {
    /// Dials `addr`, applying `read_timeout`/`write_timeout` to every
    /// subsequent operation. A `None` timeout leaves the socket blocking
    /// with no deadline, matching the original's "only set a deadline when
    /// the configured timeout is non-zero" rule.
    pub fn dial(
        addr: impl ToSocketAddrs,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> RedisResult<Self> {
        let stream = TcpStream::connect(addr).map_err(|e| RedisError::dial(e.to_string()))?;
        stream.set_nodelay(true).map_err(|e| RedisError::dial(e.to_string()))?;
        stream
            .set_read_timeout(read_timeout)
            .map_err(|e| RedisError::dial(e.to_string()))?;
        stream
            .set_write_timeout(write_timeout)
            .map_err(|e| RedisError::dial(e.to_string()))?;
        debug!(?read_timeout, ?write_timeout, "dialed connection");
        Ok(Self::from_stream(stream, read_timeout, write_timeout))
    }

    fn from_stream(stream: TcpStream, read_timeout: Option<Duration>, write_timeout: Option<Duration>) -> Self {
        Connection {
            stream: BufReader::new(stream),
            read_timeout,
            write_timeout,
            closed: false,
        }
    }

    /// Clones the underlying socket handle so a third party can shut it
    /// down from another thread, unblocking whatever read this connection
    /// is currently performing. Used to cancel a sentinel listener thread
    /// without it having to poll a flag.
    pub fn shutdown_handle(&self) -> RedisResult<TcpStream> {
        self.stream.get_ref().try_clone().map_err(|e| e.into())
    }

    /// Writes `args` as a command and reads back exactly one reply.
    ///
    /// A non-timeout I/O error on either half is fatal: the connection is
    /// marked closed and every subsequent call returns `RedisErrorKind::Closed`
    /// without touching the socket again. A timeout leaves the connection
    /// usable for a retry at the caller's discretion.
    pub fn exec(&mut self, args: &[Vec<u8>]) -> RedisResult<Reply> {
        self.append(args)?;
        self.flush()?;
        self.read_reply()
    }

    /// Buffers a command for a later `flush`, without waiting for a reply.
    /// Used by pub/sub, which issues several subscribe commands before
    /// reading any acknowledgements.
    pub fn append(&mut self, args: &[Vec<u8>]) -> RedisResult<()> {
        if self.closed {
            return Err(RedisError::closed());
        }
        write_command(self.stream.get_mut(), args).map_err(|e| self.fail(e))
    }

    pub fn flush(&mut self) -> RedisResult<()> {
        if self.closed {
            return Err(RedisError::closed());
        }
        self.stream.get_mut().flush().map_err(|e| self.fail(e.into()))
    }

    /// Reads the next reply. A timeout here is fatal, same as any other
    /// I/O error: a timed-out read leaves the stream's position unknown,
    /// so the connection cannot be trusted to stay in sync.
    pub fn read_reply(&mut self) -> RedisResult<Reply> {
        if self.closed {
            return Err(RedisError::closed());
        }
        match read_reply(&mut self.stream) {
            Ok(reply) => Ok(reply),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Reads the next reply without treating a timeout as fatal. Used by
    /// the pub/sub demultiplexer, where a `receive` that simply has
    /// nothing to deliver yet is a normal, recoverable outcome rather than
    /// a sign the connection has fallen out of sync.
    pub fn read_reply_lenient(&mut self) -> RedisResult<Reply> {
        if self.closed {
            return Err(RedisError::closed());
        }
        match read_reply(&mut self.stream) {
            Ok(reply) => Ok(reply),
            Err(e) if e.is_timeout() => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Records a fatal (non-timeout) failure and shuts the socket down so
    /// no further bytes can be read or written through it.
    fn fail(&mut self, err: RedisError) -> RedisError {
        self.closed = true;
        let _ = self.stream.get_ref().shutdown(Shutdown::Both);
        trace!(error = %err, "connection failed, marking closed");
        err
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the socket. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            let _ = self.stream.get_ref().shutdown(Shutdown::Both);
            self.closed = true;
            debug!("connection closed");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
