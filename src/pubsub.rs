//! Subscribe/unsubscribe demultiplexing: buffering interleaved published
//! messages while consuming their corresponding acknowledgements inline.

use std::collections::VecDeque;

use crate::args::command;
use crate::client::Client;
use crate::error::{RedisError, RedisResult};
use crate::resp::reply::Reply;

/// One classified pub/sub event, grounded in `gedis.parseReply`'s
/// dispatch on `reply.Children[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubReply {
    Subscribe { channel: String, count: i64 },
    Unsubscribe { channel: String, count: i64 },
    PSubscribe { pattern: String, count: i64 },
    PUnsubscribe { pattern: String, count: i64 },
    Message { channel: String, payload: Vec<u8> },
    PMessage { pattern: String, channel: String, payload: Vec<u8> },
}

impl PubSubReply {
    /// Classifies a `Multi` reply by its first element, per the original's
    /// index table: `Children[1]` is the channel/pattern, `Children[2]` the
    /// count or body, and `pmessage` additionally carries the matched
    /// channel in `Children[2]` with the body in `Children[3]`.
    fn from_reply(reply: &Reply) -> RedisResult<Self> {
        let items = reply.as_multi()?;
        let kind = items
            .first()
            .ok_or_else(|| RedisError::protocol("empty pub/sub reply"))?
            .as_string()?;

        match kind.as_str() {
            "subscribe" => Ok(PubSubReply::Subscribe {
                channel: items[1].as_string()?,
                count: items[2].as_int()?,
            }),
            "unsubscribe" => Ok(PubSubReply::Unsubscribe {
                channel: items[1].as_string()?,
                count: items[2].as_int()?,
            }),
            "psubscribe" => Ok(PubSubReply::PSubscribe {
                pattern: items[1].as_string()?,
                count: items[2].as_int()?,
            }),
            "punsubscribe" => Ok(PubSubReply::PUnsubscribe {
                pattern: items[1].as_string()?,
                count: items[2].as_int()?,
            }),
            "message" => Ok(PubSubReply::Message {
                channel: items[1].as_string()?,
                payload: items[2].as_bytes()?.to_vec(),
            }),
            "pmessage" => Ok(PubSubReply::PMessage {
                pattern: items[1].as_string()?,
                channel: items[2].as_string()?,
                payload: items[3].as_bytes()?.to_vec(),
            }),
            other => Err(RedisError::protocol(format!("unrecognised pub/sub kind: {other}"))),
        }
    }

    fn is_message(&self) -> bool {
        matches!(self, PubSubReply::Message { .. } | PubSubReply::PMessage { .. })
    }
}

/// Wraps one [`Client`] dedicated to subscriptions, demultiplexing
/// published messages from subscribe/unsubscribe acknowledgements.
///
/// Grounded in `gedis.PubSubClient`: `filterMessages` issues a command and
/// then reads exactly one ack per name it named, buffering any `message`/
/// `pmessage` reply that arrives ahead of an ack rather than miscounting it
/// as one.
pub struct PubSubClient {
    client: Client,
    buffered: VecDeque<PubSubReply>,
}

impl PubSubClient {
    pub fn new(client: Client) -> Self {
        PubSubClient {
            client,
            buffered: VecDeque::new(),
        }
    }

    pub fn subscribe(&mut self, channels: &[&str]) -> RedisResult<Vec<PubSubReply>> {
        self.filter_command("SUBSCRIBE", channels)
    }

    pub fn psubscribe(&mut self, patterns: &[&str]) -> RedisResult<Vec<PubSubReply>> {
        self.filter_command("PSUBSCRIBE", patterns)
    }

    pub fn unsubscribe(&mut self, channels: &[&str]) -> RedisResult<Vec<PubSubReply>> {
        self.filter_command("UNSUBSCRIBE", channels)
    }

    pub fn punsubscribe(&mut self, patterns: &[&str]) -> RedisResult<Vec<PubSubReply>> {
        self.filter_command("PUNSUBSCRIBE", patterns)
    }

    fn filter_command(&mut self, name: &str, names: &[&str]) -> RedisResult<Vec<PubSubReply>> {
        let args = command(name, names.iter().map(|n| n.as_bytes().to_vec()));
        self.client.send_command(&args)?;
        let mut acks = Vec::with_capacity(names.len());
        let mut remaining = names.len();
        while remaining > 0 {
            let reply = self.client.read_reply_only()?;
            let parsed = PubSubReply::from_reply(&reply)?;
            if parsed.is_message() {
                self.buffered.push_back(parsed);
            } else {
                acks.push(parsed);
                remaining -= 1;
            }
        }
        Ok(acks)
    }

    /// Returns the next pub/sub event, preferring anything already
    /// buffered from a prior `filter_command` call over reading fresh off
    /// the wire.
    pub fn receive(&mut self) -> RedisResult<PubSubReply> {
        if let Some(msg) = self.buffered.pop_front() {
            return Ok(msg);
        }
        let reply = self.client.read_reply_only()?;
        PubSubReply::from_reply(&reply)
    }

    pub fn close(&mut self) {
        self.client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::thread;

    fn multi(items: Vec<Reply>) -> Reply {
        Reply::Multi(items)
    }

    #[test]
    fn subscribe_returns_after_s_acks_and_buffers_interleaved_messages_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let _ = sock.read(&mut buf).unwrap();
            // One ack interleaved with two live messages, then the second ack.
            sock.write_all(b"*3\r\n$9\r\nsubscribe\r\n$3\r\nch1\r\n:1\r\n").unwrap();
            sock.write_all(b"*3\r\n$7\r\nmessage\r\n$3\r\nch1\r\n$5\r\nfirst\r\n").unwrap();
            sock.write_all(b"*3\r\n$7\r\nmessage\r\n$3\r\nch1\r\n$6\r\nsecond\r\n").unwrap();
            sock.write_all(b"*3\r\n$9\r\nsubscribe\r\n$3\r\nch2\r\n:2\r\n").unwrap();
        });

        let client = Client::dial(addr, None, None).unwrap();
        let mut pubsub = PubSubClient::new(client);
        let acks = pubsub.subscribe(&["ch1", "ch2"]).unwrap();
        assert_eq!(
            acks,
            vec![
                PubSubReply::Subscribe { channel: "ch1".to_string(), count: 1 },
                PubSubReply::Subscribe { channel: "ch2".to_string(), count: 2 },
            ]
        );

        assert_eq!(
            pubsub.receive().unwrap(),
            PubSubReply::Message { channel: "ch1".to_string(), payload: b"first".to_vec() }
        );
        assert_eq!(
            pubsub.receive().unwrap(),
            PubSubReply::Message { channel: "ch1".to_string(), payload: b"second".to_vec() }
        );

        handle.join().unwrap();
    }

    #[test]
    fn classifies_subscribe_ack() {
        let reply = multi(vec![
            Reply::bulk(Bytes::from_static(b"subscribe")),
            Reply::bulk(Bytes::from_static(b"news")),
            Reply::Integer(1),
        ]);
        let parsed = PubSubReply::from_reply(&reply).unwrap();
        assert_eq!(
            parsed,
            PubSubReply::Subscribe { channel: "news".to_string(), count: 1 }
        );
    }

    #[test]
    fn classifies_message() {
        let reply = multi(vec![
            Reply::bulk(Bytes::from_static(b"message")),
            Reply::bulk(Bytes::from_static(b"news")),
            Reply::bulk(Bytes::from_static(b"hello")),
        ]);
        let parsed = PubSubReply::from_reply(&reply).unwrap();
        assert_eq!(
            parsed,
            PubSubReply::Message { channel: "news".to_string(), payload: b"hello".to_vec() }
        );
        assert!(parsed.is_message());
    }

    #[test]
    fn classifies_pmessage() {
        let reply = multi(vec![
            Reply::bulk(Bytes::from_static(b"pmessage")),
            Reply::bulk(Bytes::from_static(b"news.*")),
            Reply::bulk(Bytes::from_static(b"news.sports")),
            Reply::bulk(Bytes::from_static(b"goal")),
        ]);
        let parsed = PubSubReply::from_reply(&reply).unwrap();
        assert_eq!(
            parsed,
            PubSubReply::PMessage {
                pattern: "news.*".to_string(),
                channel: "news.sports".to_string(),
                payload: b"goal".to_vec(),
            }
        );
    }
}
