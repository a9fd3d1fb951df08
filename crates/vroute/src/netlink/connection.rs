//! Request/ACK exchange over a route socket.

use std::path::Path;

use tracing::trace;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{MessageIter, NlMsgError};
use super::socket::NetlinkSocket;

/// An rtnetlink connection that submits requests one at a time.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Open a connection in the current network namespace.
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new()?,
        })
    }

    /// Open a connection inside the network namespace at `ns_path`.
    pub fn new_in_namespace_path<P: AsRef<Path>>(ns_path: P) -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new_in_namespace_path(ns_path)?,
        })
    }

    /// Send a request that expects an ACK only (no data response).
    pub async fn request_ack(&self, mut builder: MessageBuilder) -> Result<()> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        trace!(seq, len = msg.len(), "sending request");
        self.socket.send(&msg).await?;

        // Datagrams for stale sequence numbers are skipped until ours arrives.
        loop {
            let response = self.socket.recv_msg().await?;
            if let Some(result) = process_ack(&response, seq) {
                return result;
            }
        }
    }
}

/// Look for the ACK or error matching `expected_seq` in a received datagram.
fn process_ack(data: &[u8], expected_seq: u32) -> Option<Result<()>> {
    for result in MessageIter::new(data) {
        let (header, payload) = match result {
            Ok(msg) => msg,
            Err(e) => return Some(Err(e)),
        };

        if header.nlmsg_seq != expected_seq || !header.is_error() {
            continue;
        }

        return Some(match NlMsgError::from_bytes(payload) {
            Ok(err) if err.is_ack() => Ok(()),
            Ok(err) => Err(Error::from_errno(err.error)),
            Err(e) => Err(e),
        });
    }
    None
}
