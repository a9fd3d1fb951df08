//! Common test utilities for integration tests.
//!
//! Provides a fixed [`StaticResolver`] so parsing does not depend on the
//! host's interfaces, and a [`RecordingTransport`] that captures encoded
//! requests instead of talking to the kernel.

use std::collections::VecDeque;
use std::sync::Mutex;

use vroute::names::{Interface, NameResolver, RtNames};
use vroute::netlink::MessageBuilder;
use vroute::route::RouteParser;
use vroute::{Error, Result, RouteSpec};

/// Resolver with two interfaces and one extra routing table.
pub struct StaticResolver {
    names: RtNames,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self {
            names: RtNames::builtin(),
        }
    }
}

impl NameResolver for StaticResolver {
    fn resolve_interface(&self, name: &str) -> Option<Interface> {
        match name {
            "eth0" => Some(Interface::new("eth0", 2)),
            "eth1" => Some(Interface::new("eth1", 3)),
            _ => None,
        }
    }

    fn resolve_table(&self, name: &str) -> Option<u32> {
        match name {
            "vrrp" => Some(1000),
            _ => self.names.table(name),
        }
    }

    fn resolve_protocol(&self, name: &str) -> Option<u8> {
        self.names.protocol(name)
    }

    fn resolve_scope(&self, name: &str) -> Option<u8> {
        self.names.scope(name)
    }

    fn resolve_dsfield(&self, name: &str) -> Option<u8> {
        self.names.dsfield(name)
    }
}

/// Parse one route line, panicking on rejection.
pub fn parse(line: &str) -> RouteSpec {
    RouteParser::new(&StaticResolver::new())
        .parse_line(line)
        .unwrap_or_else(|e| panic!("{line}: {e}"))
}

/// Transport that records every submitted request.
///
/// Replies are taken from a queue of errnos; an empty queue or a `None`
/// entry acknowledges the request.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    replies: Mutex<VecDeque<Option<i32>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue kernel replies for the next requests, in order.
    pub fn with_replies(replies: &[Option<i32>]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().copied().collect()),
            ..Default::default()
        }
    }

    /// Finished wire bytes of every request so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl vroute::route::RouteTransport for RecordingTransport {
    async fn submit(&self, msg: MessageBuilder) -> Result<()> {
        self.sent.lock().unwrap().push(msg.finish());
        match self.replies.lock().unwrap().pop_front().flatten() {
            Some(errno) => Err(Error::from_errno(-errno)),
            None => Ok(()),
        }
    }
}
