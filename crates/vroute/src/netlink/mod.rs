//! Netlink plumbing: bounded message building, the route socket and the
//! request/ACK exchange.

pub mod attr;
pub mod builder;
pub mod connection;
pub mod error;
pub mod message;
pub mod parse;
pub mod socket;
pub mod types;

pub use builder::{AttrBuffer, MessageBuilder, NestToken};
pub use connection::Connection;
pub use error::{Error, Result, ValidationError};
pub use socket::NetlinkSocket;
