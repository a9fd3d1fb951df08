//! Bounded attribute buffers and netlink message construction.
//!
//! Every append is checked against the buffer's byte limit and fails with
//! [`Error::BufferExhausted`] instead of growing past it, so a request is
//! either encoded completely or not at all.

use std::ops::{Deref, DerefMut};

use zerocopy::{Immutable, IntoBytes};

use super::attr::{NLA_F_NESTED, NLA_HDRLEN, NlAttr, nla_align};
use super::error::{Error, Result};
use super::message::{NLMSG_HDRLEN, NlMsgHdr};

/// Attribute bytes allowed in a route request after the headers.
pub const ROUTE_ATTR_SIZE: usize = 1024;
/// Capacity of the `RTA_METRICS` payload buffer.
pub const METRICS_ATTR_SIZE: usize = 1024;
/// Capacity of one encapsulation block (`RTA_ENCAP` nest plus `RTA_ENCAP_TYPE`).
pub const ENCAP_ATTR_SIZE: usize = 256;
/// Capacity of one `rtnexthop` record with its trailing attributes.
pub const NEXTHOP_ATTR_SIZE: usize = 1024;

/// Token returned when opening a nested attribute.
/// Used to finalize the nested attribute length.
#[derive(Debug, Clone, Copy)]
#[must_use = "an open nest must be closed with nest_end"]
pub struct NestToken {
    /// Offset of the nested attribute header in the buffer.
    offset: usize,
}

/// A byte buffer of aligned attributes with a hard size limit.
#[derive(Debug, Clone)]
pub struct AttrBuffer {
    buf: Vec<u8>,
    limit: usize,
}

impl AttrBuffer {
    /// Create an empty buffer that refuses to grow beyond `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(4096)),
            limit,
        }
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes left before the limit is reached.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buf.len())
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn reserve(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(Error::BufferExhausted {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn pad(&mut self) {
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append raw bytes (with alignment padding).
    pub fn append_raw(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(nla_align(data.len()))?;
        self.buf.extend_from_slice(data);
        self.pad();
        Ok(())
    }

    /// Append a fixed-size kernel struct.
    pub fn append_struct<T: IntoBytes + Immutable>(&mut self, value: &T) -> Result<()> {
        self.append_raw(value.as_bytes())
    }

    /// Append an attribute with the given type and data.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) -> Result<()> {
        self.append_attr_parts(attr_type, &[data])
    }

    /// Append an attribute whose payload is the concatenation of `parts`.
    pub fn append_attr_parts(&mut self, attr_type: u16, parts: &[&[u8]]) -> Result<()> {
        let data_len: usize = parts.iter().map(|p| p.len()).sum();
        let total = NLA_HDRLEN + data_len;
        if total > u16::MAX as usize {
            return Err(Error::InvalidAttribute(format!(
                "attribute {attr_type} payload of {data_len} bytes"
            )));
        }
        self.reserve(nla_align(total))?;

        let attr = NlAttr::new(attr_type, data_len);
        self.buf.extend_from_slice(attr.as_bytes());
        for part in parts {
            self.buf.extend_from_slice(part);
        }
        self.pad();
        Ok(())
    }

    /// Append a u8 attribute.
    pub fn append_attr_u8(&mut self, attr_type: u16, value: u8) -> Result<()> {
        self.append_attr(attr_type, &[value])
    }

    /// Append a u16 attribute (native endian).
    pub fn append_attr_u16(&mut self, attr_type: u16, value: u16) -> Result<()> {
        self.append_attr(attr_type, &value.to_ne_bytes())
    }

    /// Append a u32 attribute (native endian).
    pub fn append_attr_u32(&mut self, attr_type: u16, value: u32) -> Result<()> {
        self.append_attr(attr_type, &value.to_ne_bytes())
    }

    /// Append a u64 attribute (big endian / network order).
    pub fn append_attr_u64_be(&mut self, attr_type: u16, value: u64) -> Result<()> {
        self.append_attr(attr_type, &value.to_be_bytes())
    }

    /// Append a string attribute without a NUL terminator.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) -> Result<()> {
        self.append_attr(attr_type, value.as_bytes())
    }

    /// Start a nested attribute flagged with `NLA_F_NESTED`.
    pub fn nest_start(&mut self, attr_type: u16) -> Result<NestToken> {
        self.open(attr_type | NLA_F_NESTED)
    }

    /// Start an attribute whose payload is filled by later appends but which
    /// the kernel does not parse as nested attributes (`RTA_MULTIPATH`).
    pub fn payload_start(&mut self, attr_type: u16) -> Result<NestToken> {
        self.open(attr_type)
    }

    fn open(&mut self, nla_type: u16) -> Result<NestToken> {
        self.reserve(NLA_HDRLEN)?;
        let offset = self.buf.len();
        let attr = NlAttr {
            nla_len: 0,
            nla_type,
        };
        self.buf.extend_from_slice(attr.as_bytes());
        Ok(NestToken { offset })
    }

    /// End a nested attribute, back-patching its length.
    pub fn nest_end(&mut self, token: NestToken) -> Result<()> {
        let len = self.buf.len() - token.offset;
        let len = u16::try_from(len)
            .map_err(|_| Error::InvalidAttribute(format!("nested attribute of {len} bytes")))?;
        self.set_u16_at(token.offset, len);
        Ok(())
    }

    /// Overwrite a native-endian u16 already written at `offset`.
    pub(crate) fn set_u16_at(&mut self, offset: usize, value: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_ne_bytes());
    }
}

/// Builder for a complete netlink request: header plus bounded body.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    msg_type: u16,
    flags: u16,
    body: AttrBuffer,
}

impl MessageBuilder {
    /// Create a message builder whose body may hold `limit` bytes after
    /// the netlink header.
    pub fn new(msg_type: u16, flags: u16, limit: usize) -> Self {
        let header = NlMsgHdr::new(msg_type, flags);
        let mut body = AttrBuffer::with_limit(NLMSG_HDRLEN + limit);
        body.buf.extend_from_slice(header.as_bytes());
        body.buf.resize(NLMSG_HDRLEN, 0);
        Self {
            msg_type,
            flags,
            body,
        }
    }

    /// Message type from the header.
    pub fn msg_type(&self) -> u16 {
        self.msg_type
    }

    /// Message flags from the header.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Everything after the netlink header.
    pub fn payload(&self) -> &[u8] {
        &self.body.buf[NLMSG_HDRLEN..]
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.body.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Set the port ID.
    pub fn set_pid(&mut self, pid: u32) {
        self.body.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
    }

    /// Finalize the message and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.body.buf.len() as u32;
        self.body.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.body.buf
    }
}

impl Deref for MessageBuilder {
    type Target = AttrBuffer;

    fn deref(&self) -> &AttrBuffer {
        &self.body
    }
}

impl DerefMut for MessageBuilder {
    fn deref_mut(&mut self) -> &mut AttrBuffer {
        &mut self.body
    }
}
