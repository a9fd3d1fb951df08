//! winnow combinators for decoding encoded route requests.
//!
//! Requests are only ever decoded for diagnostics (`vroute encode`) and in
//! tests; the kernel never sends them back to us.

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::attr::{NLA_HDRLEN, NLA_TYPE_MASK, nla_align};
use super::error::{Error, Result};
use super::message::NlMsgHdr;

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Trait for types that can be parsed from netlink wire format.
pub trait FromNetlink: Sized {
    /// Parse from a mutable byte slice reference.
    /// The slice is advanced past the consumed bytes.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse from a complete byte slice.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut input = data;
        Self::parse(&mut input).map_err(|e| Error::InvalidMessage(format!("{e:?}")))
    }
}

/// Fail the current parse without backtracking.
pub fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}

/// Parse a u16 in native endian.
pub fn parse_u16_ne(input: &mut &[u8]) -> PResult<u16> {
    let bytes: &[u8] = take(2usize).parse_next(input)?;
    Ok(u16::from_ne_bytes([bytes[0], bytes[1]]))
}

/// Parse a u32 in native endian.
pub fn parse_u32_ne(input: &mut &[u8]) -> PResult<u32> {
    let bytes: &[u8] = take(4usize).parse_next(input)?;
    Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Parse a netlink message header.
pub fn parse_nlmsghdr(input: &mut &[u8]) -> PResult<NlMsgHdr> {
    Ok(NlMsgHdr {
        nlmsg_len: parse_u32_ne(input)?,
        nlmsg_type: parse_u16_ne(input)?,
        nlmsg_flags: parse_u16_ne(input)?,
        nlmsg_seq: parse_u32_ne(input)?,
        nlmsg_pid: parse_u32_ne(input)?,
    })
}

/// Parse one attribute and return `(type, payload)` with flag bits masked off.
pub fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = parse_u16_ne(input)? as usize;
    let attr_type = parse_u16_ne(input)?;

    if len < NLA_HDRLEN {
        return cut();
    }

    let payload: &[u8] = take(len - NLA_HDRLEN).parse_next(input)?;

    // The last attribute of a message may omit its padding.
    let padding = (nla_align(len) - len).min(input.len());
    let _: &[u8] = take(padding).parse_next(input)?;

    Ok((attr_type & NLA_TYPE_MASK, payload))
}

/// Parse every attribute remaining in the input.
pub fn parse_attrs<'a>(input: &mut &'a [u8]) -> PResult<Vec<(u16, &'a [u8])>> {
    let mut attrs = Vec::new();
    while !input.is_empty() {
        attrs.push(parse_attr(input)?);
    }
    Ok(attrs)
}
