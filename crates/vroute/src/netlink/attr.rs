//! Route attribute (rtattr) headers and payload accessors.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4;

/// Attribute header (mirrors struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Header for an attribute carrying `data_len` payload bytes.
    ///
    /// Callers check that the total fits in a u16 first.
    pub(crate) fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Iterator over attributes in a buffer, yielding `(type, payload)`.
///
/// Stops at the first malformed header.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let attr = NlAttr::from_bytes(self.data).ok()?;

        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned_len = nla_align(len);
        self.data = self.data.get(aligned_len..).unwrap_or(&[]);

        Some((attr.kind(), payload))
    }
}

/// Helper functions for extracting typed values from attribute payloads.
pub mod get {
    use super::*;

    fn array<const N: usize>(data: &[u8], what: &str) -> Result<[u8; N]> {
        data.get(..N)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::InvalidAttribute(format!("truncated {what} attribute")))
    }

    /// Extract a u8 value.
    pub fn u8(data: &[u8]) -> Result<u8> {
        data.first()
            .copied()
            .ok_or_else(|| Error::InvalidAttribute("empty u8 attribute".into()))
    }

    /// Extract a u16 value (native endian).
    pub fn u16_ne(data: &[u8]) -> Result<u16> {
        array(data, "u16").map(u16::from_ne_bytes)
    }

    /// Extract a u32 value (native endian).
    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        array(data, "u32").map(u32::from_ne_bytes)
    }

    /// Extract a u64 value (big endian / network order).
    pub fn u64_be(data: &[u8]) -> Result<u64> {
        array(data, "u64").map(u64::from_be_bytes)
    }

    /// Extract an IPv4 or IPv6 address, chosen by payload length.
    pub fn ip_addr(data: &[u8]) -> Result<IpAddr> {
        match data.len() {
            4 => Ok(IpAddr::V4(Ipv4Addr::from(array::<4>(data, "in_addr")?))),
            16 => Ok(IpAddr::V6(Ipv6Addr::from(array::<16>(data, "in6_addr")?))),
            n => Err(Error::InvalidAttribute(format!(
                "address attribute of {n} bytes"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align() {
        assert_eq!(nla_align(0), 0);
        assert_eq!(nla_align(1), 4);
        assert_eq!(nla_align(4), 4);
        assert_eq!(nla_align(6), 8);
    }

    #[test]
    fn test_iter_skips_padding() {
        // u8 attribute (padded to 8) followed by a u32 attribute
        let data = [5, 0, 7, 0, 0xaa, 0, 0, 0, 8, 0, 6, 0, 1, 0, 0, 0];
        let attrs: Vec<_> = AttrIter::new(&data).collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0], (7, &[0xaa][..]));
        assert_eq!(attrs[1].0, 6);
        assert_eq!(get::u32_ne(attrs[1].1).unwrap(), u32::from_ne_bytes([1, 0, 0, 0]));
    }

    #[test]
    fn test_iter_masks_nested_flag() {
        let data = [4, 0, 22, 0x80];
        let (kind, payload) = AttrIter::new(&data).next().unwrap();
        assert_eq!(kind, 22);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_iter_stops_on_bad_length() {
        let data = [64, 0, 1, 0, 0, 0, 0, 0];
        assert_eq!(AttrIter::new(&data).count(), 0);
    }

    #[test]
    fn test_get_ip_addr() {
        assert_eq!(
            get::ip_addr(&[10, 0, 0, 1]).unwrap(),
            "10.0.0.1".parse::<IpAddr>().unwrap()
        );
        assert!(get::ip_addr(&[1, 2, 3]).is_err());
    }
}
