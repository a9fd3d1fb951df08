//! Lightweight tunnel encapsulation (`encap mpls|ip|ip6|ila`).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use zerocopy::{FromBytes, IntoBytes};

use super::parse::{ParseResult, Tokens, invalid};
use crate::names::NameResolver;
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::AttrBuffer;
use crate::netlink::error::{Error, Result, ValidationError};
use crate::netlink::types::mpls::{
    MplsLabelEntry, ila_attr, lwtunnel_encap, lwtunnel_ip, mpls_tunnel,
};
use crate::netlink::types::route::RtaAttr;
use crate::util::parse::{format_addr64, get_addr64, get_mpls_labels, get_u8, get_u16, get_u64};

/// Encapsulation attached to a route or next hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum Encapsulation {
    #[default]
    None,
    /// MPLS label stack push.
    Mpls(MplsEncap),
    /// IPv4 tunnel metadata.
    Ip(IpTunnel<Ipv4Addr>),
    /// IPv6 tunnel metadata.
    Ip6(IpTunnel<Ipv6Addr>),
    /// ILA locator.
    Ila {
        /// 64-bit locator.
        locator: u64,
    },
}

/// MPLS encapsulation: labels outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MplsEncap {
    pub labels: Vec<u32>,
}

/// IP tunnel metadata; only fields that are `Some` are encoded.
///
/// For IPv6 tunnels `tos` is the traffic class and `ttl` the hop limit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IpTunnel<A> {
    pub id: Option<u64>,
    pub dst: Option<A>,
    pub src: Option<A>,
    pub tos: Option<u8>,
    pub ttl: Option<u8>,
    pub flags: Option<u16>,
}

impl<A> Default for IpTunnel<A> {
    fn default() -> Self {
        Self {
            id: None,
            dst: None,
            src: None,
            tos: None,
            ttl: None,
            flags: None,
        }
    }
}

/// Address type of an IP tunnel, with the keywords that differ per family.
pub trait TunnelAddr: Copy + fmt::Display + Sized {
    /// Variant keyword after `encap`.
    const VARIANT: &'static str;
    /// LWTUNNEL_ENCAP_* value.
    const ENCAP_TYPE: u16;
    /// Keyword for the tos/traffic class field.
    const TOS_KEYWORD: &'static str;
    /// Keyword for the ttl/hop limit field.
    const TTL_KEYWORD: &'static str;

    /// Narrow a parsed address to this family.
    fn from_ip(addr: IpAddr) -> Option<Self>;
    /// Address bytes in network order.
    fn octets(&self) -> Vec<u8>;
}

impl TunnelAddr for Ipv4Addr {
    const VARIANT: &'static str = "ip";
    const ENCAP_TYPE: u16 = lwtunnel_encap::IP;
    const TOS_KEYWORD: &'static str = "tos";
    const TTL_KEYWORD: &'static str = "ttl";

    fn from_ip(addr: IpAddr) -> Option<Self> {
        match addr {
            IpAddr::V4(a) => Some(a),
            IpAddr::V6(_) => None,
        }
    }

    fn octets(&self) -> Vec<u8> {
        Ipv4Addr::octets(self).to_vec()
    }
}

impl TunnelAddr for Ipv6Addr {
    const VARIANT: &'static str = "ip6";
    const ENCAP_TYPE: u16 = lwtunnel_encap::IP6;
    const TOS_KEYWORD: &'static str = "tc";
    const TTL_KEYWORD: &'static str = "hoplimit";

    fn from_ip(addr: IpAddr) -> Option<Self> {
        match addr {
            IpAddr::V6(a) => Some(a),
            IpAddr::V4(_) => None,
        }
    }

    fn octets(&self) -> Vec<u8> {
        Ipv6Addr::octets(self).to_vec()
    }
}

impl<A: TunnelAddr> IpTunnel<A> {
    fn write_attrs(&self, buf: &mut AttrBuffer) -> Result<()> {
        if let Some(id) = self.id {
            buf.append_attr_u64_be(lwtunnel_ip::ID, id)?;
        }
        if let Some(dst) = self.dst {
            buf.append_attr(lwtunnel_ip::DST, &dst.octets())?;
        }
        if let Some(src) = self.src {
            buf.append_attr(lwtunnel_ip::SRC, &src.octets())?;
        }
        if let Some(tos) = self.tos {
            buf.append_attr_u8(lwtunnel_ip::TOS, tos)?;
        }
        if let Some(ttl) = self.ttl {
            buf.append_attr_u8(lwtunnel_ip::TTL, ttl)?;
        }
        if let Some(flags) = self.flags {
            buf.append_attr_u16(lwtunnel_ip::FLAGS, flags)?;
        }
        Ok(())
    }

    fn decode(payload: &[u8]) -> Result<Self> {
        let addr = |data: &[u8]| {
            get::ip_addr(data).and_then(|ip| {
                A::from_ip(ip).ok_or_else(|| {
                    Error::InvalidAttribute(format!("{} tunnel address {ip}", A::VARIANT))
                })
            })
        };

        let mut tunnel = Self::default();
        for (kind, data) in AttrIter::new(payload) {
            match kind {
                lwtunnel_ip::ID => tunnel.id = Some(get::u64_be(data)?),
                lwtunnel_ip::DST => tunnel.dst = Some(addr(data)?),
                lwtunnel_ip::SRC => tunnel.src = Some(addr(data)?),
                lwtunnel_ip::TTL => tunnel.ttl = Some(get::u8(data)?),
                lwtunnel_ip::TOS => tunnel.tos = Some(get::u8(data)?),
                lwtunnel_ip::FLAGS => tunnel.flags = Some(get::u16_ne(data)?),
                _ => {}
            }
        }
        Ok(tunnel)
    }

    fn parse(tokens: &mut Tokens<'_>, resolver: &dyn NameResolver) -> ParseResult<Self> {
        let mut tunnel = Self::default();

        loop {
            let Some(key) = tokens.peek() else { break };
            let clause = match key {
                "id" => "encap id",
                "dst" => "encap dst",
                "src" => "encap src",
                "flags" => "encap flags",
                k if k == A::TOS_KEYWORD => "encap tos",
                k if k == A::TTL_KEYWORD => "encap ttl",
                _ => break,
            };
            tokens.advance();
            let value = tokens.value(clause)?;

            match key {
                "id" => tunnel.id = Some(get_u64(value).map_err(|_| invalid(clause, value))?),
                "dst" => tunnel.dst = Some(Self::parse_addr(clause, value)?),
                "src" => tunnel.src = Some(Self::parse_addr(clause, value)?),
                "flags" => {
                    tunnel.flags = Some(get_u16(value).map_err(|_| invalid(clause, value))?)
                }
                k if k == A::TOS_KEYWORD => {
                    tunnel.tos = Some(resolver.resolve_dsfield(value).ok_or_else(|| {
                        ValidationError::UnknownName {
                            kind: "dsfield",
                            name: value.to_string(),
                        }
                    })?)
                }
                _ => tunnel.ttl = Some(get_u8(value).map_err(|_| invalid(clause, value))?),
            }
        }

        if tunnel.dst.is_none() && tunnel.id.is_none() {
            return Err(ValidationError::MissingValue("encap dst or id"));
        }
        Ok(tunnel)
    }

    fn parse_addr(clause: &'static str, value: &str) -> ParseResult<A> {
        let ip: IpAddr = value.parse().map_err(|_| invalid(clause, value))?;
        A::from_ip(ip).ok_or_else(|| ValidationError::FamilyMismatch {
            clause,
            value: value.to_string(),
        })
    }
}

impl<A: TunnelAddr> fmt::Display for IpTunnel<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encap {}", A::VARIANT)?;
        if let Some(id) = self.id {
            write!(f, " id {id}")?;
        }
        if let Some(dst) = self.dst {
            write!(f, " dst {dst}")?;
        }
        if let Some(src) = self.src {
            write!(f, " src {src}")?;
        }
        if let Some(tos) = self.tos {
            write!(f, " {} 0x{tos:x}", A::TOS_KEYWORD)?;
        }
        if let Some(ttl) = self.ttl {
            write!(f, " {} {ttl}", A::TTL_KEYWORD)?;
        }
        if let Some(flags) = self.flags {
            write!(f, " flags 0x{flags:x}")?;
        }
        Ok(())
    }
}

impl Encapsulation {
    /// Check if no encapsulation is configured.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The LWTUNNEL_ENCAP_* value, if any.
    pub fn encap_type(&self) -> Option<u16> {
        match self {
            Self::None => None,
            Self::Mpls(_) => Some(lwtunnel_encap::MPLS),
            Self::Ip(_) => Some(Ipv4Addr::ENCAP_TYPE),
            Self::Ip6(_) => Some(Ipv6Addr::ENCAP_TYPE),
            Self::Ila { .. } => Some(lwtunnel_encap::ILA),
        }
    }

    /// Append an `RTA_ENCAP` nest followed by `RTA_ENCAP_TYPE`.
    /// Writes nothing for [`Encapsulation::None`].
    pub fn write_to(&self, buf: &mut AttrBuffer) -> Result<()> {
        let Some(encap_type) = self.encap_type() else {
            return Ok(());
        };

        let nest = buf.nest_start(RtaAttr::Encap.id())?;
        match self {
            Self::None => {}
            Self::Mpls(mpls) => {
                let last = mpls.labels.len().saturating_sub(1);
                let stack: Vec<MplsLabelEntry> = mpls
                    .labels
                    .iter()
                    .enumerate()
                    .map(|(i, label)| MplsLabelEntry::new(*label, i == last))
                    .collect();
                buf.append_attr(mpls_tunnel::DST, stack.as_bytes())?;
            }
            Self::Ip(tunnel) => tunnel.write_attrs(buf)?,
            Self::Ip6(tunnel) => tunnel.write_attrs(buf)?,
            Self::Ila { locator } => buf.append_attr_u64_be(ila_attr::LOCATOR, *locator)?,
        }
        buf.nest_end(nest)?;
        buf.append_attr_u16(RtaAttr::EncapType.id(), encap_type)
    }

    /// Decode the payload of an `RTA_ENCAP` attribute of the given type.
    pub fn decode(encap_type: u16, payload: &[u8]) -> Result<Self> {
        match encap_type {
            lwtunnel_encap::MPLS => {
                let stack = AttrIter::new(payload)
                    .find(|(kind, _)| *kind == mpls_tunnel::DST)
                    .map(|(_, data)| data)
                    .ok_or_else(|| Error::InvalidAttribute("mpls encap without labels".into()))?;
                let labels = <[MplsLabelEntry]>::ref_from_bytes(stack)
                    .map_err(|_| Error::InvalidAttribute("misaligned mpls label stack".into()))?
                    .iter()
                    .map(MplsLabelEntry::label)
                    .collect();
                Ok(Self::Mpls(MplsEncap { labels }))
            }
            lwtunnel_encap::IP => IpTunnel::decode(payload).map(Self::Ip),
            lwtunnel_encap::IP6 => IpTunnel::decode(payload).map(Self::Ip6),
            lwtunnel_encap::ILA => AttrIter::new(payload)
                .find(|(kind, _)| *kind == ila_attr::LOCATOR)
                .ok_or_else(|| Error::InvalidAttribute("ila encap without locator".into()))
                .and_then(|(_, data)| get::u64_be(data))
                .map(|locator| Self::Ila { locator }),
            other => Err(Error::InvalidAttribute(format!(
                "unsupported encap type {other}"
            ))),
        }
    }

    /// Parse the tokens following an `encap` keyword.
    ///
    /// Key/value loops stop at the first key they do not recognise, leaving
    /// it for the route parser.
    pub(crate) fn parse(
        tokens: &mut Tokens<'_>,
        resolver: &dyn NameResolver,
    ) -> ParseResult<Self> {
        let variant = tokens.value("encap")?;
        match variant {
            "mpls" => {
                let value = tokens.value("encap mpls")?;
                let labels = get_mpls_labels(value).map_err(|_| invalid("encap mpls", value))?;
                Ok(Self::Mpls(MplsEncap { labels }))
            }
            "ip" => IpTunnel::parse(tokens, resolver).map(Self::Ip),
            "ip6" => IpTunnel::parse(tokens, resolver).map(Self::Ip6),
            "ila" => {
                let value = tokens.value("encap ila")?;
                let locator = get_addr64(value).map_err(|_| invalid("encap ila", value))?;
                Ok(Self::Ila { locator })
            }
            other => Err(ValidationError::InvalidValue {
                clause: "encap",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Encapsulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Mpls(mpls) => {
                f.write_str("encap mpls ")?;
                for (i, label) in mpls.labels.iter().enumerate() {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    write!(f, "{label}")?;
                }
                Ok(())
            }
            Self::Ip(tunnel) => fmt::Display::fmt(tunnel, f),
            Self::Ip6(tunnel) => fmt::Display::fmt(tunnel, f),
            Self::Ila { locator } => write!(f, "encap ila {}", format_addr64(*locator)),
        }
    }
}
