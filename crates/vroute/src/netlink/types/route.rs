//! Route message structures and rtnetlink constants.

use winnow::prelude::*;
use winnow::token::take;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::parse::{FromNetlink, PResult, cut};

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RtMsg {
    /// Address family.
    pub rtm_family: u8,
    /// Destination prefix length.
    pub rtm_dst_len: u8,
    /// Source prefix length.
    pub rtm_src_len: u8,
    /// TOS filter.
    pub rtm_tos: u8,
    /// Routing table ID.
    pub rtm_table: u8,
    /// Routing protocol (RTPROT_*).
    pub rtm_protocol: u8,
    /// Route scope (RT_SCOPE_*).
    pub rtm_scope: u8,
    /// Route type (RTN_*).
    pub rtm_type: u8,
    /// Route flags.
    pub rtm_flags: u32,
}

impl RtMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new route message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address family.
    pub fn with_family(mut self, family: u8) -> Self {
        self.rtm_family = family;
        self
    }

    /// Set the routing table.
    pub fn with_table(mut self, table: u8) -> Self {
        self.rtm_table = table;
        self
    }

    /// Set the protocol.
    pub fn with_protocol(mut self, protocol: u8) -> Self {
        self.rtm_protocol = protocol;
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: u8) -> Self {
        self.rtm_scope = scope;
        self
    }

    /// Set the route type.
    pub fn with_type(mut self, rtype: u8) -> Self {
        self.rtm_type = rtype;
        self
    }
}

impl FromNetlink for RtMsg {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let bytes: &[u8] = take(Self::SIZE).parse_next(input)?;
        match Self::read_from_bytes(bytes) {
            Ok(msg) => Ok(msg),
            Err(_) => cut(),
        }
    }
}

/// Next-hop record header inside `RTA_MULTIPATH` (struct rtnexthop).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RtNextHop {
    /// Length of this record including trailing attributes.
    pub rtnh_len: u16,
    /// Next-hop flags (RTNH_F_*).
    pub rtnh_flags: u8,
    /// Weight minus one.
    pub rtnh_hops: u8,
    /// Output interface index.
    pub rtnh_ifindex: i32,
}

impl RtNextHop {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

impl FromNetlink for RtNextHop {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let bytes: &[u8] = take(Self::SIZE).parse_next(input)?;
        match Self::read_from_bytes(bytes) {
            Ok(nh) => Ok(nh),
            Err(_) => cut(),
        }
    }
}

/// Route attributes (RTA_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RtaAttr {
    Dst = 1,
    Src = 2,
    Oif = 4,
    Gateway = 5,
    Priority = 6,
    Prefsrc = 7,
    Metrics = 8,
    Multipath = 9,
    Flow = 11,
    Table = 15,
    Via = 18,
    Pref = 20,
    EncapType = 21,
    Encap = 22,
    Expires = 23,
}

impl RtaAttr {
    const ALL: [Self; 15] = [
        Self::Dst,
        Self::Src,
        Self::Oif,
        Self::Gateway,
        Self::Priority,
        Self::Prefsrc,
        Self::Metrics,
        Self::Multipath,
        Self::Flow,
        Self::Table,
        Self::Via,
        Self::Pref,
        Self::EncapType,
        Self::Encap,
        Self::Expires,
    ];

    /// The attribute type as carried on the wire.
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Look up an attribute by its wire type.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    /// Kernel name of the attribute.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dst => "RTA_DST",
            Self::Src => "RTA_SRC",
            Self::Oif => "RTA_OIF",
            Self::Gateway => "RTA_GATEWAY",
            Self::Priority => "RTA_PRIORITY",
            Self::Prefsrc => "RTA_PREFSRC",
            Self::Metrics => "RTA_METRICS",
            Self::Multipath => "RTA_MULTIPATH",
            Self::Flow => "RTA_FLOW",
            Self::Table => "RTA_TABLE",
            Self::Via => "RTA_VIA",
            Self::Pref => "RTA_PREF",
            Self::EncapType => "RTA_ENCAP_TYPE",
            Self::Encap => "RTA_ENCAP",
            Self::Expires => "RTA_EXPIRES",
        }
    }
}

/// Route types (RTN_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum RouteType {
    Unicast = 1,
    Local = 2,
    Broadcast = 3,
    Anycast = 4,
    Multicast = 5,
    Blackhole = 6,
    Unreachable = 7,
    Prohibit = 8,
    Throw = 9,
    Nat = 10,
    #[cfg_attr(feature = "serde", serde(rename = "xresolve"))]
    ExternalResolver = 11,
}

impl RouteType {
    const ALL: [Self; 11] = [
        Self::Unicast,
        Self::Local,
        Self::Broadcast,
        Self::Anycast,
        Self::Multicast,
        Self::Blackhole,
        Self::Unreachable,
        Self::Prohibit,
        Self::Throw,
        Self::Nat,
        Self::ExternalResolver,
    ];

    /// Get the name of this route type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unicast => "unicast",
            Self::Local => "local",
            Self::Broadcast => "broadcast",
            Self::Anycast => "anycast",
            Self::Multicast => "multicast",
            Self::Blackhole => "blackhole",
            Self::Unreachable => "unreachable",
            Self::Prohibit => "prohibit",
            Self::Throw => "throw",
            Self::Nat => "nat",
            Self::ExternalResolver => "xresolve",
        }
    }

    /// Parse a route type from its iproute2 name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Look up a route type by its kernel value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == value)
    }
}

/// Route protocols (RTPROT_*).
pub mod rt_proto {
    pub const UNSPEC: u8 = 0;
    pub const REDIRECT: u8 = 1;
    pub const KERNEL: u8 = 2;
    pub const BOOT: u8 = 3;
    pub const STATIC: u8 = 4;
    pub const KEEPALIVED: u8 = 18;
}

/// Route scope (RT_SCOPE_*).
pub mod rt_scope {
    pub const UNIVERSE: u8 = 0;
    pub const SITE: u8 = 200;
    pub const LINK: u8 = 253;
    pub const HOST: u8 = 254;
    pub const NOWHERE: u8 = 255;
}

/// Route table IDs.
pub mod rt_table {
    pub const UNSPEC: u32 = 0;
    pub const DEFAULT: u32 = 253;
    pub const MAIN: u32 = 254;
    pub const LOCAL: u32 = 255;
}

/// Route metrics attribute types (RTAX_*), nested in `RTA_METRICS`.
pub mod rtax {
    pub const LOCK: u16 = 1;
    pub const MTU: u16 = 2;
    pub const WINDOW: u16 = 3;
    pub const RTT: u16 = 4;
    pub const RTTVAR: u16 = 5;
    pub const SSTHRESH: u16 = 6;
    pub const CWND: u16 = 7;
    pub const ADVMSS: u16 = 8;
    pub const REORDERING: u16 = 9;
    pub const HOPLIMIT: u16 = 10;
    pub const INITCWND: u16 = 11;
    pub const FEATURES: u16 = 12;
    pub const RTO_MIN: u16 = 13;
    pub const INITRWND: u16 = 14;
    pub const QUICKACK: u16 = 15;
    pub const CC_ALGO: u16 = 16;

    /// `RTAX_FEATURES` bit enabling ECN.
    pub const FEATURE_ECN: u32 = 1 << 0;
}

/// Next-hop flags (RTNH_F_*), also valid in `rtm_flags`.
pub mod rtnh_flags {
    pub const ONLINK: u8 = 4;
}

/// IPv6 router preference values carried in `RTA_PREF`.
pub mod icmpv6_router_pref {
    pub const LOW: u8 = 3;
    pub const MEDIUM: u8 = 0;
    pub const HIGH: u8 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(RtMsg::SIZE, 12);
        assert_eq!(RtNextHop::SIZE, 8);
    }

    #[test]
    fn test_rtmsg_parse() {
        let msg = RtMsg::new()
            .with_family(libc::AF_INET as u8)
            .with_table(254)
            .with_protocol(rt_proto::BOOT)
            .with_scope(rt_scope::LINK)
            .with_type(RouteType::Unicast as u8);
        let parsed = RtMsg::from_bytes(msg.as_bytes()).unwrap();
        assert_eq!(parsed, msg);
        assert!(RtMsg::from_bytes(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_route_type_names() {
        assert_eq!(RouteType::from_name("blackhole"), Some(RouteType::Blackhole));
        assert_eq!(RouteType::from_name("xresolve"), Some(RouteType::ExternalResolver));
        assert_eq!(RouteType::from_name("default"), None);
        assert_eq!(RouteType::from_u8(7), Some(RouteType::Unreachable));
        assert_eq!(RouteType::from_u8(0), None);
    }

    #[test]
    fn test_rta_names() {
        assert_eq!(RtaAttr::from_id(22), Some(RtaAttr::Encap));
        assert_eq!(RtaAttr::Multipath.name(), "RTA_MULTIPATH");
        assert_eq!(RtaAttr::from_id(3), None);
    }
}
