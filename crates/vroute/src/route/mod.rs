//! Route specifications and the operations that keep them in the kernel.
//!
//! A [`RouteSpec`] is one managed routing-table entry as read from
//! configuration. [`parse`] builds specs from clause tokens, [`message`]
//! turns them into rtnetlink requests, [`format`] renders them back to
//! clauses and [`reconcile`] diffs an applied list against a reloaded one.

pub mod encap;
pub mod format;
pub mod message;
pub mod metrics;
pub mod parse;
pub mod reconcile;

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::names::Interface;
use crate::netlink::types::route::{RouteType, rt_table};
use crate::util::addr::{AddrError, max_prefix_len, parse_prefix};

pub use encap::{Encapsulation, IpTunnel, MplsEncap};
pub use message::{RouteRequest, RouteTransport, apply_route};
pub use metrics::RouteMetrics;
pub use parse::{KernelFeatures, LoadReport, RejectedRoute, RouteParser};
pub use reconcile::{AppliedOp, apply_routes, reconcile};

/// Address family of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Family {
    #[default]
    Inet,
    Inet6,
}

impl Family {
    /// Family of an address.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Inet,
            IpAddr::V6(_) => Self::Inet6,
        }
    }

    /// The AF_* value carried in `rtm_family` and `RTA_VIA`.
    pub fn af(self) -> u8 {
        match self {
            Self::Inet => libc::AF_INET as u8,
            Self::Inet6 => libc::AF_INET6 as u8,
        }
    }

    /// Human-readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Inet => "IPv4",
            Self::Inet6 => "IPv6",
        }
    }

    /// Keyword used in `via inet|inet6`.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Inet => "inet",
            Self::Inet6 => "inet6",
        }
    }
}

/// An address with a prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub len: u8,
}

impl IpPrefix {
    /// Create a prefix.
    pub fn new(addr: IpAddr, len: u8) -> Self {
        Self { addr, len }
    }

    /// Single-address prefix.
    pub fn host(addr: IpAddr) -> Self {
        Self {
            addr,
            len: max_prefix_len(&addr),
        }
    }

    /// Family of the prefix address.
    pub fn family(&self) -> Family {
        Family::of(&self.addr)
    }

    /// Check if the prefix covers exactly one address.
    pub fn is_host(&self) -> bool {
        self.len == max_prefix_len(&self.addr)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.len)
        }
    }
}

impl FromStr for IpPrefix {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefix(s).map(|(addr, len)| Self::new(addr, len))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for IpPrefix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Operation requested for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RouteOp {
    Add,
    Replace,
    Delete,
}

impl fmt::Display for RouteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Delete => "delete",
        })
    }
}

/// One branch of a multipath route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NextHopSpec {
    /// Gateway address.
    pub via: Option<IpAddr>,
    /// Output interface.
    pub oif: Option<Interface>,
    /// Weight minus one, as carried in `rtnh_hops`.
    pub weight: Option<u8>,
    pub onlink: bool,
    pub realms: Option<u32>,
    pub encap: Encapsulation,
}

impl NextHopSpec {
    /// Next hop through `via`.
    pub fn via(addr: IpAddr) -> Self {
        Self {
            via: Some(addr),
            ..Default::default()
        }
    }

    /// Set the output interface.
    pub fn with_dev(mut self, oif: Interface) -> Self {
        self.oif = Some(oif);
        self
    }

    /// Set the configured weight (1..=256).
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight
            .checked_sub(1)
            .and_then(|w| u8::try_from(w).ok());
        self
    }
}

/// A managed routing-table entry.
///
/// Optional fields are `None` when not configured; 0 is a legal value for
/// several of them. `installed` records whether this entry believes it is
/// currently present in the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RouteSpec {
    pub family: Family,
    /// Route type when configured; unicast otherwise.
    pub route_type: Option<RouteType>,
    /// Destination; `None` is the default route.
    pub dst: Option<IpPrefix>,
    /// Source prefix (`from`, IPv6 only).
    pub src: Option<IpPrefix>,
    /// Preferred source address (`src`).
    pub pref_src: Option<IpAddr>,
    /// Gateway (`via`).
    pub via: Option<IpAddr>,
    pub oif: Option<Interface>,
    pub table: u32,
    pub metric: Option<u32>,
    pub scope: Option<u8>,
    pub protocol: Option<u8>,
    pub tos: Option<u8>,
    pub realms: Option<u32>,
    /// Expiry in seconds (IPv6 only).
    pub expires: Option<u32>,
    /// Router preference (IPv6 only).
    pub pref: Option<u8>,
    pub onlink: bool,
    pub metrics: RouteMetrics,
    pub encap: Encapsulation,
    pub nexthops: Vec<NextHopSpec>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub installed: bool,
}

impl Default for RouteSpec {
    fn default() -> Self {
        Self {
            family: Family::Inet,
            route_type: None,
            dst: None,
            src: None,
            pref_src: None,
            via: None,
            oif: None,
            table: rt_table::MAIN,
            metric: None,
            scope: None,
            protocol: None,
            tos: None,
            realms: None,
            expires: None,
            pref: None,
            onlink: false,
            metrics: RouteMetrics::default(),
            encap: Encapsulation::None,
            nexthops: Vec::new(),
            installed: false,
        }
    }
}

impl RouteSpec {
    /// Unicast route in the main table.
    pub fn new(family: Family) -> Self {
        Self {
            family,
            ..Default::default()
        }
    }

    /// Set the destination, taking the family from it.
    pub fn with_dst(mut self, dst: IpPrefix) -> Self {
        self.family = dst.family();
        self.dst = Some(dst);
        self
    }

    /// Set the gateway.
    pub fn with_via(mut self, via: IpAddr) -> Self {
        self.via = Some(via);
        self
    }

    /// Set the output interface.
    pub fn with_dev(mut self, oif: Interface) -> Self {
        self.oif = Some(oif);
        self
    }

    /// Set the routing table.
    pub fn with_table(mut self, table: u32) -> Self {
        self.table = table;
        self
    }

    /// Set the metric.
    pub fn with_metric(mut self, metric: u32) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Set the expiry time in seconds.
    pub fn with_expires(mut self, expires: u32) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Append a next hop.
    pub fn with_nexthop(mut self, nexthop: NextHopSpec) -> Self {
        self.nexthops.push(nexthop);
        self
    }

    /// Route type, defaulting to unicast.
    pub fn kind(&self) -> RouteType {
        self.route_type.unwrap_or(RouteType::Unicast)
    }

    /// Check whether two specs name the same kernel route: family,
    /// destination and prefix length, metric presence and value, and table.
    pub fn same_key(&self, other: &RouteSpec) -> bool {
        self.family == other.family
            && self.dst == other.dst && self.metric == other.metric && self.table == other.table
    }

    /// Short identification of the route for log and error messages.
    pub fn target(&self) -> String {
        let mut s = match self.dst {
            Some(dst) => dst.to_string(),
            None => "default".to_string(),
        };
        if let Some(metric) = self.metric {
            s.push_str(&format!(" metric {metric}"));
        }
        if self.table != rt_table::MAIN {
            s.push_str(&format!(" table {}", self.table));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_display() {
        let host: IpPrefix = "10.0.0.1".parse().unwrap();
        assert!(host.is_host());
        assert_eq!(host.to_string(), "10.0.0.1");

        let net: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert_eq!(net.family(), Family::Inet6);
        assert_eq!(net.to_string(), "2001:db8::/32");

        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn test_same_key() {
        let a = RouteSpec::new(Family::Inet).with_dst("10.0.0.0/24".parse().unwrap());
        let b = a.clone().with_via("192.0.2.1".parse().unwrap());
        assert!(a.same_key(&b));

        // a metric never matches an unset metric
        assert!(!a.same_key(&b.clone().with_metric(0)));
        assert!(!a.same_key(&b.clone().with_table(100)));
        assert!(!a.same_key(&RouteSpec::new(Family::Inet)));

        // default routes of different families are distinct
        assert!(!RouteSpec::new(Family::Inet).same_key(&RouteSpec::new(Family::Inet6)));
    }

    #[test]
    fn test_target() {
        let route = RouteSpec::new(Family::Inet)
            .with_dst("10.0.0.0/24".parse().unwrap())
            .with_metric(5)
            .with_table(1000);
        assert_eq!(route.target(), "10.0.0.0/24 metric 5 table 1000");
        assert_eq!(RouteSpec::new(Family::Inet6).target(), "default");
    }

    #[test]
    fn test_nexthop_weight() {
        assert_eq!(NextHopSpec::default().with_weight(1).weight, Some(0));
        assert_eq!(NextHopSpec::default().with_weight(256).weight, Some(255));
        assert_eq!(NextHopSpec::default().with_weight(0).weight, None);
    }
}
