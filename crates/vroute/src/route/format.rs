//! Rendering routes back to clause syntax.
//!
//! The output is accepted by [`RouteParser`](super::RouteParser) and parses
//! to the same [`RouteSpec`].

use std::fmt;

use super::encap::Encapsulation;
use super::metrics::RouteMetrics;
use super::{NextHopSpec, RouteSpec};
use crate::names::{protocol_name, scope_name};
use crate::netlink::types::route::{icmpv6_router_pref, rt_table, rtax};

fn write_realms(f: &mut fmt::Formatter<'_>, realms: u32) -> fmt::Result {
    let (from, to) = (realms >> 16, realms & 0xffff);
    if from != 0 {
        write!(f, " realms {from}/{to}")
    } else {
        write!(f, " realms {to}")
    }
}

fn write_encap(f: &mut fmt::Formatter<'_>, encap: &Encapsulation) -> fmt::Result {
    if encap.is_none() {
        Ok(())
    } else {
        write!(f, " {encap}")
    }
}

fn lock(metrics: &RouteMetrics, kind: u16) -> &'static str {
    if metrics.is_locked(kind) { "lock " } else { "" }
}

/// Time metric in `unit` fractions of a millisecond. Values the parser
/// cannot scale back up stay raw.
fn write_time(f: &mut fmt::Formatter<'_>, value: u32, unit: u32) -> fmt::Result {
    if value % unit == 0 && value / unit <= u32::MAX / unit - 1 {
        write!(f, "{}ms", value / unit)
    } else {
        write!(f, "{value}")
    }
}

impl fmt::Display for RouteMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref name) = self.congctl {
            write!(f, " congctl {}{name}", lock(self, rtax::CC_ALGO))?;
        }
        if let Some(rtt) = self.rtt {
            write!(f, " rtt {}", lock(self, rtax::RTT))?;
            write_time(f, rtt, 8)?;
        }
        if let Some(rttvar) = self.rttvar {
            write!(f, " rttvar {}", lock(self, rtax::RTTVAR))?;
            write_time(f, rttvar, 4)?;
        }
        if let Some(rto_min) = self.rto_min {
            write!(f, " rto_min {}{rto_min}ms", lock(self, rtax::RTO_MIN))?;
        }
        if self
            .features
            .is_some_and(|features| features & rtax::FEATURE_ECN != 0)
        {
            f.write_str(" features ecn")?;
        }

        let lockable = [
            ("mtu", rtax::MTU, self.mtu),
            ("window", rtax::WINDOW, self.window),
            ("ssthresh", rtax::SSTHRESH, self.ssthresh),
            ("cwnd", rtax::CWND, self.cwnd),
            ("advmss", rtax::ADVMSS, self.advmss),
            ("reordering", rtax::REORDERING, self.reordering),
            ("hoplimit", rtax::HOPLIMIT, self.hoplimit),
            ("initcwnd", rtax::INITCWND, self.initcwnd),
            ("initrwnd", rtax::INITRWND, self.initrwnd),
            ("quickack", rtax::QUICKACK, self.quickack),
        ];
        for (name, kind, value) in lockable {
            if let Some(v) = value {
                write!(f, " {name} {}{v}", lock(self, kind))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for NextHopSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("nexthop")?;
        if let Some(via) = self.via {
            write!(f, " via {} {via}", super::Family::of(&via).keyword())?;
        }
        if let Some(ref oif) = self.oif {
            write!(f, " dev {}", oif.name)?;
        }
        if let Some(weight) = self.weight {
            write!(f, " weight {}", u16::from(weight) + 1)?;
        }
        if self.onlink {
            f.write_str(" onlink")?;
        }
        if let Some(realms) = self.realms {
            write_realms(f, realms)?;
        }
        write_encap(f, &self.encap)
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = self.route_type {
            write!(f, "{} ", kind.name())?;
        }
        match self.dst {
            Some(dst) => write!(f, "{dst}")?,
            None => f.write_str("default")?,
        }

        if let Some(src) = self.src {
            write!(f, " from {src}")?;
        }
        if let Some(pref_src) = self.pref_src {
            write!(f, " src {pref_src}")?;
        }
        if let Some(tos) = self.tos {
            write!(f, " tos 0x{tos:x}")?;
        }
        if let Some(via) = self.via {
            write!(f, " via {} {via}", super::Family::of(&via).keyword())?;
        }
        if let Some(ref oif) = self.oif {
            write!(f, " dev {}", oif.name)?;
        }
        if self.table != rt_table::MAIN {
            write!(f, " table {}", self.table)?;
        }
        if let Some(protocol) = self.protocol {
            match protocol_name(protocol) {
                Some(name) => write!(f, " protocol {name}")?,
                None => write!(f, " protocol {protocol}")?,
            }
        }
        if let Some(scope) = self.scope {
            match scope_name(scope) {
                Some(name) => write!(f, " scope {name}")?,
                None => write!(f, " scope {scope}")?,
            }
        }
        if let Some(metric) = self.metric {
            write!(f, " metric {metric}")?;
        }
        if self.onlink {
            f.write_str(" onlink")?;
        }
        if let Some(realms) = self.realms {
            write_realms(f, realms)?;
        }
        if let Some(expires) = self.expires {
            write!(f, " expires {expires}")?;
        }

        write!(f, "{}", self.metrics)?;

        if let Some(pref) = self.pref {
            match pref {
                icmpv6_router_pref::LOW => f.write_str(" pref low")?,
                icmpv6_router_pref::MEDIUM => f.write_str(" pref medium")?,
                icmpv6_router_pref::HIGH => f.write_str(" pref high")?,
                other => write!(f, " pref {other}")?,
            }
        }

        // an ip tunnel swallows the keys that follow it, so encap goes last
        write_encap(f, &self.encap)?;

        for nexthop in &self.nexthops {
            write!(f, " {nexthop}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::route::RouteSpec;
    use crate::route::parse::RouteParser;
    use crate::route::parse::tests::TestResolver;

    fn parse(line: &str) -> RouteSpec {
        RouteParser::new(&TestResolver).parse_line(line).unwrap()
    }

    #[test]
    fn test_format_simple() {
        let route = parse("10.0.0.0/24 gw 192.0.2.1 dev eth0 proto 18 metric 5");
        assert_eq!(
            route.to_string(),
            "10.0.0.0/24 via inet 192.0.2.1 dev eth0 protocol keepalived metric 5"
        );
        assert_eq!(parse("default").to_string(), "default");
        assert_eq!(
            parse("to prohibit 10.0.0.1").to_string(),
            "prohibit 10.0.0.1"
        );
    }

    #[test]
    fn test_format_metrics() {
        let route = parse("10.0.0.0/24 rtt 12ms rttvar 9 mtu lock 1400 hoplimit 3 features ecn");
        assert_eq!(
            route.to_string(),
            "10.0.0.0/24 rtt 12ms rttvar 9 features ecn mtu lock 1400 hoplimit 3"
        );
    }

    #[test]
    fn test_format_nexthops() {
        let route = parse(
            "10.0.0.0/8 nexthop via 192.0.2.1 dev eth0 weight 3 \
             nexthop via 192.0.2.2 realms 4/5 encap mpls 16/17",
        );
        assert_eq!(
            route.to_string(),
            "10.0.0.0/8 nexthop via inet 192.0.2.1 dev eth0 weight 3 \
             nexthop via inet 192.0.2.2 realms 4/5 encap mpls 16/17"
        );
    }

    #[test]
    fn test_round_trip() {
        let lines = [
            "10.0.0.0/24 via 192.0.2.1 dev eth0 table mgmt metric 0",
            "unicast 10.1.0.0/16 src 10.1.0.1 tos 0x10 scope link onlink realms 7",
            "blackhole 2001:db8::/48 from 2001:db8:1::/64 expires 300 pref high",
            "default via inet6 fe80::1 dev eth1 protocol 99 pref 2",
            "10.0.0.0/8 congctl lock cubic rtt lock 2s rttvar 3ms rto_min 250ms \
             window 1000 ssthresh lock 5 cwnd 6 advmss 1400 reordering 4 \
             initcwnd 10 initrwnd 20 quickack 0",
            "192.168.0.0/16 dev eth0 encap ip id 5 dst 10.9.9.9 ttl 4 tos 0x10 flags 0x1",
            "2001:db8::/32 hoplimit 12 encap ip6 dst 2001:db8::99 tc 0x20 hoplimit 9",
            "10.2.0.0/16 encap ila 1:2:3:4",
            "10.0.0.0/8 rtt 4294967288 rttvar 4294967292",
            "10.3.0.0/16 via 192.0.2.1 or 192.0.2.2",
            "10.4.0.0/16 nexthop via 192.0.2.1 weight 256 onlink \
             nexthop dev eth1 encap ip dst 10.0.0.1",
        ];
        for line in lines {
            let route = parse(line);
            let rendered = route.to_string();
            assert_eq!(parse(&rendered), route, "{line} -> {rendered}");
        }
    }

    #[test]
    fn test_rtt_at_range_edge_stays_raw() {
        let route = parse("10.0.0.0/8 rtt 4294967288 rttvar 4294967288");
        assert_eq!(route.to_string(), "10.0.0.0/8 rtt 4294967288 rttvar 1073741822ms");
    }
}
