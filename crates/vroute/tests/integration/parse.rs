//! Clause parsing and rendering through the public API.

use vroute::route::{KernelFeatures, RouteParser};
use vroute::{Family, ValidationError};

use crate::common::{StaticResolver, parse};

#[test]
fn test_round_trip() {
    let lines = [
        "10.0.0.0/24 via 192.0.2.1 dev eth0 metric 10",
        "default via 192.0.2.254 table vrrp protocol keepalived",
        "unreachable 10.9.0.0/16 scope link tos 0x10 realms 3/4",
        "2001:db8::/48 via fe80::1 dev eth1 expires 600 pref low",
        "2001:db8:5::/64 from 2001:db8:6::/64 src 2001:db8::1",
        "10.1.0.0/16 mtu lock 1400 advmss 1360 rtt 20ms rto_min 200ms congctl cubic",
        "10.2.0.0/16 dev eth0 encap mpls 100/200/300",
        "10.3.0.0/16 nexthop via 192.0.2.1 dev eth0 weight 2 nexthop via 192.0.2.2 dev eth1",
    ];

    for line in lines {
        let route = parse(line);
        let rendered = route.to_string();
        assert_eq!(parse(&rendered), route, "{line} -> {rendered}");
    }
}

#[test]
fn test_family_agreement() {
    let resolver = StaticResolver::new();
    let parser = RouteParser::new(&resolver);

    for line in [
        "10.0.0.0/24 via 2001:db8::1",
        "2001:db8::/32 src 10.0.0.1",
        "10.0.0.0/24 nexthop via 2001:db8::1",
        "10.0.0.0/24 via inet6 192.0.2.1",
    ] {
        assert!(
            matches!(
                parser.parse_line(line),
                Err(ValidationError::FamilyMismatch { .. })
            ),
            "{line}"
        );
    }

    // the family can come from a later clause
    let route = parse("default via fe80::1 dev eth0");
    assert_eq!(route.family, Family::Inet6);
}

#[test]
fn test_family_restricted_clauses() {
    let resolver = StaticResolver::new();
    let parser = RouteParser::new(&resolver);

    for line in [
        "10.0.0.0/24 expires 10",
        "10.0.0.0/24 pref high",
        "2001:db8::/32 tos 0x10",
        "2001:db8::/32 scope link",
        "2001:db8::/32 onlink",
        "2001:db8::/32 realms 5",
    ] {
        assert!(
            matches!(
                parser.parse_line(line),
                Err(ValidationError::FamilyRestricted { .. })
            ),
            "{line}"
        );
    }

    // a restricted clause pins the family before any address appears
    assert_eq!(parse("expires 30 default").family, Family::Inet6);
    assert!(matches!(
        parser.parse_line("onlink 2001:db8::/32"),
        Err(ValidationError::FamilyMismatch { .. })
    ));
}

#[test]
fn test_weight_bounds() {
    let route = parse("10.0.0.0/8 nexthop via 192.0.2.1 weight 1 nexthop via 192.0.2.2 weight 256");
    assert_eq!(route.nexthops[0].weight, Some(0));
    assert_eq!(route.nexthops[1].weight, Some(255));

    let resolver = StaticResolver::new();
    let parser = RouteParser::new(&resolver);
    assert!(parser.parse_line("10.0.0.0/8 nexthop via 192.0.2.1 weight 0").is_err());
    assert!(parser.parse_line("10.0.0.0/8 nexthop via 192.0.2.1 weight 257").is_err());
}

#[test]
fn test_rejected_blocks() {
    let resolver = StaticResolver::new();
    let parser = RouteParser::new(&resolver);

    assert_eq!(
        parser.parse_line("10.0.0.0/8 dev eth9"),
        Err(ValidationError::UnknownInterface("eth9".into()))
    );
    assert!(matches!(
        parser.parse_line("10.0.0.0/8 nexthop via 192.0.2.1 metric 5"),
        Err(ValidationError::TrailingTokens(_))
    ));
    assert!(matches!(
        parser.parse_line("10.0.0.0/8 encap gre dst 10.0.0.1"),
        Err(ValidationError::InvalidValue { .. })
    ));
    assert!(matches!(
        parser.parse_line("10.0.0.0/8 encap ip ttl 4"),
        Err(ValidationError::MissingValue(_))
    ));
}

#[test]
fn test_kernel_features() {
    let resolver = StaticResolver::new();
    let parser = RouteParser::new(&resolver).with_features(KernelFeatures {
        encap: false,
        ..Default::default()
    });

    assert_eq!(
        parser.parse_line("10.0.0.0/8 encap mpls 100"),
        Err(ValidationError::Unsupported("encap"))
    );
    assert!(parser.parse_line("10.0.0.0/8 quickack 1").is_ok());
}

#[test]
fn test_load_skips_bad_lines() {
    let resolver = StaticResolver::new();
    let report = RouteParser::new(&resolver).load(
        "# virtual routes for VI_1\n\
         10.0.0.0/24 via 192.0.2.1 dev eth0\n\
         \n\
         10.1.0.0/24 via 2001:db8::1\n\
         2001:db8::/48 dev eth1   # uplink\n",
    );

    assert_eq!(report.routes.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].line, 4);
    assert_eq!(report.rejected[0].text, "10.1.0.0/24 via 2001:db8::1");
}
