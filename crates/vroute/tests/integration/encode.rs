//! Wire encoding of parsed routes.

use vroute::netlink::attr::get;
use vroute::netlink::message::{NLM_F_CREATE, NLM_F_REPLACE, NlMsgType};
use vroute::netlink::types::route::{RtNextHop, RtaAttr, rt_table};
use vroute::route::message::DecodedRequest;
use vroute::route::{RouteRequest, apply_route};
use vroute::{Error, RouteOp};

use crate::common::{RecordingTransport, parse};

fn encode(line: &str, op: RouteOp) -> Vec<u8> {
    RouteRequest::new(&parse(line), op)
        .build()
        .unwrap()
        .finish()
}

#[test]
fn test_table_above_u8() {
    let bytes = encode("10.0.0.0/24 via 192.0.2.1 table vrrp", RouteOp::Add);
    let req = DecodedRequest::parse(&bytes).unwrap();
    assert_eq!(req.rtmsg.rtm_table, rt_table::UNSPEC as u8);
    assert_eq!(get::u32_ne(req.attr(RtaAttr::Table).unwrap()).unwrap(), 1000);

    let bytes = encode("10.0.0.0/24 via 192.0.2.1 table local", RouteOp::Add);
    let req = DecodedRequest::parse(&bytes).unwrap();
    assert_eq!(req.rtmsg.rtm_table, 255);
    assert!(req.attr(RtaAttr::Table).is_none());
}

#[test]
fn test_weight_on_the_wire() {
    let bytes = encode(
        "10.0.0.0/8 nexthop via 192.0.2.1 weight 1 nexthop via 192.0.2.2 weight 256",
        RouteOp::Add,
    );
    let req = DecodedRequest::parse(&bytes).unwrap();
    let hops = req.nexthops().unwrap();
    assert_eq!(hops[0].header.rtnh_hops, 0);
    assert_eq!(hops[1].header.rtnh_hops, 255);
}

#[test]
fn test_multipath_records_are_self_contained() {
    let bytes = encode(
        "10.0.0.0/8 nexthop via 192.0.2.1 dev eth0 \
         nexthop via 192.0.2.2 dev eth1 realms 7 encap ip id 9 dst 10.9.9.9 \
         nexthop dev eth0",
        RouteOp::Add,
    );
    let req = DecodedRequest::parse(&bytes).unwrap();
    let payload = req.attr(RtaAttr::Multipath).unwrap();
    let hops = req.nexthops().unwrap();
    assert_eq!(hops.len(), 3);

    let mut offset = 0;
    for hop in &hops {
        let len = hop.header.rtnh_len as usize;
        assert!(len >= RtNextHop::SIZE);
        assert_eq!(len % 4, 0);
        offset += len;
    }
    assert_eq!(offset, payload.len());

    assert_eq!(hops[1].header.rtnh_ifindex, 3);
    let kinds: Vec<u16> = hops[1].attrs.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            RtaAttr::Gateway.id(),
            RtaAttr::Flow.id(),
            RtaAttr::Encap.id(),
            RtaAttr::EncapType.id()
        ]
    );
    assert_eq!(hops[2].header.rtnh_len as usize, RtNextHop::SIZE);
}

#[test]
fn test_legacy_or_encodes_two_hops() {
    let bytes = encode("10.0.0.0/8 via 192.0.2.1 or 192.0.2.2", RouteOp::Add);
    let req = DecodedRequest::parse(&bytes).unwrap();
    assert!(req.attr(RtaAttr::Gateway).is_none());
    assert_eq!(req.nexthops().unwrap().len(), 2);
}

#[tokio::test]
async fn test_submit_flags() {
    let transport = RecordingTransport::new();
    let route = parse("10.0.0.0/24 via 192.0.2.1");

    apply_route(&transport, &route, RouteOp::Add).await.unwrap();
    apply_route(&transport, &route, RouteOp::Replace).await.unwrap();
    apply_route(&transport, &route, RouteOp::Delete).await.unwrap();

    let sent = transport.sent();
    let headers: Vec<_> = sent
        .iter()
        .map(|bytes| DecodedRequest::parse(bytes).unwrap().header)
        .collect();
    assert_eq!(headers[0].nlmsg_type, NlMsgType::RTM_NEWROUTE);
    assert_ne!(headers[0].nlmsg_flags & NLM_F_CREATE, 0);
    assert_eq!(headers[0].nlmsg_flags & NLM_F_REPLACE, 0);
    assert_ne!(headers[1].nlmsg_flags & NLM_F_REPLACE, 0);
    assert_eq!(headers[2].nlmsg_type, NlMsgType::RTM_DELROUTE);
}

#[tokio::test]
async fn test_delete_of_expired_route() {
    let route = parse("2001:db8::/48 via fe80::1 dev eth0 expires 30");

    let transport = RecordingTransport::with_replies(&[Some(libc::ESRCH), Some(libc::ENOENT)]);
    apply_route(&transport, &route, RouteOp::Delete).await.unwrap();
    apply_route(&transport, &route, RouteOp::Delete).await.unwrap();

    // other failures still count
    let transport = RecordingTransport::with_replies(&[Some(libc::EPERM)]);
    let err = apply_route(&transport, &route, RouteOp::Delete)
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    // and so does a missing route without an expiry
    let route = parse("2001:db8::/48 via fe80::1 dev eth0");
    let transport = RecordingTransport::with_replies(&[Some(libc::ESRCH)]);
    let err = apply_route(&transport, &route, RouteOp::Delete)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KernelWithContext { .. }));
    assert!(err.to_string().starts_with("delete route 2001:db8::/48"));
}

#[test]
fn test_oversized_route_is_not_sent() {
    let labels: Vec<String> = (16..46).map(|l| l.to_string()).collect();
    let hop = format!("nexthop via 192.0.2.1 encap mpls {}", labels.join("/"));
    let line = format!("10.0.0.0/8 {}", vec![hop; 10].join(" "));

    let route = parse(&line);
    assert!(matches!(
        RouteRequest::new(&route, RouteOp::Add).build(),
        Err(Error::BufferExhausted { .. })
    ));
}
