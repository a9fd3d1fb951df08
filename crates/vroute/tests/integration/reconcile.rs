//! Apply and reload flows against a recording transport.

use vroute::netlink::message::{NLM_F_REPLACE, NlMsgType};
use vroute::route::message::DecodedRequest;
use vroute::route::{apply_routes, reconcile};
use vroute::{RouteOp, RouteSpec};

use crate::common::{RecordingTransport, parse};

fn routes(lines: &[&str]) -> Vec<RouteSpec> {
    lines.iter().map(|line| parse(line)).collect()
}

fn kinds(transport: &RecordingTransport) -> Vec<(u16, bool)> {
    transport
        .sent()
        .iter()
        .map(|bytes| {
            let header = DecodedRequest::parse(bytes).unwrap().header;
            (header.nlmsg_type, header.nlmsg_flags & NLM_F_REPLACE != 0)
        })
        .collect()
}

async fn installed(lines: &[&str]) -> Vec<RouteSpec> {
    let mut list = routes(lines);
    apply_routes(&RecordingTransport::new(), &mut list, RouteOp::Add).await;
    assert!(list.iter().all(|r| r.installed));
    list
}

#[tokio::test]
async fn test_apply_is_idempotent() {
    let transport = RecordingTransport::new();
    let mut list = routes(&["10.0.0.0/24 via 192.0.2.1", "10.1.0.0/24 via 192.0.2.1"]);

    assert_eq!(apply_routes(&transport, &mut list, RouteOp::Add).await.len(), 2);
    assert!(apply_routes(&transport, &mut list, RouteOp::Add).await.is_empty());

    assert_eq!(apply_routes(&transport, &mut list, RouteOp::Delete).await.len(), 2);
    assert!(list.iter().all(|r| !r.installed));
    assert_eq!(transport.sent().len(), 4);
}

#[tokio::test]
async fn test_failed_add_is_retried() {
    let transport = RecordingTransport::with_replies(&[Some(libc::ENETDOWN)]);
    let mut list = routes(&["10.0.0.0/24 via 192.0.2.1"]);

    let applied = apply_routes(&transport, &mut list, RouteOp::Add).await;
    assert!(!applied[0].is_success());
    assert!(!list[0].installed);

    let applied = apply_routes(&transport, &mut list, RouteOp::Add).await;
    assert!(applied[0].is_success());
    assert!(list[0].installed);
}

#[tokio::test]
async fn test_reload_to_empty_block() {
    let mut old = installed(&["10.0.0.0/24 via 192.0.2.1", "10.1.0.0/24 dev eth0"]).await;
    let transport = RecordingTransport::new();

    let applied = reconcile(&transport, &mut old, &mut []).await;
    assert_eq!(applied.len(), 2);
    assert_eq!(
        kinds(&transport),
        vec![(NlMsgType::RTM_DELROUTE, false), (NlMsgType::RTM_DELROUTE, false)]
    );
}

#[tokio::test]
async fn test_reload_replaces_and_deletes() {
    let mut old = installed(&[
        "10.0.0.0/24 via 192.0.2.1 metric 10",
        "10.1.0.0/24 via 192.0.2.1",
        "10.2.0.0/24 via 192.0.2.1 table vrrp",
    ])
    .await;
    let mut new = routes(&[
        "10.0.0.0/24 via 192.0.2.9 metric 10",
        "10.2.0.0/24 via 192.0.2.1",
        "10.3.0.0/24 via 192.0.2.1",
    ]);
    let transport = RecordingTransport::new();

    let applied = reconcile(&transport, &mut old, &mut new).await;
    let ops: Vec<RouteOp> = applied.iter().map(|a| a.op).collect();
    assert_eq!(ops, vec![RouteOp::Replace, RouteOp::Delete, RouteOp::Delete]);
    assert_eq!(
        kinds(&transport),
        vec![
            (NlMsgType::RTM_NEWROUTE, true),
            (NlMsgType::RTM_DELROUTE, false),
            (NlMsgType::RTM_DELROUTE, false),
        ]
    );

    // the replacement carries the new gateway
    let sent = transport.sent();
    let replace = DecodedRequest::parse(&sent[0]).unwrap();
    assert_eq!(
        replace.attr(vroute::netlink::types::route::RtaAttr::Gateway),
        Some(&[192, 0, 2, 9][..])
    );

    assert_eq!(
        new.iter().map(|r| r.installed).collect::<Vec<_>>(),
        vec![true, false, false]
    );

    // the rest are added by the apply step
    let transport = RecordingTransport::new();
    let applied = apply_routes(&transport, &mut new, RouteOp::Add).await;
    assert_eq!(applied.len(), 2);
    assert!(new.iter().all(|r| r.installed));
}

#[tokio::test]
async fn test_reload_default_route_changes_family() {
    let mut old = installed(&["default via 192.0.2.1"]).await;
    let mut new = routes(&["default via fe80::1 dev eth0"]);
    let transport = RecordingTransport::new();

    let applied = reconcile(&transport, &mut old, &mut new).await;
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].op, RouteOp::Delete);
    assert_eq!(kinds(&transport), vec![(NlMsgType::RTM_DELROUTE, false)]);

    let sent = transport.sent();
    let deleted = DecodedRequest::parse(&sent[0]).unwrap();
    assert_eq!(deleted.rtmsg.rtm_family, libc::AF_INET as u8);
    assert!(!old[0].installed);
    assert!(!new[0].installed);

    let transport = RecordingTransport::new();
    let applied = apply_routes(&transport, &mut new, RouteOp::Add).await;
    assert_eq!(applied.len(), 1);
    assert!(new[0].installed);
}
