//! Building and submitting rtnetlink route requests.

use std::fmt;
use std::future::Future;
use std::net::IpAddr;

use tracing::debug;
use winnow::prelude::*;
use winnow::token::take;

use super::encap::Encapsulation;
use super::{Family, NextHopSpec, RouteOp, RouteSpec};
use crate::netlink::attr::NLA_HDRLEN;
use crate::netlink::builder::{
    AttrBuffer, ENCAP_ATTR_SIZE, MessageBuilder, NEXTHOP_ATTR_SIZE, ROUTE_ATTR_SIZE,
};
use crate::netlink::connection::Connection;
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_REPLACE, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgHdr, NlMsgType,
};
use crate::netlink::parse::{FromNetlink, PResult, cut, parse_attrs, parse_nlmsghdr};
use crate::netlink::types::route::{
    RtMsg, RtNextHop, RtaAttr, rt_proto, rt_scope, rt_table, rtnh_flags,
};

/// Delivers a built request to the kernel and waits for its ACK.
pub trait RouteTransport {
    /// Submit one request. Kernel errors come back as [`Error::Kernel`].
    fn submit(&self, msg: MessageBuilder) -> impl Future<Output = Result<()>>;
}

impl RouteTransport for Connection {
    async fn submit(&self, msg: MessageBuilder) -> Result<()> {
        self.request_ack(msg).await
    }
}

fn octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(a) => a.octets().to_vec(),
        IpAddr::V6(a) => a.octets().to_vec(),
    }
}

/// `RTA_GATEWAY` when the gateway shares the route's family, otherwise
/// `RTA_VIA` carrying the gateway family ahead of the address.
fn append_gateway(buf: &mut AttrBuffer, family: Family, via: IpAddr) -> Result<()> {
    let addr = octets(&via);
    let via_family = Family::of(&via);
    if via_family == family {
        buf.append_attr(RtaAttr::Gateway.id(), &addr)
    } else {
        let af = u16::from(via_family.af()).to_ne_bytes();
        buf.append_attr_parts(RtaAttr::Via.id(), &[&af, &addr])
    }
}

fn append_encap(buf: &mut AttrBuffer, encap: &Encapsulation) -> Result<()> {
    if encap.is_none() {
        return Ok(());
    }
    let mut block = AttrBuffer::with_limit(ENCAP_ATTR_SIZE);
    encap.write_to(&mut block)?;
    buf.append_raw(block.as_bytes())
}

/// One `rtnexthop` record with its trailing attributes.
fn nexthop_record(family: Family, nexthop: &NextHopSpec) -> Result<AttrBuffer> {
    let ifindex = match nexthop.oif {
        Some(ref oif) => i32::try_from(oif.index).map_err(|_| {
            Error::InvalidAttribute(format!("interface {} index {}", oif.name, oif.index))
        })?,
        None => 0,
    };

    let mut record = AttrBuffer::with_limit(NEXTHOP_ATTR_SIZE);
    record.append_struct(&RtNextHop {
        rtnh_len: 0,
        rtnh_flags: if nexthop.onlink { rtnh_flags::ONLINK } else { 0 },
        rtnh_hops: nexthop.weight.unwrap_or(0),
        rtnh_ifindex: ifindex,
    })?;

    if let Some(via) = nexthop.via {
        append_gateway(&mut record, family, via)?;
    }
    if let Some(realms) = nexthop.realms {
        record.append_attr_u32(RtaAttr::Flow.id(), realms)?;
    }
    append_encap(&mut record, &nexthop.encap)?;

    let len = u16::try_from(record.len())
        .map_err(|_| Error::InvalidAttribute(format!("next hop of {} bytes", record.len())))?;
    record.set_u16_at(0, len);
    Ok(record)
}

/// A route operation ready to be encoded.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    spec: &'a RouteSpec,
    op: RouteOp,
}

impl<'a> RouteRequest<'a> {
    /// Prepare `op` for `spec`.
    pub fn new(spec: &'a RouteSpec, op: RouteOp) -> Self {
        Self { spec, op }
    }

    /// The `rtmsg` header for this request.
    pub fn header(&self) -> RtMsg {
        let spec = self.spec;
        // tables beyond the u8 field travel in RTA_TABLE
        let table = u8::try_from(spec.table).unwrap_or(rt_table::UNSPEC as u8);
        let mut hdr = RtMsg::new()
            .with_family(spec.family.af())
            .with_table(table);

        hdr = match self.op {
            RouteOp::Delete => hdr
                .with_scope(rt_scope::NOWHERE)
                .with_type(spec.route_type.map_or(0, |kind| kind as u8)),
            RouteOp::Add | RouteOp::Replace => hdr
                .with_protocol(rt_proto::BOOT)
                .with_scope(rt_scope::UNIVERSE)
                .with_type(spec.kind() as u8),
        };
        if let Some(protocol) = spec.protocol {
            hdr = hdr.with_protocol(protocol);
        }
        if let Some(scope) = spec.scope {
            hdr = hdr.with_scope(scope);
        }

        hdr.rtm_dst_len = spec.dst.map_or(0, |dst| dst.len);
        hdr.rtm_src_len = spec.src.map_or(0, |src| src.len);
        hdr.rtm_tos = spec.tos.unwrap_or(0);
        if spec.onlink {
            hdr.rtm_flags = u32::from(rtnh_flags::ONLINK);
        }
        hdr
    }

    /// Encode the complete request. Nothing is sent if this fails.
    pub fn build(&self) -> Result<MessageBuilder> {
        let spec = self.spec;
        let (msg_type, flags) = match self.op {
            RouteOp::Delete => (NlMsgType::RTM_DELROUTE, NLM_F_REQUEST | NLM_F_ACK),
            RouteOp::Add => (
                NlMsgType::RTM_NEWROUTE,
                NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE,
            ),
            RouteOp::Replace => (
                NlMsgType::RTM_NEWROUTE,
                NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE,
            ),
        };

        let mut msg = MessageBuilder::new(msg_type, flags, RtMsg::SIZE + ROUTE_ATTR_SIZE);
        msg.append_struct(&self.header())?;

        if u8::try_from(spec.table).is_err() {
            msg.append_attr_u32(RtaAttr::Table.id(), spec.table)?;
        }
        if let Some(dst) = spec.dst {
            msg.append_attr(RtaAttr::Dst.id(), &octets(&dst.addr))?;
        }
        if let Some(src) = spec.src {
            msg.append_attr(RtaAttr::Src.id(), &octets(&src.addr))?;
        }
        if let Some(pref_src) = spec.pref_src {
            msg.append_attr(RtaAttr::Prefsrc.id(), &octets(&pref_src))?;
        }
        if let Some(via) = spec.via {
            append_gateway(&mut msg, spec.family, via)?;
        }
        append_encap(&mut msg, &spec.encap)?;
        if let Some(ref oif) = spec.oif {
            msg.append_attr_u32(RtaAttr::Oif.id(), oif.index)?;
        }
        if let Some(metric) = spec.metric {
            msg.append_attr_u32(RtaAttr::Priority.id(), metric)?;
        }
        if let Some(realms) = spec.realms {
            msg.append_attr_u32(RtaAttr::Flow.id(), realms)?;
        }
        if let Some(expires) = spec.expires {
            msg.append_attr_u32(RtaAttr::Expires.id(), expires)?;
        }
        if let Some(pref) = spec.pref {
            msg.append_attr_u8(RtaAttr::Pref.id(), pref)?;
        }
        if !spec.metrics.is_empty() {
            let metrics = spec.metrics.encode()?;
            msg.append_attr(RtaAttr::Metrics.id(), metrics.as_bytes())?;
        }

        if !spec.nexthops.is_empty() {
            let multipath = msg.payload_start(RtaAttr::Multipath.id())?;
            for nexthop in &spec.nexthops {
                let record = nexthop_record(spec.family, nexthop)?;
                msg.append_raw(record.as_bytes())?;
            }
            msg.nest_end(multipath)?;
        }

        Ok(msg)
    }
}

/// Encode and submit `op` for `spec`.
///
/// Deleting a route that carries an expiry succeeds when the kernel reports
/// it missing, since it may have expired on its own.
pub async fn apply_route<T: RouteTransport>(
    transport: &T,
    spec: &RouteSpec,
    op: RouteOp,
) -> Result<()> {
    let msg = RouteRequest::new(spec, op).build()?;
    debug!(%op, route = %spec.target(), len = msg.len(), "submitting route request");

    match transport.submit(msg).await {
        Ok(()) => Ok(()),
        Err(e) if op == RouteOp::Delete && spec.expires.is_some() && e.is_route_gone() => {
            debug!(route = %spec.target(), "route already expired");
            Ok(())
        }
        Err(e) => Err(e.with_context(format!("{op} route {}", spec.target()))),
    }
}

/// A route request decoded back from its wire form.
#[derive(Debug, Clone)]
pub struct DecodedRequest<'a> {
    pub header: NlMsgHdr,
    pub rtmsg: RtMsg,
    /// Top-level attributes in wire order.
    pub attrs: Vec<(u16, &'a [u8])>,
}

/// One record of a decoded `RTA_MULTIPATH` payload.
#[derive(Debug, Clone)]
pub struct DecodedNextHop<'a> {
    pub header: RtNextHop,
    pub attrs: Vec<(u16, &'a [u8])>,
}

fn parse_request<'a>(input: &mut &'a [u8]) -> PResult<DecodedRequest<'a>> {
    let header = parse_nlmsghdr(input)?;
    let len = header.nlmsg_len as usize;
    if len < NLMSG_HDRLEN + RtMsg::SIZE {
        return cut();
    }

    let mut body: &[u8] = take(len - NLMSG_HDRLEN).parse_next(input)?;
    let rtmsg = RtMsg::parse(&mut body)?;
    let attrs = parse_attrs(&mut body)?;
    Ok(DecodedRequest {
        header,
        rtmsg,
        attrs,
    })
}

fn parse_nexthop<'a>(input: &mut &'a [u8]) -> PResult<DecodedNextHop<'a>> {
    let header = RtNextHop::parse(input)?;
    let len = header.rtnh_len as usize;
    if len < RtNextHop::SIZE {
        return cut();
    }

    let mut trailing: &[u8] = take(len - RtNextHop::SIZE).parse_next(input)?;
    let attrs = parse_attrs(&mut trailing)?;
    Ok(DecodedNextHop { header, attrs })
}

impl<'a> DecodedRequest<'a> {
    /// Decode a request produced by [`RouteRequest::build`].
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut input = data;
        parse_request(&mut input).map_err(|e| Error::InvalidMessage(format!("{e:?}")))
    }

    /// Payload of the first attribute of `kind`.
    pub fn attr(&self, kind: RtaAttr) -> Option<&'a [u8]> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == kind.id())
            .map(|(_, data)| *data)
    }

    /// Records of the `RTA_MULTIPATH` attribute, if present.
    pub fn nexthops(&self) -> Result<Vec<DecodedNextHop<'a>>> {
        let Some(mut payload) = self.attr(RtaAttr::Multipath) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        while !payload.is_empty() {
            let record = parse_nexthop(&mut payload)
                .map_err(|e| Error::InvalidAttribute(format!("multipath record: {e:?}")))?;
            records.push(record);
        }
        Ok(records)
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn write_attrs(f: &mut fmt::Formatter<'_>, attrs: &[(u16, &[u8])], indent: usize) -> fmt::Result {
    for (kind, data) in attrs {
        match RtaAttr::from_id(*kind) {
            Some(attr) => write!(f, "\n{:indent$}{}", "", attr.name())?,
            None => write!(f, "\n{:indent$}attr {kind}", "")?,
        }
        write!(f, " len {} {}", NLA_HDRLEN + data.len(), hex(data))?;
    }
    Ok(())
}

impl fmt::Display for DecodedRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.header.nlmsg_type {
            NlMsgType::RTM_NEWROUTE => "RTM_NEWROUTE",
            NlMsgType::RTM_DELROUTE => "RTM_DELROUTE",
            _ => "unknown",
        };
        let r = &self.rtmsg;
        write!(
            f,
            "{name} len {} flags 0x{:x}: family {} dst_len {} src_len {} tos {} \
             table {} protocol {} scope {} type {} flags 0x{:x}",
            self.header.nlmsg_len,
            self.header.nlmsg_flags,
            r.rtm_family,
            r.rtm_dst_len,
            r.rtm_src_len,
            r.rtm_tos,
            r.rtm_table,
            r.rtm_protocol,
            r.rtm_scope,
            r.rtm_type,
            r.rtm_flags,
        )?;

        write_attrs(f, &self.attrs, 2)?;

        let Ok(nexthops) = self.nexthops() else {
            return Ok(());
        };
        for nexthop in nexthops {
            let h = &nexthop.header;
            write!(
                f,
                "\n  nexthop len {} flags 0x{:x} hops {} ifindex {}",
                h.rtnh_len, h.rtnh_flags, h.rtnh_hops, h.rtnh_ifindex
            )?;
            write_attrs(f, &nexthop.attrs, 4)?;
        }
        Ok(())
    }
}
