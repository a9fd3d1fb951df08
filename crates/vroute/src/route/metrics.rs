//! Per-route TCP metrics carried in `RTA_METRICS`.

use crate::netlink::builder::{AttrBuffer, METRICS_ATTR_SIZE};
use crate::netlink::error::Result;
use crate::netlink::types::route::rtax;

/// Route metrics (RTAX_* values).
///
/// Each metric is independently present or absent. `lock` is a bitmask with
/// bit `1 << RTAX_x` set when metric `x` is locked against kernel updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RouteMetrics {
    pub mtu: Option<u32>,
    pub window: Option<u32>,
    /// Smoothed RTT in kernel units (1/8 ms).
    pub rtt: Option<u32>,
    /// RTT variance in kernel units (1/4 ms).
    pub rttvar: Option<u32>,
    pub ssthresh: Option<u32>,
    pub cwnd: Option<u32>,
    pub advmss: Option<u32>,
    pub reordering: Option<u32>,
    pub hoplimit: Option<u32>,
    pub initcwnd: Option<u32>,
    pub features: Option<u32>,
    /// Minimum retransmission timeout in ms.
    pub rto_min: Option<u32>,
    pub initrwnd: Option<u32>,
    pub quickack: Option<u32>,
    /// Congestion control algorithm name.
    pub congctl: Option<String>,
    /// Locked metrics mask.
    pub lock: u32,
}

impl RouteMetrics {
    /// Lock metric `kind` (an RTAX_* value).
    pub fn set_locked(&mut self, kind: u16) {
        self.lock |= 1 << kind;
    }

    /// Check whether metric `kind` is locked.
    pub fn is_locked(&self, kind: u16) -> bool {
        self.lock & (1 << kind) != 0
    }

    /// Numeric metrics in encoding order.
    fn numeric(&self) -> [(u16, Option<u32>); 14] {
        [
            (rtax::RTT, self.rtt),
            (rtax::RTTVAR, self.rttvar),
            (rtax::RTO_MIN, self.rto_min),
            (rtax::FEATURES, self.features),
            (rtax::MTU, self.mtu),
            (rtax::WINDOW, self.window),
            (rtax::SSTHRESH, self.ssthresh),
            (rtax::CWND, self.cwnd),
            (rtax::ADVMSS, self.advmss),
            (rtax::REORDERING, self.reordering),
            (rtax::HOPLIMIT, self.hoplimit),
            (rtax::INITCWND, self.initcwnd),
            (rtax::INITRWND, self.initrwnd),
            (rtax::QUICKACK, self.quickack),
        ]
    }

    /// Check if no metric is set. A lock mask on its own locks nothing.
    pub fn is_empty(&self) -> bool {
        self.congctl.is_none() && self.numeric().iter().all(|(_, v)| v.is_none())
    }

    /// Encode the metrics as the payload of `RTA_METRICS`, with
    /// `RTAX_LOCK` last when any lock bit is set alongside a metric.
    pub fn encode(&self) -> Result<AttrBuffer> {
        let mut buf = AttrBuffer::with_limit(METRICS_ATTR_SIZE);

        if let Some(ref name) = self.congctl {
            buf.append_attr_str(rtax::CC_ALGO, name)?;
        }
        for (kind, value) in self.numeric() {
            if let Some(v) = value {
                buf.append_attr_u32(kind, v)?;
            }
        }
        if self.lock != 0 && !buf.is_empty() {
            buf.append_attr_u32(rtax::LOCK, self.lock)?;
        }

        Ok(buf)
    }
}
