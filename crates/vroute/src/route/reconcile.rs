//! Applying route lists and reconciling them across a configuration reload.

use std::fmt;

use tracing::{info, warn};

use super::message::{RouteTransport, apply_route};
use super::{RouteOp, RouteSpec};
use crate::netlink::error::Result;

/// Outcome of one kernel operation issued for a route list.
#[derive(Debug)]
pub struct AppliedOp {
    pub op: RouteOp,
    /// Position of the issued route in its list; replacements index `new`.
    pub index: usize,
    /// Route target as rendered by [`RouteSpec::target`].
    pub route: String,
    pub result: Result<()>,
}

impl AppliedOp {
    /// Check if the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for AppliedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "{} {}: ok", self.op, self.route),
            Err(e) => write!(f, "{} {}: {e}", self.op, self.route),
        }
    }
}

async fn issue<T: RouteTransport>(
    transport: &T,
    spec: &RouteSpec,
    op: RouteOp,
    index: usize,
) -> AppliedOp {
    let result = apply_route(transport, spec, op).await;
    if let Err(ref e) = result {
        warn!(%op, route = %spec.target(), error = %e, "route operation failed");
    }
    AppliedOp {
        op,
        index,
        route: spec.target(),
        result,
    }
}

/// Install or withdraw every route of `routes` whose state differs.
///
/// `Delete` acts on installed routes, anything else on routes not yet
/// installed. Each route's `installed` flag is updated from the outcome;
/// a failure leaves the route marked as not installed and processing
/// moves on to the next one.
pub async fn apply_routes<T: RouteTransport>(
    transport: &T,
    routes: &mut [RouteSpec],
    op: RouteOp,
) -> Vec<AppliedOp> {
    let deleting = op == RouteOp::Delete;
    let mut applied = Vec::new();

    for (index, route) in routes.iter_mut().enumerate() {
        if deleting != route.installed {
            continue;
        }
        let outcome = issue(transport, route, op, index).await;
        route.installed = outcome.is_success() && !deleting;
        applied.push(outcome);
    }
    applied
}

/// Bring the kernel from the routes installed for `old` to those described
/// by `new`.
///
/// When `new` is empty every installed route of `old` is deleted. Otherwise
/// each installed old route is looked up in `new` by destination, metric and
/// table: a match is replaced in place with the new definition, which takes
/// over the installed state; anything else is deleted. New routes without a
/// counterpart are left for [`apply_routes`].
pub async fn reconcile<T: RouteTransport>(
    transport: &T,
    old: &mut [RouteSpec],
    new: &mut [RouteSpec],
) -> Vec<AppliedOp> {
    if old.is_empty() {
        return Vec::new();
    }

    if new.is_empty() {
        info!(routes = old.len(), "removing route block");
        return apply_routes(transport, old, RouteOp::Delete).await;
    }

    let mut applied = Vec::new();
    for (position, route) in old.iter_mut().enumerate() {
        if !route.installed {
            continue;
        }
        match new.iter_mut().enumerate().find(|(_, n)| n.same_key(route)) {
            Some((index, replacement)) => {
                info!(route = %replacement.target(), "replacing route");
                let outcome = issue(transport, replacement, RouteOp::Replace, index).await;
                replacement.installed = outcome.is_success();
                applied.push(outcome);
            }
            None => {
                info!(route = %route.target(), "route no longer configured");
                let outcome = issue(transport, route, RouteOp::Delete, position).await;
                applied.push(outcome);
            }
        }
        route.installed = false;
    }
    applied
}
