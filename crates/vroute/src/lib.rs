//! Kernel route synchronization for VRRP failover daemons.
//!
//! This crate turns declarative route blocks, written in the iproute2 clause
//! syntax keepalived uses for `virtual_routes`, into rtnetlink requests and
//! keeps the kernel routing tables in step with them: routes are installed
//! when an instance becomes master, withdrawn when it steps down and
//! reconciled when the configuration is reloaded.
//!
//! # Example
//!
//! ```ignore
//! use vroute::names::SystemResolver;
//! use vroute::netlink::Connection;
//! use vroute::route::{RouteOp, RouteParser, apply_routes};
//!
//! #[tokio::main]
//! async fn main() -> vroute::Result<()> {
//!     let resolver = SystemResolver::default();
//!     let report = RouteParser::new(&resolver).load(
//!         "10.0.0.0/24 via 192.0.2.1 dev eth0 metric 10\n\
//!          2001:db8::/48 via fe80::1 dev eth0 expires 300\n",
//!     );
//!     let mut routes = report.routes;
//!
//!     let conn = Connection::new()?;
//!     for applied in apply_routes(&conn, &mut routes, RouteOp::Add).await {
//!         println!("{applied}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Reloading
//!
//! ```ignore
//! use vroute::route::{RouteOp, apply_routes, reconcile};
//!
//! // Replace or delete whatever the previous configuration installed,
//! // then add the routes that are new.
//! reconcile(&conn, &mut old_routes, &mut new_routes).await;
//! apply_routes(&conn, &mut new_routes, RouteOp::Add).await;
//! ```

pub mod names;
pub mod netlink;
pub mod route;
pub mod util;

pub use netlink::{Connection, Error, Result, ValidationError};
pub use route::{Family, IpPrefix, NextHopSpec, RouteOp, RouteSpec};
