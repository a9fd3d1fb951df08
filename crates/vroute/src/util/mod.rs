//! Text parsing helpers shared by the route clause parser and name tables.

pub mod addr;
pub mod ifname;
pub mod parse;
