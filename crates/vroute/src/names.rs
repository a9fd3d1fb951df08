//! Name resolution for interfaces, tables, protocols, scopes, dsfield
//! values and route types.
//!
//! Route clauses name things symbolically (`table mgmt`, `proto static`,
//! `dev eth0`). The parser asks a [`NameResolver`] for the numeric values;
//! [`SystemResolver`] answers from the iproute2 name files and sysfs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::netlink::types::route::{RouteType, rt_proto, rt_scope, rt_table};
use crate::util::ifname;
use crate::util::parse::{get_u8, get_u32};

/// A network interface as named in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Interface {
    /// Interface name.
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
}

impl Interface {
    /// Create an interface reference.
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Lookup boundary used by the route parser.
///
/// Every method returns `None` when the name is unknown.
pub trait NameResolver {
    /// Resolve an interface name to its kernel index.
    fn resolve_interface(&self, name: &str) -> Option<Interface>;
    /// Resolve a routing table name or number.
    fn resolve_table(&self, name: &str) -> Option<u32>;
    /// Resolve a routing protocol name or number.
    fn resolve_protocol(&self, name: &str) -> Option<u8>;
    /// Resolve a route scope name or number.
    fn resolve_scope(&self, name: &str) -> Option<u8>;
    /// Resolve a dsfield name or hex value.
    fn resolve_dsfield(&self, name: &str) -> Option<u8>;

    /// Resolve a route type keyword.
    fn resolve_route_type(&self, name: &str) -> Option<RouteType> {
        RouteType::from_name(name)
    }
}

const BUILTIN_PROTOCOLS: &[(u8, &str)] = &[
    (rt_proto::UNSPEC, "unspec"),
    (rt_proto::REDIRECT, "redirect"),
    (rt_proto::KERNEL, "kernel"),
    (rt_proto::BOOT, "boot"),
    (rt_proto::STATIC, "static"),
    (8, "gated"),
    (9, "ra"),
    (10, "mrt"),
    (11, "zebra"),
    (12, "bird"),
    (13, "dnrouted"),
    (14, "xorp"),
    (15, "ntk"),
    (16, "dhcp"),
    (17, "mrouted"),
    (rt_proto::KEEPALIVED, "keepalived"),
    (42, "babel"),
    (186, "bgp"),
    (187, "isis"),
    (188, "ospf"),
    (189, "rip"),
    (192, "eigrp"),
];

const BUILTIN_SCOPES: &[(u8, &str)] = &[
    (rt_scope::UNIVERSE, "global"),
    (rt_scope::SITE, "site"),
    (rt_scope::LINK, "link"),
    (rt_scope::HOST, "host"),
    (rt_scope::NOWHERE, "nowhere"),
];

const BUILTIN_TABLES: &[(u32, &str)] = &[
    (rt_table::UNSPEC, "unspec"),
    (rt_table::DEFAULT, "default"),
    (rt_table::MAIN, "main"),
    (rt_table::LOCAL, "local"),
];

/// Built-in name of a routing protocol.
pub fn protocol_name(id: u8) -> Option<&'static str> {
    BUILTIN_PROTOCOLS
        .iter()
        .find(|(v, _)| *v == id)
        .map(|(_, name)| *name)
}

/// Built-in name of a route scope.
pub fn scope_name(id: u8) -> Option<&'static str> {
    BUILTIN_SCOPES
        .iter()
        .find(|(v, _)| *v == id)
        .map(|(_, name)| *name)
}

/// Symbolic name tables in iproute2 format.
#[derive(Debug, Clone)]
pub struct RtNames {
    tables: HashMap<String, u32>,
    protocols: HashMap<String, u8>,
    scopes: HashMap<String, u8>,
    dsfields: HashMap<String, u8>,
}

impl Default for RtNames {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RtNames {
    /// Tables holding only the kernel's well-known names.
    pub fn builtin() -> Self {
        let owned = |(v, n): &(u8, &str)| (n.to_string(), *v);
        let mut scopes: HashMap<String, u8> = BUILTIN_SCOPES.iter().map(owned).collect();
        scopes.insert("universe".into(), rt_scope::UNIVERSE);

        Self {
            tables: BUILTIN_TABLES
                .iter()
                .map(|(v, n)| (n.to_string(), *v))
                .collect(),
            protocols: BUILTIN_PROTOCOLS.iter().map(owned).collect(),
            scopes,
            dsfields: HashMap::new(),
        }
    }

    /// Extend the tables with `rt_tables`, `rt_tables.d/*.conf`, `rt_protos`,
    /// `rt_scopes` and `rt_dsfield` from `dir`. Missing files are skipped.
    pub fn load_dir(mut self, dir: &Path) -> Self {
        for (id, name) in read_name_file(&dir.join("rt_tables"), parse_decimal_u32) {
            self.tables.insert(name, id);
        }
        let mut conf: Vec<PathBuf> = std::fs::read_dir(dir.join("rt_tables.d"))
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "conf"))
                    .collect()
            })
            .unwrap_or_default();
        conf.sort();
        for path in conf {
            for (id, name) in read_name_file(&path, parse_decimal_u32) {
                self.tables.insert(name, id);
            }
        }
        for (id, name) in read_name_file(&dir.join("rt_protos"), |s| get_u8(s).ok()) {
            self.protocols.insert(name, id);
        }
        for (id, name) in read_name_file(&dir.join("rt_scopes"), |s| get_u8(s).ok()) {
            self.scopes.insert(name, id);
        }
        for (id, name) in read_name_file(&dir.join("rt_dsfield"), parse_hex_u8) {
            self.dsfields.insert(name, id);
        }
        self
    }

    /// Look up a table by name, falling back to a number.
    pub fn table(&self, name: &str) -> Option<u32> {
        self.tables
            .get(name)
            .copied()
            .or_else(|| get_u32(name).ok())
    }

    /// Look up a protocol by name, falling back to a number.
    pub fn protocol(&self, name: &str) -> Option<u8> {
        self.protocols
            .get(name)
            .copied()
            .or_else(|| get_u8(name).ok())
    }

    /// Look up a scope by name, falling back to a number.
    pub fn scope(&self, name: &str) -> Option<u8> {
        self.scopes.get(name).copied().or_else(|| get_u8(name).ok())
    }

    /// Look up a dsfield by name, falling back to a hex value.
    pub fn dsfield(&self, name: &str) -> Option<u8> {
        self.dsfields
            .get(name)
            .copied()
            .or_else(|| parse_hex_u8(name))
    }
}

fn parse_decimal_u32(s: &str) -> Option<u32> {
    get_u32(s).ok()
}

/// dsfield values are hexadecimal with or without a `0x` prefix.
fn parse_hex_u8(s: &str) -> Option<u8> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(digits, 16).ok()
}

/// Read `<id> <name>` lines, skipping comments and malformed entries.
fn read_name_file<T>(path: &Path, parse_id: impl Fn(&str) -> Option<T>) -> Vec<(T, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    debug!(path = %path.display(), "loading name table");

    let mut entries = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next().and_then(&parse_id), fields.next()) {
            (Some(id), Some(name)) => entries.push((id, name.to_string())),
            _ => warn!(
                path = %path.display(),
                line = lineno + 1,
                "ignoring malformed name table entry"
            ),
        }
    }
    entries
}

/// Resolver backed by iproute2 name tables and `/sys/class/net`.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    names: RtNames,
    sysfs_net: PathBuf,
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(RtNames::builtin())
    }
}

impl SystemResolver {
    /// Create a resolver using the given name tables.
    pub fn new(names: RtNames) -> Self {
        Self {
            names,
            sysfs_net: PathBuf::from("/sys/class/net"),
        }
    }

    /// Create a resolver with the built-in tables extended from an iproute2
    /// configuration directory (usually `/etc/iproute2`).
    pub fn from_iproute2_dir(dir: &Path) -> Self {
        Self::new(RtNames::builtin().load_dir(dir))
    }

    /// Read interface indexes from a different sysfs net directory.
    pub fn with_sysfs_net(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sysfs_net = dir.into();
        self
    }
}

impl NameResolver for SystemResolver {
    fn resolve_interface(&self, name: &str) -> Option<Interface> {
        ifname::name_to_index_in(&self.sysfs_net, name)
            .ok()
            .map(|index| Interface::new(name, index))
    }

    fn resolve_table(&self, name: &str) -> Option<u32> {
        self.names.table(name)
    }

    fn resolve_protocol(&self, name: &str) -> Option<u8> {
        self.names.protocol(name)
    }

    fn resolve_scope(&self, name: &str) -> Option<u8> {
        self.names.scope(name)
    }

    fn resolve_dsfield(&self, name: &str) -> Option<u8> {
        self.names.dsfield(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let names = RtNames::builtin();
        assert_eq!(names.table("main"), Some(254));
        assert_eq!(names.table("1000"), Some(1000));
        assert_eq!(names.table("mgmt"), None);
        assert_eq!(names.protocol("keepalived"), Some(18));
        assert_eq!(names.protocol("99"), Some(99));
        assert_eq!(names.scope("universe"), Some(0));
        assert_eq!(names.scope("link"), Some(253));
        assert_eq!(names.dsfield("0x10"), Some(0x10));
        assert_eq!(names.dsfield("b8"), Some(0xb8));
        assert_eq!(names.dsfield("lowdelay"), None);
    }

    #[test]
    fn test_builtin_reverse_names() {
        assert_eq!(protocol_name(3), Some("boot"));
        assert_eq!(protocol_name(99), None);
        assert_eq!(scope_name(253), Some("link"));
    }

    #[test]
    fn test_load_dir() {
        let dir = std::env::temp_dir().join(format!("vroute-iproute2-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("rt_tables.d")).unwrap();
        std::fs::write(
            dir.join("rt_tables"),
            "# reserved values\n255\tlocal\n254\tmain\n100 mgmt # uplink\nbogus line\n",
        )
        .unwrap();
        std::fs::write(dir.join("rt_tables.d").join("vrrp.conf"), "1000 vrrp\n").unwrap();
        std::fs::write(dir.join("rt_protos"), "250 vroute\n").unwrap();
        std::fs::write(dir.join("rt_dsfield"), "0x10 lowdelay\n").unwrap();

        let names = RtNames::builtin().load_dir(&dir);
        assert_eq!(names.table("mgmt"), Some(100));
        assert_eq!(names.table("vrrp"), Some(1000));
        assert_eq!(names.table("main"), Some(254));
        assert_eq!(names.protocol("vroute"), Some(250));
        assert_eq!(names.dsfield("lowdelay"), Some(0x10));
        assert_eq!(names.scope("host"), Some(254));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_system_resolver_interfaces() {
        let dir = std::env::temp_dir().join(format!("vroute-net-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("bond0")).unwrap();
        std::fs::write(dir.join("bond0").join("ifindex"), "5\n").unwrap();

        let resolver = SystemResolver::default().with_sysfs_net(&dir);
        assert_eq!(
            resolver.resolve_interface("bond0"),
            Some(Interface::new("bond0", 5))
        );
        assert_eq!(resolver.resolve_interface("bond1"), None);
        assert_eq!(resolver.resolve_route_type("prohibit"), Some(RouteType::Prohibit));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
