//! Route clause parser.
//!
//! One route is a flat token sequence in `ip route` syntax:
//!
//! ```text
//! [to] [TYPE] PREFIX|default [src ADDR] [via [inet|inet6] ADDR] [dev IFNAME]
//!     [table TABLE] [protocol PROTO] [scope SCOPE] [metric N] [tos TOS]
//!     [onlink] [realms [FROM/]TO] [from PREFIX] [expires SECS] [pref PREF]
//!     [encap ENCAP] [METRIC [lock] VALUE]... [nexthop NH]...
//! ```
//!
//! The address family is inferred from the first clause that implies one
//! and every later clause must agree with it.

use std::net::IpAddr;

use tracing::{debug, warn};

use super::encap::Encapsulation;
use super::{Family, IpPrefix, NextHopSpec, RouteSpec};
use crate::names::NameResolver;
use crate::netlink::error::ValidationError;
use crate::netlink::types::route::{icmpv6_router_pref, rtax};
use crate::util::parse::{ParseError, get_realms, get_time_rtt, get_u8, get_u32};

pub(crate) type ParseResult<T> = std::result::Result<T, ValidationError>;

pub(crate) fn invalid(clause: &'static str, value: &str) -> ValidationError {
    ValidationError::InvalidValue {
        clause,
        value: value.to_string(),
    }
}

/// Cursor over the tokens of one route block.
pub(crate) struct Tokens<'a> {
    words: &'a [&'a str],
    pos: usize,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(words: &'a [&'a str]) -> Self {
        Self { words, pos: 0 }
    }

    /// The current token, without consuming it.
    pub(crate) fn peek(&self) -> Option<&'a str> {
        self.words.get(self.pos).copied()
    }

    pub(crate) fn advance(&mut self) {
        self.pos += 1;
    }

    /// Consume the argument of `clause`.
    pub(crate) fn value(&mut self, clause: &'static str) -> ParseResult<&'a str> {
        let value = self.peek().ok_or(ValidationError::MissingValue(clause))?;
        self.advance();
        Ok(value)
    }

    /// Consume the current token if it is `word`.
    pub(crate) fn eat(&mut self, word: &str) -> bool {
        if self.peek() == Some(word) {
            self.advance();
            true
        } else {
            false
        }
    }
}

/// Optional kernel capabilities gating clauses that older kernels lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelFeatures {
    pub encap: bool,
    pub expires: bool,
    pub pref: bool,
    pub congctl: bool,
    pub initrwnd: bool,
    pub quickack: bool,
    pub features: bool,
}

impl Default for KernelFeatures {
    fn default() -> Self {
        Self {
            encap: true,
            expires: true,
            pref: true,
            congctl: true,
            initrwnd: true,
            quickack: true,
            features: true,
        }
    }
}

/// A route line that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRoute {
    /// 1-based line number.
    pub line: usize,
    /// The line as written, without comments.
    pub text: String,
    pub error: ValidationError,
}

/// Result of loading a route file.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub routes: Vec<RouteSpec>,
    pub rejected: Vec<RejectedRoute>,
}

/// Parser from route clauses to [`RouteSpec`].
pub struct RouteParser<'r> {
    resolver: &'r dyn NameResolver,
    features: KernelFeatures,
}

impl<'r> RouteParser<'r> {
    /// Create a parser resolving names through `resolver`.
    pub fn new(resolver: &'r dyn NameResolver) -> Self {
        Self {
            resolver,
            features: KernelFeatures::default(),
        }
    }

    /// Restrict the clauses accepted to what the kernel supports.
    pub fn with_features(mut self, features: KernelFeatures) -> Self {
        self.features = features;
        self
    }

    /// Parse one route from its tokens.
    pub fn parse(&self, words: &[&str]) -> ParseResult<RouteSpec> {
        let mut tokens = Tokens::new(words);
        let mut block = Block::new(self);
        block.clauses(&mut tokens)?;

        if tokens.peek() == Some("nexthop") {
            if !block.spec.nexthops.is_empty() {
                return Err(ValidationError::Conflict(
                    "cannot specify nexthops with an \"or\" route",
                ));
            }
            while tokens.eat("nexthop") {
                let nexthop = block.nexthop(&mut tokens)?;
                block.spec.nexthops.push(nexthop);
            }
        }
        if let Some(rest) = tokens.peek() {
            return Err(ValidationError::TrailingTokens(rest.to_string()));
        }

        block.finish()
    }

    /// Parse one route from a whitespace-separated line.
    pub fn parse_line(&self, line: &str) -> ParseResult<RouteSpec> {
        let words: Vec<&str> = line.split_whitespace().collect();
        self.parse(&words)
    }

    /// Parse a route file: one route per line, `#` comments and blank lines
    /// ignored. Bad lines are reported and skipped.
    pub fn load(&self, text: &str) -> LoadReport {
        let mut report = LoadReport::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            match self.parse_line(line) {
                Ok(route) => {
                    debug!(line = idx + 1, %route, "parsed route");
                    report.routes.push(route);
                }
                Err(error) => {
                    warn!(line = idx + 1, %error, "ignoring route");
                    report.rejected.push(RejectedRoute {
                        line: idx + 1,
                        text: line.to_string(),
                        error,
                    });
                }
            }
        }

        report
    }
}

/// State of one route block while its clauses are consumed.
struct Block<'p, 'r> {
    parser: &'p RouteParser<'r>,
    spec: RouteSpec,
    family: Option<Family>,
    has_dst: bool,
}

impl<'p, 'r> Block<'p, 'r> {
    fn new(parser: &'p RouteParser<'r>) -> Self {
        Self {
            parser,
            spec: RouteSpec::default(),
            family: None,
            has_dst: false,
        }
    }

    fn resolver(&self) -> &'r dyn NameResolver {
        self.parser.resolver
    }

    /// Record the family of an address clause.
    fn pin(&mut self, family: Family, clause: &'static str, value: &str) -> ParseResult<()> {
        match self.family {
            Some(f) if f != family => Err(ValidationError::FamilyMismatch {
                clause,
                value: value.to_string(),
            }),
            _ => {
                self.family = Some(family);
                Ok(())
            }
        }
    }

    /// Record a clause that only exists for `family`.
    fn restrict(&mut self, family: Family, clause: &'static str) -> ParseResult<()> {
        match self.family {
            Some(f) if f != family => Err(ValidationError::FamilyRestricted {
                clause,
                family: family.name(),
            }),
            _ => {
                self.family = Some(family);
                Ok(())
            }
        }
    }

    fn require(&self, enabled: bool, clause: &'static str) -> ParseResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(ValidationError::Unsupported(clause))
        }
    }

    /// Flat clauses, up to the first `nexthop` or end of input.
    fn clauses(&mut self, tokens: &mut Tokens<'_>) -> ParseResult<()> {
        let features = self.parser.features;

        while let Some(word) = tokens.peek() {
            if word == "nexthop" {
                break;
            }
            tokens.advance();

            match word {
                "src" => {
                    let value = tokens.value("src")?;
                    let addr = address("src", value)?;
                    self.pin(Family::of(&addr), "src", value)?;
                    self.spec.pref_src = Some(addr);
                }
                "via" | "gw" => {
                    if word == "gw" {
                        warn!("\"gw\" for routes is deprecated, use \"via\"");
                    }
                    self.spec.via = Some(self.gateway(tokens, "via")?);
                }
                "from" => {
                    let value = tokens.value("from")?;
                    let prefix = prefix("from", value)?;
                    if prefix.family() != Family::Inet6 {
                        return Err(ValidationError::FamilyRestricted {
                            clause: "from",
                            family: Family::Inet6.name(),
                        });
                    }
                    self.pin(Family::Inet6, "from", value)?;
                    self.spec.src = Some(prefix);
                }
                "tos" | "dsfield" => {
                    self.restrict(Family::Inet, "tos")?;
                    let value = tokens.value("tos")?;
                    let tos = self
                        .resolver()
                        .resolve_dsfield(value)
                        .ok_or_else(|| unknown("dsfield", value))?;
                    self.spec.tos = Some(tos);
                }
                "table" => {
                    let value = tokens.value("table")?;
                    let table = self
                        .resolver()
                        .resolve_table(value)
                        .ok_or_else(|| unknown("table", value))?;
                    self.spec.table = table;
                }
                "protocol" | "proto" => {
                    let value = tokens.value("protocol")?;
                    let protocol = self
                        .resolver()
                        .resolve_protocol(value)
                        .ok_or_else(|| unknown("protocol", value))?;
                    self.spec.protocol = Some(protocol);
                }
                "scope" => {
                    self.restrict(Family::Inet, "scope")?;
                    let value = tokens.value("scope")?;
                    let scope = self
                        .resolver()
                        .resolve_scope(value)
                        .ok_or_else(|| unknown("scope", value))?;
                    self.spec.scope = Some(scope);
                }
                "metric" | "priority" | "preference" => {
                    let value = tokens.value("metric")?;
                    self.spec.metric = Some(bounded("metric", value, u32::MAX)?);
                }
                "dev" | "oif" => {
                    let value = tokens.value("dev")?;
                    self.spec.oif = Some(self.interface(value)?);
                }
                "onlink" => {
                    self.restrict(Family::Inet, "onlink")?;
                    self.spec.onlink = true;
                }
                "encap" => {
                    self.require(features.encap, "encap")?;
                    self.spec.encap = Encapsulation::parse(tokens, self.resolver())?;
                }
                "expires" => {
                    self.require(features.expires, "expires")?;
                    self.restrict(Family::Inet6, "expires")?;
                    let value = tokens.value("expires")?;
                    self.spec.expires = Some(bounded("expires", value, u32::MAX)?);
                }
                "realms" => {
                    self.restrict(Family::Inet, "realms")?;
                    let value = tokens.value("realms")?;
                    self.spec.realms = Some(get_realms(value).map_err(|_| invalid("realms", value))?);
                }
                "pref" => {
                    self.require(features.pref, "pref")?;
                    self.restrict(Family::Inet6, "pref")?;
                    let value = tokens.value("pref")?;
                    self.spec.pref = Some(router_pref(value)?);
                }
                "or" => self.alternate_gateway(tokens)?,
                "as" => return Err(ValidationError::Unsupported("as [to]")),
                _ => {
                    if !self.metric(word, tokens)? {
                        self.destination(word, tokens)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Metric clauses; returns false if `word` is not one.
    fn metric(&mut self, word: &str, tokens: &mut Tokens<'_>) -> ParseResult<bool> {
        let features = self.parser.features;
        let metrics = &mut self.spec.metrics;

        match word {
            "mtu" => metrics.mtu = Some(lockable(metrics, tokens, "mtu", rtax::MTU)?),
            "advmss" => metrics.advmss = Some(lockable(metrics, tokens, "advmss", rtax::ADVMSS)?),
            "reordering" => {
                metrics.reordering = Some(lockable(metrics, tokens, "reordering", rtax::REORDERING)?)
            }
            "cwnd" => metrics.cwnd = Some(lockable(metrics, tokens, "cwnd", rtax::CWND)?),
            "ssthresh" => {
                metrics.ssthresh = Some(lockable(metrics, tokens, "ssthresh", rtax::SSTHRESH)?)
            }
            "window" => {
                let value = tokens.value("window")?;
                metrics.window = Some(bounded("window", value, u32::MAX)?);
            }
            "initcwnd" => {
                let value = tokens.value("initcwnd")?;
                metrics.initcwnd = Some(bounded("initcwnd", value, u32::MAX)?);
            }
            "hoplimit" => {
                let value = tokens.value("hoplimit")?;
                metrics.hoplimit = Some(bounded("hoplimit", value, 255)?);
            }
            "initrwnd" => {
                self.require(features.initrwnd, "initrwnd")?;
                let value = tokens.value("initrwnd")?;
                self.spec.metrics.initrwnd = Some(bounded("initrwnd", value, u32::MAX)?);
            }
            "quickack" => {
                self.require(features.quickack, "quickack")?;
                let value = tokens.value("quickack")?;
                self.spec.metrics.quickack = Some(bounded("quickack", value, 1)?);
            }
            "rtt" => {
                let value = locked_value(metrics, tokens, "rtt", rtax::RTT)?;
                metrics.rtt = Some(rtt_units("rtt", value, 8)?);
            }
            "rttvar" => {
                let value = locked_value(metrics, tokens, "rttvar", rtax::RTTVAR)?;
                metrics.rttvar = Some(rtt_units("rttvar", value, 4)?);
            }
            "rto_min" => {
                let value = locked_value(metrics, tokens, "rto_min", rtax::RTO_MIN)?;
                let (ms, _) = get_time_rtt(value).map_err(|_| invalid("rto_min", value))?;
                metrics.rto_min = Some(ms);
            }
            "features" => {
                self.require(features.features, "features")?;
                let value = tokens.value("features")?;
                if value != "ecn" {
                    return Err(invalid("features", value));
                }
                let metrics = &mut self.spec.metrics;
                metrics.features = Some(metrics.features.unwrap_or(0) | rtax::FEATURE_ECN);
            }
            "congctl" => {
                self.require(features.congctl, "congctl")?;
                let value = locked_value(&mut self.spec.metrics, tokens, "congctl", rtax::CC_ALGO)?;
                self.spec.metrics.congctl = Some(value.to_string());
            }
            _ => return Ok(false),
        }

        Ok(true)
    }

    /// `[to] [TYPE] PREFIX|default`, entered with the first token consumed.
    fn destination<'a>(&mut self, word: &'a str, tokens: &mut Tokens<'a>) -> ParseResult<()> {
        let mut word = word;
        if word == "to" {
            word = tokens.value("to")?;
        }
        if let Some(kind) = self.resolver().resolve_route_type(word) {
            self.spec.route_type = Some(kind);
            word = tokens.value("destination")?;
        }

        let dst = if word == "default" {
            None
        } else {
            let dst: IpPrefix = word
                .parse()
                .map_err(|_| ValidationError::UnknownKeyword(word.to_string()))?;
            Some(dst)
        };
        if self.has_dst {
            return Err(ValidationError::Conflict("route has more than one destination"));
        }
        if let Some(dst) = dst {
            self.pin(dst.family(), "destination", word)?;
        }

        self.spec.dst = dst;
        self.has_dst = true;
        Ok(())
    }

    /// `via [inet|inet6] ADDR` after `via` has been consumed.
    fn gateway(&mut self, tokens: &mut Tokens<'_>, clause: &'static str) -> ParseResult<IpAddr> {
        let mut value = tokens.value(clause)?;
        let explicit = match value {
            "inet" => Some(Family::Inet),
            "inet6" => Some(Family::Inet6),
            _ => None,
        };
        if explicit.is_some() {
            value = tokens.value(clause)?;
        }

        let addr = address(clause, value)?;
        let family = Family::of(&addr);
        if explicit.is_some_and(|f| f != family) {
            return Err(ValidationError::FamilyMismatch {
                clause,
                value: value.to_string(),
            });
        }
        self.pin(family, clause, value)?;
        Ok(addr)
    }

    /// Legacy `via A or B`: a two-hop multipath route.
    fn alternate_gateway(&mut self, tokens: &mut Tokens<'_>) -> ParseResult<()> {
        warn!("\"or\" for routes is deprecated, use \"nexthop\"");
        let value = tokens.value("or")?;

        if !self.spec.nexthops.is_empty() {
            warn!(gateway = value, "\"or\" route already specified, ignoring");
            return Ok(());
        }

        let first = self
            .spec
            .via
            .take()
            .ok_or(ValidationError::Conflict("\"or\" requires a preceding via"))?;
        let second = address("or", value)?;
        self.pin(Family::of(&second), "or", value)?;

        self.spec.nexthops = vec![NextHopSpec::via(first), NextHopSpec::via(second)];
        Ok(())
    }

    /// One next hop, after its `nexthop` keyword.
    fn nexthop(&mut self, tokens: &mut Tokens<'_>) -> ParseResult<NextHopSpec> {
        let mut nexthop = NextHopSpec::default();

        while let Some(word) = tokens.peek() {
            match word {
                "via" => {
                    tokens.advance();
                    nexthop.via = Some(self.gateway(tokens, "via")?);
                }
                "dev" => {
                    tokens.advance();
                    let value = tokens.value("dev")?;
                    nexthop.oif = Some(self.interface(value)?);
                }
                "weight" => {
                    tokens.advance();
                    let value = tokens.value("weight")?;
                    let weight = bounded("weight", value, 256)?;
                    if weight == 0 {
                        return Err(invalid("weight", value));
                    }
                    nexthop.weight = u8::try_from(weight - 1).ok();
                }
                "onlink" => {
                    tokens.advance();
                    nexthop.onlink = true;
                }
                "realms" => {
                    tokens.advance();
                    self.restrict(Family::Inet, "realms")?;
                    let value = tokens.value("realms")?;
                    nexthop.realms = Some(get_realms(value).map_err(|_| invalid("realms", value))?);
                }
                "encap" => {
                    tokens.advance();
                    self.require(self.parser.features.encap, "encap")?;
                    nexthop.encap = Encapsulation::parse(tokens, self.resolver())?;
                }
                "as" => return Err(ValidationError::Unsupported("as [to]")),
                _ => break,
            }
        }

        Ok(nexthop)
    }

    fn interface(&self, name: &str) -> ParseResult<crate::names::Interface> {
        self.resolver()
            .resolve_interface(name)
            .ok_or_else(|| ValidationError::UnknownInterface(name.to_string()))
    }

    fn finish(mut self) -> ParseResult<RouteSpec> {
        if self.spec.via.is_some() && !self.spec.nexthops.is_empty() {
            return Err(ValidationError::Conflict(
                "route cannot have both via and nexthops",
            ));
        }
        self.spec.family = self.family.unwrap_or_default();
        Ok(self.spec)
    }
}

fn unknown(kind: &'static str, name: &str) -> ValidationError {
    ValidationError::UnknownName {
        kind,
        name: name.to_string(),
    }
}

fn address(clause: &'static str, value: &str) -> ParseResult<IpAddr> {
    value.parse().map_err(|_| invalid(clause, value))
}

fn prefix(clause: &'static str, value: &str) -> ParseResult<IpPrefix> {
    value.parse().map_err(|_| invalid(clause, value))
}

/// Unsigned number no larger than `max`.
fn bounded(clause: &'static str, value: &str, max: u32) -> ParseResult<u32> {
    let out_of_range = || ValidationError::OutOfRange {
        clause,
        value: value.to_string(),
        max: max.into(),
    };
    match get_u32(value) {
        Ok(n) if n <= max => Ok(n),
        Ok(_) | Err(ParseError::OutOfRange(_)) => Err(out_of_range()),
        Err(_) => Err(invalid(clause, value)),
    }
}

/// `[lock] VALUE` for a lockable metric; returns the raw value token.
fn locked_value<'a>(
    metrics: &mut super::RouteMetrics,
    tokens: &mut Tokens<'a>,
    clause: &'static str,
    kind: u16,
) -> ParseResult<&'a str> {
    if tokens.eat("lock") {
        metrics.set_locked(kind);
    }
    tokens.value(clause)
}

/// `[lock] N` for a lockable numeric metric.
fn lockable(
    metrics: &mut super::RouteMetrics,
    tokens: &mut Tokens<'_>,
    clause: &'static str,
    kind: u16,
) -> ParseResult<u32> {
    let value = locked_value(metrics, tokens, clause, kind)?;
    bounded(clause, value, u32::MAX)
}

/// rtt-style time: with a unit the value is in ms and is scaled to kernel
/// units; a bare number is already in kernel units.
fn rtt_units(clause: &'static str, value: &str, scale: u32) -> ParseResult<u32> {
    let (n, raw) = get_time_rtt(value).map_err(|_| invalid(clause, value))?;
    if raw {
        return Ok(n);
    }
    let max = u32::MAX / scale - 1;
    if n > max {
        return Err(ValidationError::OutOfRange {
            clause,
            value: value.to_string(),
            max: max.into(),
        });
    }
    Ok(n * scale)
}

fn router_pref(value: &str) -> ParseResult<u8> {
    match value {
        "low" => Ok(icmpv6_router_pref::LOW),
        "medium" => Ok(icmpv6_router_pref::MEDIUM),
        "high" => Ok(icmpv6_router_pref::HIGH),
        _ => get_u8(value).map_err(|_| invalid("pref", value)),
    }
}
