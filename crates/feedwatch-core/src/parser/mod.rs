//! Feed entry parser
//!
//! Turns raw feed text into normalized address identities. Feeds are
//! newline-delimited lists of IP addresses or CIDR blocks; `#` starts a
//! comment line and blank lines are ignored.
//!
//! The parser is deliberately lenient: a line that classifies as none of
//! the supported forms is silently dropped, never an error. Deduplication
//! is the caller's job; the parser preserves input order and duplicates.

use ipnet::{Ipv4Net, Ipv6Net};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A normalized network identity parsed from one feed line
///
/// Networks are normalized to their true network address (host bits masked
/// off), so `10.0.0.1/8` and `10.0.0.0/8` compare equal. Equality and
/// hashing follow the canonical string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressIdentity {
    /// Single IPv4 host address
    V4Host(Ipv4Addr),
    /// IPv4 network in CIDR notation
    V4Net(Ipv4Net),
    /// Single IPv6 host address
    V6Host(Ipv6Addr),
    /// IPv6 network in CIDR notation
    V6Net(Ipv6Net),
}

impl AddressIdentity {
    /// The canonical string form, used as the state-store map key
    pub fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AddressIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressIdentity::V4Host(addr) => addr.fmt(f),
            AddressIdentity::V4Net(net) => net.fmt(f),
            AddressIdentity::V6Host(addr) => addr.fmt(f),
            AddressIdentity::V6Net(net) => net.fmt(f),
        }
    }
}

/// Parse a single feed line into an address identity
///
/// Returns `None` for blank lines, `#` comments, and anything that fails
/// to classify. Classification precedence: IPv4 CIDR, IPv4 host, IPv6
/// CIDR, IPv6 host; the first successful classification wins.
pub fn parse_line(line: &str) -> Option<AddressIdentity> {
    let line = line.trim();

    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if let Ok(net) = line.parse::<Ipv4Net>() {
        return Some(AddressIdentity::V4Net(net.trunc()));
    }
    if let Ok(addr) = line.parse::<Ipv4Addr>() {
        return Some(AddressIdentity::V4Host(addr));
    }
    if let Ok(net) = line.parse::<Ipv6Net>() {
        return Some(AddressIdentity::V6Net(net.trunc()));
    }
    if let Ok(addr) = line.parse::<Ipv6Addr>() {
        return Some(AddressIdentity::V6Host(addr));
    }

    None
}

/// Parse a whole feed document lazily, in input order
///
/// The returned iterator is finite and restartable (call again to restart).
/// Unparseable lines are skipped; duplicates are not removed.
pub fn parse_feed(text: &str) -> impl Iterator<Item = AddressIdentity> + '_ {
    text.lines().filter_map(parse_line)
}
