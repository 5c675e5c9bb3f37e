//! Kernel routing table lookup
//!
//! Provides:
//! - Parsing of the Linux IPv4 routing table (`/proc/net/route`)
//! - Longest-prefix route lookup for a destination
//! - Default gateway and its interface

use crate::error::{Error, Result};
use ipnet::Ipv4Net;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

/// Route is usable
const RTF_UP: u16 = 0x0001;
/// Route goes through a gateway
const RTF_GATEWAY: u16 = 0x0002;

/// A single IPv4 route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Outgoing interface
    pub iface: String,
    /// Destination network
    pub destination: Ipv4Net,
    /// Next hop, if the route goes through a gateway
    pub gateway: Option<Ipv4Addr>,
    pub metric: u32,
}

impl Route {
    /// Whether this is a default route (0.0.0.0/0)
    pub fn is_default(&self) -> bool {
        self.destination.prefix_len() == 0
    }
}

/// Default gateway and the interface it is reached through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub address: IpAddr,
    pub iface: String,
}

/// Parsed IPv4 routing table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Read and parse a routing table file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Network(format!("Failed to read routing table {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse `/proc/net/route` content
    ///
    /// Addresses are little-endian hex words. Lines that are malformed or
    /// describe routes that are not up are skipped.
    pub fn parse(content: &str) -> Self {
        let routes = content
            .lines()
            .skip(1) // header
            .filter_map(parse_route_line)
            .collect();
        Self { routes }
    }

    /// All usable routes
    #[cfg(test)]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Longest-prefix match for a destination (lowest metric breaks ties)
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|r| r.destination.contains(&addr))
            .max_by(|a, b| {
                a.destination
                    .prefix_len()
                    .cmp(&b.destination.prefix_len())
                    .then(b.metric.cmp(&a.metric))
            })
    }

    /// Preferred default route (lowest metric)
    pub fn default_route(&self) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|r| r.is_default() && r.gateway.is_some())
            .min_by_key(|r| r.metric)
    }

    /// Default gateway, if one is configured
    pub fn default_gateway(&self) -> Option<Gateway> {
        self.default_route().and_then(|r| {
            r.gateway.map(|gw| Gateway {
                address: IpAddr::V4(gw),
                iface: r.iface.clone(),
            })
        })
    }
}

fn parse_route_line(line: &str) -> Option<Route> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 8 {
        return None;
    }

    let flags = u16::from_str_radix(fields[3], 16).ok()?;
    if flags & RTF_UP == 0 {
        return None;
    }

    let destination = parse_hex_addr(fields[1])?;
    let gateway = parse_hex_addr(fields[2])?;
    let metric = fields[6].parse().ok()?;
    let mask = parse_hex_addr(fields[7])?;

    let prefix = u32::from(mask).count_ones() as u8;
    let destination = Ipv4Net::new(destination, prefix).ok()?.trunc();

    Some(Route {
        iface: fields[0].to_string(),
        destination,
        gateway: (flags & RTF_GATEWAY != 0).then_some(gateway),
        metric,
    })
}

fn parse_hex_addr(field: &str) -> Option<Ipv4Addr> {
    let value = u32::from_str_radix(field, 16).ok()?;
    Some(Ipv4Addr::from(value.to_le_bytes()))
}
