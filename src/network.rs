//! Host networking primitives
//!
//! Provides:
//! - Route table lookup and default gateway discovery
//! - Interface listing, link up/down and MTU control
//! - Single-packet ping with timeout
//! - DNS lookups against explicit servers, resolver config and hosts file
//! - DHCP lease renewal
//!
//! The decision engine only talks to the host through the [`Host`] trait.

pub mod command;
pub mod dhcp;
pub mod dns;
pub mod iface;
pub mod ioctl;
pub mod ping;
pub mod route;

#[cfg(test)]
pub mod fake;

pub use dhcp::LeaseRenewal;
pub use iface::Interface;
pub use ping::PingReply;
pub use route::Gateway;

use crate::error::Result;
use crate::manifest::HostConfig;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// System networking operations consumed by probes, diagnosis and remediation
pub trait Host {
    /// Send a single echo request
    fn ping(&self, target: &str, timeout: Duration) -> PingReply;

    /// Whether the routing table has any route covering `addr`
    fn route_exists(&self, addr: IpAddr) -> Result<bool>;

    fn interfaces(&self) -> Result<Vec<Interface>>;

    fn default_gateway(&self) -> Result<Option<Gateway>>;

    /// Nameservers from the resolver configuration
    fn nameservers(&self) -> Vec<IpAddr>;

    /// Resolve `name` against one specific server
    fn lookup_with(&self, name: &str, server: IpAddr, timeout: Duration) -> bool;

    /// Resolve `name` through the system resolver
    fn resolve(&self, name: &str) -> bool;

    /// Whether `name` is pinned in the hosts database
    fn hosts_pinned(&self, name: &str) -> bool;

    fn renew_lease(&self, iface: &str) -> Result<LeaseRenewal>;

    fn flush_addresses(&self, iface: &str) -> Result<()>;

    fn set_link(&self, iface: &str, up: bool) -> Result<()>;

    fn mtu(&self, iface: &str) -> Result<u32>;

    fn set_mtu(&self, iface: &str, mtu: u32) -> Result<()>;

    /// Back up and overwrite the resolver configuration; returns the backup path
    fn rewrite_resolver_config(
        &self,
        servers: &[IpAddr],
        timeout_secs: u32,
        attempts: u32,
    ) -> Result<Option<PathBuf>>;
}

/// [`Host`] backed by the running system
#[derive(Debug, Clone)]
pub struct SystemHost {
    paths: HostConfig,
}

impl SystemHost {
    pub fn new(paths: HostConfig) -> Self {
        Self { paths }
    }
}

impl Host for SystemHost {
    fn ping(&self, target: &str, timeout: Duration) -> PingReply {
        ping::ping_once(target, timeout)
    }

    fn route_exists(&self, addr: IpAddr) -> Result<bool> {
        match addr {
            IpAddr::V4(v4) => {
                let table = route::RouteTable::load(&self.paths.route_table)?;
                Ok(table.lookup(v4).is_some())
            }
            IpAddr::V6(_) => {
                let addr = addr.to_string();
                let output = command::run(
                    "ip",
                    &["-6", "route", "get", addr.as_str()],
                    self.paths.command_timeout_duration(),
                )?;
                Ok(output.success)
            }
        }
    }

    fn interfaces(&self) -> Result<Vec<Interface>> {
        iface::list()
    }

    fn default_gateway(&self) -> Result<Option<Gateway>> {
        let table = route::RouteTable::load(&self.paths.route_table)?;
        Ok(table.default_gateway())
    }

    fn nameservers(&self) -> Vec<IpAddr> {
        dns::nameservers(&self.paths.resolv_conf)
    }

    fn lookup_with(&self, name: &str, server: IpAddr, timeout: Duration) -> bool {
        dns::lookup_with(name, server, timeout)
    }

    fn resolve(&self, name: &str) -> bool {
        dns::resolve(name)
    }

    fn hosts_pinned(&self, name: &str) -> bool {
        std::fs::read_to_string(&self.paths.hosts_file)
            .map(|content| dns::is_pinned(&content, name))
            .unwrap_or(false)
    }

    fn renew_lease(&self, iface: &str) -> Result<LeaseRenewal> {
        dhcp::renew(iface, self.paths.command_timeout_duration())
    }

    fn flush_addresses(&self, iface: &str) -> Result<()> {
        iface::flush_addresses(iface, self.paths.command_timeout_duration())
    }

    fn set_link(&self, iface: &str, up: bool) -> Result<()> {
        iface::set_link(iface, up)
    }

    fn mtu(&self, iface: &str) -> Result<u32> {
        iface::mtu(iface)
    }

    fn set_mtu(&self, iface: &str, mtu: u32) -> Result<()> {
        iface::set_mtu(iface, mtu)
    }

    fn rewrite_resolver_config(
        &self,
        servers: &[IpAddr],
        timeout_secs: u32,
        attempts: u32,
    ) -> Result<Option<PathBuf>> {
        dns::rewrite_resolver_config(
            &self.paths.resolv_conf,
            servers,
            timeout_secs,
            attempts,
            chrono::Local::now().naive_local(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn host_with_files(dir: &std::path::Path) -> SystemHost {
        let paths = HostConfig {
            resolv_conf: dir.join("resolv.conf"),
            hosts_file: dir.join("hosts"),
            route_table: dir.join("route"),
            command_timeout: 5,
        };
        SystemHost::new(paths)
    }

    #[test]
    fn test_system_host_reads_configured_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("resolv.conf"), "nameserver 10.0.0.1\n").unwrap();
        fs::write(dir.path().join("hosts"), "10.0.0.5 nas.lan\n").unwrap();
        fs::write(
            dir.path().join("route"),
            "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\n\
             eth0\t00000000\t0100000A\t0003\t0\t0\t100\t00000000\n",
        )
        .unwrap();

        let host = host_with_files(dir.path());
        assert_eq!(host.nameservers(), vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
        assert!(host.hosts_pinned("nas.lan"));
        assert!(!host.hosts_pinned("printer.lan"));
        assert!(host.route_exists("203.0.113.9".parse().unwrap()).unwrap());

        let gw = host.default_gateway().unwrap().unwrap();
        assert_eq!(gw.address, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(gw.iface, "eth0");
    }

    #[test]
    fn test_system_host_missing_route_table() {
        let dir = tempfile::tempdir().unwrap();
        let host = host_with_files(dir.path());
        assert!(host.default_gateway().is_err());
        assert!(host.nameservers().is_empty());
    }
}
