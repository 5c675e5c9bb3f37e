//! Network interface enumeration and link control

use crate::error::{Error, Result};
use crate::network::{command, ioctl};
use nix::net::if_::InterfaceFlags;
use std::collections::BTreeMap;
use std::time::Duration;

/// A host network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    /// Administratively up
    pub up: bool,
    /// Operationally up (carrier present)
    pub running: bool,
    pub loopback: bool,
}

impl Interface {
    /// Up both administratively and operationally
    pub fn is_active(&self) -> bool {
        self.up && self.running
    }
}

/// List interfaces on the host, one entry per name
pub fn list() -> Result<Vec<Interface>> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|e| Error::Network(format!("getifaddrs failed: {}", e)))?;

    // getifaddrs yields one entry per address; merge by name
    let mut by_name: BTreeMap<String, InterfaceFlags> = BTreeMap::new();
    for addr in addrs {
        *by_name
            .entry(addr.interface_name)
            .or_insert_with(InterfaceFlags::empty) |= addr.flags;
    }

    Ok(by_name
        .into_iter()
        .map(|(name, flags)| Interface {
            name,
            up: flags.contains(InterfaceFlags::IFF_UP),
            running: flags.contains(InterfaceFlags::IFF_RUNNING),
            loopback: flags.contains(InterfaceFlags::IFF_LOOPBACK),
        })
        .collect())
}

/// Non-loopback interfaces that are up
pub fn active(interfaces: &[Interface]) -> impl Iterator<Item = &Interface> {
    interfaces.iter().filter(|i| !i.loopback && i.is_active())
}

/// Bring a link up or down
pub fn set_link(name: &str, up: bool) -> Result<()> {
    ioctl::set_interface_up(name, up)
}

pub fn mtu(name: &str) -> Result<u32> {
    ioctl::interface_mtu(name)
}

pub fn set_mtu(name: &str, mtu: u32) -> Result<()> {
    ioctl::set_interface_mtu(name, mtu)
}

/// Remove every address from an interface
pub fn flush_addresses(name: &str, timeout: Duration) -> Result<()> {
    command::run_checked("ip", &["addr", "flush", "dev", name], timeout)?;
    Ok(())
}
