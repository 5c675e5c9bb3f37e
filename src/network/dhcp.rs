//! DHCP lease renewal through whichever client is installed

use crate::error::Result;
use crate::network::command;
use std::time::Duration;

/// Result of asking the host to renew its lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseRenewal {
    /// Lease renewed with the named client
    Renewed(&'static str),
    /// No DHCP client is installed
    Unavailable,
}

/// Known clients, in order of preference
const CLIENTS: &[&str] = &["dhclient", "dhcpcd"];

/// Renew the DHCP lease on `iface`
pub fn renew(iface: &str, timeout: Duration) -> Result<LeaseRenewal> {
    let Some(client) = CLIENTS.iter().copied().find(|c| command::tool_available(c)) else {
        return Ok(LeaseRenewal::Unavailable);
    };

    match client {
        "dhclient" => {
            // Release first; a stale lease makes dhclient exit early
            command::run_checked("dhclient", &["-r", iface], timeout)?;
            command::run_checked("dhclient", &[iface], timeout)?;
        }
        _ => {
            command::run_checked(client, &["-n", iface], timeout)?;
        }
    }

    Ok(LeaseRenewal::Renewed(client))
}
