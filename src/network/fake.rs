//! Scripted [`Host`] for exercising the decision engine without a network

use super::{Gateway, Host, Interface, LeaseRenewal, PingReply};
use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const GATEWAY: &str = "192.168.1.1";
pub const INTERNET: &str = "8.8.8.8";

/// Mutating call after which the fake network comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealsOn {
    RenewLease,
    LinkUp,
    ResolverRewrite,
}

pub struct FakeHost {
    /// Targets answering every ping
    pub reachable: RefCell<HashSet<String>>,
    /// Per-target ping outcomes consumed before `reachable` is consulted
    pub ping_script: RefCell<HashMap<String, VecDeque<bool>>>,
    pub route: Cell<bool>,
    pub interfaces: RefCell<Vec<Interface>>,
    pub gateway: RefCell<Option<Gateway>>,
    pub nameservers: Vec<IpAddr>,
    /// Servers that answer lookups for any name
    pub answering_servers: RefCell<HashSet<IpAddr>>,
    pub system_resolves: Cell<bool>,
    pub pinned: Vec<String>,
    pub lease: RefCell<Result<LeaseRenewal>>,
    pub mtu: Cell<u32>,
    pub heals_on: Cell<Option<HealsOn>>,
    /// Every call in order, e.g. `ping 8.8.8.8`, `link eth0 down`
    pub calls: RefCell<Vec<String>>,
}

impl FakeHost {
    /// Gateway and internet reachable, names resolve
    pub fn healthy() -> Self {
        let host = Self::offline();
        host.heal();
        host
    }

    /// Gateway configured on eth0, nothing answers
    pub fn offline() -> Self {
        Self {
            reachable: RefCell::new(HashSet::new()),
            ping_script: RefCell::new(HashMap::new()),
            route: Cell::new(true),
            interfaces: RefCell::new(vec![
                Interface {
                    name: "lo".into(),
                    up: true,
                    running: true,
                    loopback: true,
                },
                Interface {
                    name: "eth0".into(),
                    up: true,
                    running: true,
                    loopback: false,
                },
            ]),
            gateway: RefCell::new(Some(Gateway {
                address: GATEWAY.parse().unwrap(),
                iface: "eth0".into(),
            })),
            nameservers: vec!["192.168.1.1".parse().unwrap()],
            answering_servers: RefCell::new(HashSet::new()),
            system_resolves: Cell::new(false),
            pinned: Vec::new(),
            lease: RefCell::new(Ok(LeaseRenewal::Renewed("dhclient"))),
            mtu: Cell::new(1500),
            heals_on: Cell::new(None),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Make the gateway and the internet reachable
    pub fn heal(&self) {
        let mut reachable = self.reachable.borrow_mut();
        reachable.insert(GATEWAY.to_string());
        reachable.insert(INTERNET.to_string());
        self.system_resolves.set(true);
    }

    pub fn with_heals_on(self, trigger: HealsOn) -> Self {
        self.heals_on.set(Some(trigger));
        self
    }

    pub fn script_ping(&self, target: &str, outcomes: &[bool]) {
        self.ping_script
            .borrow_mut()
            .insert(target.to_string(), outcomes.iter().copied().collect());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls starting with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn trigger(&self, event: HealsOn) {
        if self.heals_on.get() == Some(event) {
            self.heal();
        }
    }
}

impl Host for FakeHost {
    fn ping(&self, target: &str, _timeout: Duration) -> PingReply {
        self.record(format!("ping {}", target));
        let scripted = self
            .ping_script
            .borrow_mut()
            .get_mut(target)
            .and_then(|q| q.pop_front());
        let success = scripted.unwrap_or_else(|| self.reachable.borrow().contains(target));
        if success {
            PingReply::new(
                true,
                format!("64 bytes from {}: icmp_seq=1 ttl=57 time=12.4 ms", target),
            )
        } else {
            PingReply::new(false, "1 packets transmitted, 0 received, 100% packet loss")
        }
    }

    fn route_exists(&self, addr: IpAddr) -> Result<bool> {
        self.record(format!("route {}", addr));
        Ok(self.route.get())
    }

    fn interfaces(&self) -> Result<Vec<Interface>> {
        self.record("interfaces".into());
        Ok(self.interfaces.borrow().clone())
    }

    fn default_gateway(&self) -> Result<Option<Gateway>> {
        self.record("gateway".into());
        Ok(self.gateway.borrow().clone())
    }

    fn nameservers(&self) -> Vec<IpAddr> {
        self.record("nameservers".into());
        self.nameservers.clone()
    }

    fn lookup_with(&self, name: &str, server: IpAddr, _timeout: Duration) -> bool {
        self.record(format!("lookup {}@{}", name, server));
        self.answering_servers.borrow().contains(&server)
    }

    fn resolve(&self, name: &str) -> bool {
        self.record(format!("resolve {}", name));
        self.system_resolves.get()
    }

    fn hosts_pinned(&self, name: &str) -> bool {
        self.record(format!("hosts {}", name));
        self.pinned.iter().any(|p| p == name)
    }

    fn renew_lease(&self, iface: &str) -> Result<LeaseRenewal> {
        self.record(format!("renew {}", iface));
        let result = match &*self.lease.borrow() {
            Ok(renewal) => Ok(renewal.clone()),
            Err(e) => Err(Error::Network(e.to_string())),
        };
        if matches!(result, Ok(LeaseRenewal::Renewed(_))) {
            self.trigger(HealsOn::RenewLease);
        }
        result
    }

    fn flush_addresses(&self, iface: &str) -> Result<()> {
        self.record(format!("flush {}", iface));
        Ok(())
    }

    fn set_link(&self, iface: &str, up: bool) -> Result<()> {
        self.record(format!("link {} {}", iface, if up { "up" } else { "down" }));
        if !self.interfaces.borrow().iter().any(|i| i.name == iface) {
            return Err(Error::InterfaceNotFound(iface.to_string()));
        }
        if up {
            self.trigger(HealsOn::LinkUp);
        }
        Ok(())
    }

    fn mtu(&self, iface: &str) -> Result<u32> {
        self.record(format!("mtu {}", iface));
        Ok(self.mtu.get())
    }

    fn set_mtu(&self, iface: &str, mtu: u32) -> Result<()> {
        self.record(format!("set_mtu {} {}", iface, mtu));
        self.mtu.set(mtu);
        Ok(())
    }

    fn rewrite_resolver_config(
        &self,
        servers: &[IpAddr],
        timeout_secs: u32,
        attempts: u32,
    ) -> Result<Option<PathBuf>> {
        let servers: Vec<String> = servers.iter().map(|s| s.to_string()).collect();
        self.record(format!(
            "resolver {} timeout:{} attempts:{}",
            servers.join(","),
            timeout_secs,
            attempts
        ));
        self.trigger(HealsOn::ResolverRewrite);
        Ok(Some(PathBuf::from("/etc/resolv.conf.backup.test")))
    }
}
