//! Root-cause classification for unreachable targets
//!
//! Address-form targets are checked for a route, an active interface and a
//! reachable default gateway. Name-form targets get DNS and hosts-file checks
//! first, then the interface and gateway checks.
//!
//! Remediation is gated on the structured gateway verdict
//! ([`Diagnosis::gateway_unreachable`]), never on finding text.

use crate::manifest::DiagnosisConfig;
use crate::network::{iface, Host};
use crate::sickbay::probe::Target;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// What a diagnosis entry inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Route,
    Interface,
    Gateway,
    Dns,
    HostsFile,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Route => write!(f, "ROUTE"),
            Category::Interface => write!(f, "INTERFACE"),
            Category::Gateway => write!(f, "GATEWAY"),
            Category::Dns => write!(f, "DNS"),
            Category::HostsFile => write!(f, "HOSTS_FILE"),
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisEntry {
    pub category: Category,
    /// The check passed
    pub verdict: bool,
    pub detail: String,
}

impl DiagnosisEntry {
    pub fn new(category: Category, verdict: bool, detail: impl Into<String>) -> Self {
        Self {
            category,
            verdict,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DiagnosisEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.verdict { "OK" } else { "FAIL" };
        write!(f, "{} {} {}", self.category, verdict, self.detail)
    }
}

/// Default gateway state observed during diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "address", rename_all = "snake_case")]
pub enum GatewayStatus {
    NotChecked,
    NotConfigured,
    Reachable(IpAddr),
    Unreachable(IpAddr),
}

/// Ordered findings for one failed target
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub target: Target,
    pub entries: Vec<DiagnosisEntry>,
    pub gateway: GatewayStatus,
}

impl Diagnosis {
    fn new(target: Target) -> Self {
        Self {
            target,
            entries: Vec::new(),
            gateway: GatewayStatus::NotChecked,
        }
    }

    /// Gateway-class failure: a gateway is configured but does not answer
    pub fn gateway_unreachable(&self) -> bool {
        matches!(self.gateway, GatewayStatus::Unreachable(_))
    }

    /// First entry of a category
    #[cfg(test)]
    pub fn entry(&self, category: Category) -> Option<&DiagnosisEntry> {
        self.entries.iter().find(|e| e.category == category)
    }

    #[cfg(test)]
    pub fn categories(&self) -> Vec<Category> {
        self.entries.iter().map(|e| e.category).collect()
    }
}

/// Classifies failures through a [`Host`]
pub struct Classifier<'a, H: Host + ?Sized> {
    host: &'a H,
    config: &'a DiagnosisConfig,
}

impl<'a, H: Host + ?Sized> Classifier<'a, H> {
    pub fn new(host: &'a H, config: &'a DiagnosisConfig) -> Self {
        Self { host, config }
    }

    /// Run every check for `target`, in order
    pub fn diagnose(&self, target: &Target) -> Diagnosis {
        let mut diagnosis = Diagnosis::new(target.clone());

        match target {
            Target::Address(addr) => {
                diagnosis.entries.push(self.check_route(*addr));
            }
            Target::Name(name) => {
                diagnosis.entries.push(self.check_dns(name));
                diagnosis.entries.push(self.check_hosts_file(name));
            }
        }

        diagnosis.entries.push(self.check_interfaces());

        let (entry, status) = self.check_gateway();
        diagnosis.entries.push(entry);
        diagnosis.gateway = status;

        diagnosis
    }

    fn check_route(&self, addr: IpAddr) -> DiagnosisEntry {
        match self.host.route_exists(addr) {
            Ok(true) => {
                DiagnosisEntry::new(Category::Route, true, format!("route to {} present", addr))
            }
            Ok(false) => {
                DiagnosisEntry::new(Category::Route, false, format!("no route to {}", addr))
            }
            Err(e) => DiagnosisEntry::new(
                Category::Route,
                false,
                format!("route lookup failed: {}", e),
            ),
        }
    }

    fn check_interfaces(&self) -> DiagnosisEntry {
        match self.host.interfaces() {
            Ok(interfaces) => {
                let up: Vec<&str> = iface::active(&interfaces).map(|i| i.name.as_str()).collect();
                if up.is_empty() {
                    DiagnosisEntry::new(Category::Interface, false, "no network interface is up")
                } else {
                    DiagnosisEntry::new(Category::Interface, true, format!("up: {}", up.join(", ")))
                }
            }
            Err(e) => DiagnosisEntry::new(
                Category::Interface,
                false,
                format!("interface listing failed: {}", e),
            ),
        }
    }

    fn check_gateway(&self) -> (DiagnosisEntry, GatewayStatus) {
        let gateway = match self.host.default_gateway() {
            Ok(Some(gw)) => gw,
            Ok(None) => {
                return (
                    DiagnosisEntry::new(Category::Gateway, false, "no gateway configured"),
                    GatewayStatus::NotConfigured,
                );
            }
            Err(e) => {
                return (
                    DiagnosisEntry::new(
                        Category::Gateway,
                        false,
                        format!("no gateway configured ({})", e),
                    ),
                    GatewayStatus::NotConfigured,
                );
            }
        };

        let address = gateway.address;
        let reply = self
            .host
            .ping(&address.to_string(), self.config.gateway_timeout_duration());

        if reply.success {
            (
                DiagnosisEntry::new(
                    Category::Gateway,
                    true,
                    format!("{} reachable via {}", address, gateway.iface),
                ),
                GatewayStatus::Reachable(address),
            )
        } else {
            (
                DiagnosisEntry::new(
                    Category::Gateway,
                    false,
                    format!("{} unreachable via {}", address, gateway.iface),
                ),
                GatewayStatus::Unreachable(address),
            )
        }
    }

    fn check_dns(&self, name: &str) -> DiagnosisEntry {
        let configured = self.host.nameservers();
        let configured = if configured.is_empty() {
            "none".to_string()
        } else {
            configured
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let timeout = self.config.dns_timeout_duration();
        let resolved_by = self
            .config
            .public_resolvers
            .iter()
            .find(|server| self.host.lookup_with(name, **server, timeout));

        match resolved_by {
            Some(server) => DiagnosisEntry::new(
                Category::Dns,
                true,
                format!("{} resolved via {} (nameservers: {})", name, server, configured),
            ),
            None => DiagnosisEntry::new(
                Category::Dns,
                false,
                format!(
                    "{} did not resolve via any public resolver (nameservers: {})",
                    name, configured
                ),
            ),
        }
    }

    fn check_hosts_file(&self, name: &str) -> DiagnosisEntry {
        if self.host.hosts_pinned(name) {
            DiagnosisEntry::new(Category::HostsFile, true, format!("{} pinned in hosts file", name))
        } else {
            DiagnosisEntry::new(Category::HostsFile, false, format!("{} not in hosts file", name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::fake::{FakeHost, GATEWAY};

    fn config() -> DiagnosisConfig {
        DiagnosisConfig::default()
    }

    #[test]
    fn test_address_target_checks_route_interface_gateway() {
        let host = FakeHost::offline();
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("10.255.255.1"));

        assert_eq!(
            diagnosis.categories(),
            vec![Category::Route, Category::Interface, Category::Gateway]
        );
        assert!(diagnosis.entry(Category::Route).unwrap().verdict);
        assert_eq!(diagnosis.entry(Category::Interface).unwrap().detail, "up: eth0");
        assert!(!diagnosis.entry(Category::Gateway).unwrap().verdict);
        assert!(diagnosis.gateway_unreachable());
        assert_eq!(diagnosis.gateway, GatewayStatus::Unreachable(GATEWAY.parse().unwrap()));
    }

    #[test]
    fn test_reachable_gateway_is_not_gateway_class() {
        let host = FakeHost::healthy();
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("10.255.255.1"));

        assert!(!diagnosis.gateway_unreachable());
        assert!(matches!(diagnosis.gateway, GatewayStatus::Reachable(_)));
    }

    #[test]
    fn test_missing_gateway_is_not_gateway_class() {
        let host = FakeHost::offline();
        *host.gateway.borrow_mut() = None;
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("10.255.255.1"));

        let entry = diagnosis.entry(Category::Gateway).unwrap();
        assert!(!entry.verdict);
        assert_eq!(entry.detail, "no gateway configured");
        assert_eq!(diagnosis.gateway, GatewayStatus::NotConfigured);
        assert!(!diagnosis.gateway_unreachable());
    }

    #[test]
    fn test_no_route_and_no_interface() {
        let host = FakeHost::offline();
        host.route.set(false);
        host.interfaces.borrow_mut().retain(|i| i.loopback);
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("10.255.255.1"));

        assert!(!diagnosis.entry(Category::Route).unwrap().verdict);
        let interface = diagnosis.entry(Category::Interface).unwrap();
        assert!(!interface.verdict);
        assert_eq!(interface.detail, "no network interface is up");
    }

    #[test]
    fn test_name_target_runs_dns_first() {
        let host = FakeHost::offline();
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("example.org"));

        assert_eq!(
            diagnosis.categories(),
            vec![
                Category::Dns,
                Category::HostsFile,
                Category::Interface,
                Category::Gateway
            ]
        );
        assert!(host.calls_matching("route").is_empty());
        let dns = diagnosis.entry(Category::Dns).unwrap();
        assert!(!dns.verdict);
        assert!(dns.detail.contains("nameservers: 192.168.1.1"));
        // Every public resolver was tried
        assert_eq!(host.calls_matching("lookup").len(), 3);
    }

    #[test]
    fn test_dns_first_success_short_circuits() {
        let host = FakeHost::healthy();
        let first = config().public_resolvers[0];
        host.answering_servers.borrow_mut().insert(first);
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("example.org"));

        let dns = diagnosis.entry(Category::Dns).unwrap();
        assert!(dns.verdict);
        assert!(dns.detail.contains(&format!("resolved via {}", first)));
        assert_eq!(
            host.calls_matching("lookup"),
            vec![format!("lookup example.org@{}", first)]
        );
    }

    #[test]
    fn test_dns_falls_back_to_later_resolver() {
        let host = FakeHost::offline();
        let config = config();
        let third = config.public_resolvers[2];
        host.answering_servers.borrow_mut().insert(third);
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("example.org"));

        assert!(diagnosis.entry(Category::Dns).unwrap().verdict);
        assert_eq!(host.calls_matching("lookup").len(), 3);
    }

    #[test]
    fn test_hosts_file_pinning() {
        let mut host = FakeHost::offline();
        host.pinned.push("nas.lan".into());
        let config = config();
        let classifier = Classifier::new(&host, &config);

        let diagnosis = classifier.diagnose(&Target::parse("nas.lan"));

        let entry = diagnosis.entry(Category::HostsFile).unwrap();
        assert!(entry.verdict);
        assert_eq!(entry.to_string(), "HOSTS_FILE OK nas.lan pinned in hosts file");
    }
}
