//! Verified, ordered auto-remediation
//!
//! One run takes the remediation lock, checks whether the network is
//! actually unhealthy, then applies corrective actions from least to most
//! invasive, re-verifying health after each and stopping at the first that
//! restores connectivity.

use crate::error::{Error, Result};
use crate::logbook::{Channel, Level, Logbook};
use crate::manifest::RemediationConfig;
use crate::network::{iface, Host, LeaseRenewal};
use crate::sickbay::lock::RemediationLock;
use crate::sickbay::state::{Phase, RemediationFlow};
use serde::Serialize;
use std::fmt;
use std::thread;
use tracing::debug;

/// Corrective action, in escalation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemediationAction {
    /// Renew the DHCP lease (or flush and cycle the link without a client)
    DhcpRenew,
    /// Cycle the primary interface, preserving its MTU
    InterfaceRestart,
    /// Rewrite the resolver configuration with known-good servers
    DnsFix,
}

impl RemediationAction {
    /// Canonical order of a remediation run
    pub const SEQUENCE: [RemediationAction; 3] = [
        RemediationAction::DhcpRenew,
        RemediationAction::InterfaceRestart,
        RemediationAction::DnsFix,
    ];
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationAction::DhcpRenew => write!(f, "dhcp-renew"),
            RemediationAction::InterfaceRestart => write!(f, "interface-restart"),
            RemediationAction::DnsFix => write!(f, "dns-fix"),
        }
    }
}

/// Composite network health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    /// Default gateway answered a ping
    pub gateway: bool,
    /// Well-known name resolved
    pub dns: bool,
    /// Well-known address answered a ping
    pub internet: bool,
}

impl HealthSnapshot {
    pub fn healthy(&self) -> bool {
        self.gateway && self.dns && self.internet
    }
}

impl fmt::Display for HealthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |ok: bool| if ok { "ok" } else { "fail" };
        write!(
            f,
            "gateway={} dns={} internet={}",
            mark(self.gateway),
            mark(self.dns),
            mark(self.internet)
        )
    }
}

/// Verified result of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// One executed action and its post-check
#[derive(Debug, Clone, Serialize)]
pub struct RemediationAttempt {
    pub action: RemediationAction,
    /// `Success` iff the post-check passed
    pub outcome: AttemptOutcome,
    pub post_check: HealthSnapshot,
    /// Soft failure while applying the action
    pub error: Option<String>,
}

/// How a remediation run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "action", rename_all = "snake_case")]
pub enum RemediationOutcome {
    /// Another run holds the lock; nothing was done
    AlreadyRunning,
    /// Precheck passed; nothing was done
    Healthy,
    /// An action restored connectivity
    Remediated(RemediationAction),
    /// Every action ran and the network is still down
    ManualInterventionRequired,
}

impl RemediationOutcome {
    /// Process exit code for a standalone run
    pub fn exit_code(&self) -> i32 {
        match self {
            RemediationOutcome::Healthy | RemediationOutcome::Remediated(_) => 0,
            RemediationOutcome::ManualInterventionRequired => 1,
            RemediationOutcome::AlreadyRunning => 2,
        }
    }
}

impl fmt::Display for RemediationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationOutcome::AlreadyRunning => write!(f, "already running"),
            RemediationOutcome::Healthy => write!(f, "healthy, no action taken"),
            RemediationOutcome::Remediated(action) => write!(f, "remediated by {}", action),
            RemediationOutcome::ManualInterventionRequired => {
                write!(f, "manual intervention required")
            }
        }
    }
}

/// Everything a remediation run did
#[derive(Debug, Clone, Serialize)]
pub struct RemediationReport {
    pub outcome: RemediationOutcome,
    pub precheck: Option<HealthSnapshot>,
    pub attempts: Vec<RemediationAttempt>,
}

/// Drives one remediation run against a [`Host`]
pub struct RemediationEngine<'a, H: Host + ?Sized> {
    host: &'a H,
    config: &'a RemediationConfig,
    logbook: &'a Logbook,
}

impl<'a, H: Host + ?Sized> RemediationEngine<'a, H> {
    pub fn new(host: &'a H, config: &'a RemediationConfig, logbook: &'a Logbook) -> Self {
        Self {
            host,
            config,
            logbook,
        }
    }

    /// Run the full sequence under the remediation lock
    pub fn run(&self) -> Result<RemediationReport> {
        let lock = match RemediationLock::acquire(&self.config.lock_file) {
            Ok(lock) => lock,
            Err(Error::RemediationInProgress(path)) => {
                let holder = RemediationLock::holder(&path)
                    .map(|pid| format!(" (pid {})", pid))
                    .unwrap_or_default();
                self.log(
                    Level::Error,
                    &format!("Remediation already running{}, exiting", holder),
                )?;
                return Ok(RemediationReport {
                    outcome: RemediationOutcome::AlreadyRunning,
                    precheck: None,
                    attempts: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        };
        debug!("Holding remediation lock {}", lock.path().display());

        let report = self.remediate()?;
        self.logbook.prune(Channel::Remediation)?;
        Ok(report)
    }

    fn remediate(&self) -> Result<RemediationReport> {
        let mut flow = RemediationFlow::new();
        transition(flow.begin())?;
        self.log(Level::Info, "Starting network remediation")?;

        let precheck = self.health_check();
        if precheck.healthy() {
            transition(flow.pass())?;
            self.log(Level::Info, "Network is healthy, no remediation needed")?;
            return Ok(RemediationReport {
                outcome: RemediationOutcome::Healthy,
                precheck: Some(precheck),
                attempts: Vec::new(),
            });
        }

        transition(flow.degrade())?;
        self.log(Level::Warn, &format!("Network unhealthy ({})", precheck))?;

        let iface = self.primary_interface();
        let mut attempts = Vec::with_capacity(RemediationAction::SEQUENCE.len());

        for action in RemediationAction::SEQUENCE {
            transition(flow.act())?;
            self.log(Level::Action, &format!("Attempting {}", action))?;

            let error = match self.apply(action, iface.as_deref()) {
                Ok(()) => None,
                Err(e) => {
                    self.log(Level::Warn, &format!("{} failed: {}", action, e))?;
                    Some(e.to_string())
                }
            };

            transition(flow.verify())?;
            let stabilization = self.config.stabilization_duration();
            if !stabilization.is_zero() {
                thread::sleep(stabilization);
            }

            let post_check = self.health_check();
            let outcome = if post_check.healthy() {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failure
            };
            attempts.push(RemediationAttempt {
                action,
                outcome,
                post_check,
                error,
            });

            if outcome == AttemptOutcome::Success {
                transition(flow.recover())?;
                debug_assert!(flow.phase().is_terminal());
                self.log(Level::Info, &format!("{} restored connectivity", action))?;
                return Ok(RemediationReport {
                    outcome: RemediationOutcome::Remediated(action),
                    precheck: Some(precheck),
                    attempts,
                });
            }

            self.log(
                Level::Warn,
                &format!("Network still unhealthy after {} ({})", action, post_check),
            )?;
        }

        transition(flow.exhaust())?;
        debug_assert!(flow.phase().is_terminal());
        debug_assert_eq!(flow.phase(), Phase::AllFailed);
        self.log(
            Level::Error,
            "All remediation attempts failed - manual intervention required",
        )?;

        Ok(RemediationReport {
            outcome: RemediationOutcome::ManualInterventionRequired,
            precheck: Some(precheck),
            attempts,
        })
    }

    /// Gateway reachable, well-known name resolves, well-known address answers
    pub fn health_check(&self) -> HealthSnapshot {
        let timeout = self.config.check_timeout_duration();

        let gateway = match self.host.default_gateway() {
            Ok(Some(gw)) => self.host.ping(&gw.address.to_string(), timeout).success,
            _ => false,
        };
        let dns = self.host.resolve(&self.config.dns_check_name);
        let internet = dns && self.host.ping(&self.config.internet_address, timeout).success;

        HealthSnapshot {
            gateway,
            dns,
            internet,
        }
    }

    /// Configured interface, else the default route's, else the first active one
    fn primary_interface(&self) -> Option<String> {
        if let Some(name) = &self.config.interface {
            return Some(name.clone());
        }
        if let Ok(Some(gw)) = self.host.default_gateway() {
            return Some(gw.iface);
        }
        let interfaces = self.host.interfaces().ok()?;
        let first = iface::active(&interfaces).next().map(|i| i.name.clone());
        first
    }

    fn apply(&self, action: RemediationAction, iface: Option<&str>) -> Result<()> {
        match action {
            RemediationAction::DhcpRenew => self.renew_lease(require(iface)?),
            RemediationAction::InterfaceRestart => self.restart_interface(require(iface)?),
            RemediationAction::DnsFix => self.fix_dns(),
        }
    }

    fn renew_lease(&self, iface: &str) -> Result<()> {
        match self.host.renew_lease(iface)? {
            LeaseRenewal::Renewed(client) => {
                self.log(Level::Action, &format!("Renewed DHCP lease on {} with {}", iface, client))
            }
            LeaseRenewal::Unavailable => {
                self.log(
                    Level::Warn,
                    &format!("No DHCP client available, flushing and cycling {}", iface),
                )?;
                self.host.flush_addresses(iface)?;
                self.cycle_link(iface)
            }
        }
    }

    fn restart_interface(&self, iface: &str) -> Result<()> {
        let mtu = match self.host.mtu(iface) {
            Ok(mtu) => Some(mtu),
            Err(e) => {
                self.log(Level::Warn, &format!("Could not read MTU of {}: {}", iface, e))?;
                None
            }
        };

        self.cycle_link(iface)?;

        if let Some(mtu) = mtu {
            self.host.set_mtu(iface, mtu)?;
            self.log(Level::Action, &format!("Restarted {} (MTU {} restored)", iface, mtu))
        } else {
            self.log(Level::Action, &format!("Restarted {}", iface))
        }
    }

    fn cycle_link(&self, iface: &str) -> Result<()> {
        self.host.set_link(iface, false)?;
        let pause = self.config.link_pause_duration();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
        self.host.set_link(iface, true)
    }

    fn fix_dns(&self) -> Result<()> {
        let backup = self.host.rewrite_resolver_config(
            &self.config.nameservers,
            self.config.resolver_timeout,
            self.config.resolver_attempts,
        )?;
        let servers: Vec<String> = self.config.nameservers.iter().map(|s| s.to_string()).collect();
        let backup = backup
            .map(|p| format!("backup at {}", p.display()))
            .unwrap_or_else(|| "no previous config".to_string());
        self.log(
            Level::Action,
            &format!("Resolver config set to {} ({})", servers.join(", "), backup),
        )
    }

    fn log(&self, level: Level, message: &str) -> Result<()> {
        self.logbook.remediation(level, message)
    }
}

fn require(iface: Option<&str>) -> Result<&str> {
    iface.ok_or_else(|| Error::InterfaceNotFound("primary".to_string()))
}

fn transition(result: std::result::Result<(), state_machines::DynamicError>) -> Result<()> {
    result.map_err(|e| Error::Transition(format!("{:?}", e)))
}
