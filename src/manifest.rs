//! Configuration file parsing for Lookout
//!
//! Parses `lookout.toml` configuration files using serde. Every section is
//! optional; missing values fall back to the built-in defaults.

use crate::error::{Error, Result};
use crate::flapping::StrategyKind;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lookout/lookout.toml";

/// Load configuration from a file
pub fn load(path: &Path) -> Result<LookoutConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: LookoutConfig = toml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Load configuration, using defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<LookoutConfig> {
    if path.exists() {
        load(path)
    } else {
        Ok(LookoutConfig::default())
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookoutConfig {
    /// Targets checked when none are given on the command line
    pub targets: Vec<String>,
    pub probe: ProbeConfig,
    pub diagnosis: DiagnosisConfig,
    pub remediation: RemediationConfig,
    pub logbook: LogbookConfig,
    pub flapping: FlappingConfig,
    pub host: HostConfig,
}

impl Default for LookoutConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            probe: ProbeConfig::default(),
            diagnosis: DiagnosisConfig::default(),
            remediation: RemediationConfig::default(),
            logbook: LogbookConfig::default(),
            flapping: FlappingConfig::default(),
            host: HostConfig::default(),
        }
    }
}

impl LookoutConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.targets.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::ConfigValidation(
                "Empty target in target list".into(),
            ));
        }

        if self.diagnosis.public_resolvers.is_empty() {
            return Err(Error::ConfigValidation(
                "diagnosis.public_resolvers must not be empty".into(),
            ));
        }

        if self.remediation.nameservers.is_empty() {
            return Err(Error::ConfigValidation(
                "remediation.nameservers must not be empty".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.flapping.probability) {
            return Err(Error::ConfigValidation(format!(
                "flapping.probability must be within 0.0..=1.0, got {}",
                self.flapping.probability
            )));
        }

        if self.flapping.window == 0 {
            return Err(Error::ConfigValidation(
                "flapping.window must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn default_targets() -> Vec<String> {
    vec!["8.8.8.8".into(), "1.1.1.1".into(), "google.com".into()]
}

/// Reachability probe settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Per-attempt timeout (seconds)
    #[serde(default = "default_probe_timeout")]
    pub timeout: u64,

    /// Attempts per target before it is reported down
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between failed attempts (seconds)
    #[serde(default = "default_backoff")]
    pub backoff: u64,
}

impl ProbeConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn backoff_duration(&self) -> Duration {
        Duration::from_secs(self.backoff)
    }
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff() -> u64 {
    1
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: default_probe_timeout(),
            max_retries: default_max_retries(),
            backoff: default_backoff(),
        }
    }
}

/// Root-cause classifier settings
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisConfig {
    /// Public resolvers tried in order for name-form targets
    #[serde(default = "default_public_resolvers")]
    pub public_resolvers: Vec<IpAddr>,

    /// Timeout for the single gateway ping (seconds)
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout: u64,

    /// Timeout for each resolver lookup (seconds)
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout: u64,
}

impl DiagnosisConfig {
    pub fn gateway_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout)
    }

    pub fn dns_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.dns_timeout)
    }
}

fn default_public_resolvers() -> Vec<IpAddr> {
    ["8.8.8.8", "1.1.1.1", "9.9.9.9"]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn default_gateway_timeout() -> u64 {
    2
}

fn default_dns_timeout() -> u64 {
    2
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            public_resolvers: default_public_resolvers(),
            gateway_timeout: default_gateway_timeout(),
            dns_timeout: default_dns_timeout(),
        }
    }
}

/// Auto-remediation settings
#[derive(Debug, Clone, Deserialize)]
pub struct RemediationConfig {
    /// Enable auto-remediation on gateway-class failures
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Token file guarding against concurrent remediation
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Wait after each action before re-verifying (seconds)
    #[serde(default = "default_stabilization")]
    pub stabilization: u64,

    /// Pause between bringing a link down and up again (seconds)
    #[serde(default = "default_link_pause")]
    pub link_pause: u64,

    /// Interface to act on (defaults to the default route's interface)
    pub interface: Option<String>,

    /// Known-good resolvers written by the DNS fix
    #[serde(default = "default_nameservers")]
    pub nameservers: Vec<IpAddr>,

    /// `options timeout:` written by the DNS fix
    #[serde(default = "default_resolver_timeout")]
    pub resolver_timeout: u32,

    /// `options attempts:` written by the DNS fix
    #[serde(default = "default_resolver_attempts")]
    pub resolver_attempts: u32,

    /// Well-known name resolved by the internet check
    #[serde(default = "default_dns_check_name")]
    pub dns_check_name: String,

    /// Well-known address pinged by the internet check
    #[serde(default = "default_internet_address")]
    pub internet_address: String,

    /// Ping timeout used by health checks (seconds)
    #[serde(default = "default_check_timeout")]
    pub check_timeout: u64,
}

impl RemediationConfig {
    pub fn stabilization_duration(&self) -> Duration {
        Duration::from_secs(self.stabilization)
    }

    pub fn link_pause_duration(&self) -> Duration {
        Duration::from_secs(self.link_pause)
    }

    pub fn check_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.check_timeout)
    }
}

fn default_true() -> bool {
    true
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("/run/lookout/remediation.lock")
}

fn default_stabilization() -> u64 {
    5
}

fn default_link_pause() -> u64 {
    2
}

fn default_nameservers() -> Vec<IpAddr> {
    ["8.8.8.8", "8.8.4.4", "1.1.1.1"]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn default_resolver_timeout() -> u32 {
    2
}

fn default_resolver_attempts() -> u32 {
    3
}

fn default_dns_check_name() -> String {
    "google.com".to_string()
}

fn default_internet_address() -> String {
    "8.8.8.8".to_string()
}

fn default_check_timeout() -> u64 {
    2
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            lock_file: default_lock_file(),
            stabilization: default_stabilization(),
            link_pause: default_link_pause(),
            interface: None,
            nameservers: default_nameservers(),
            resolver_timeout: default_resolver_timeout(),
            resolver_attempts: default_resolver_attempts(),
            dns_check_name: default_dns_check_name(),
            internet_address: default_internet_address(),
            check_timeout: default_check_timeout(),
        }
    }
}

/// Daily log files and their retention
#[derive(Debug, Clone, Deserialize)]
pub struct LogbookConfig {
    /// Directory holding the daily logs
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Days to keep alert logs
    #[serde(default = "default_alert_retention")]
    pub alert_retention: i64,

    /// Days to keep diagnosis logs
    #[serde(default = "default_diagnosis_retention")]
    pub diagnosis_retention: i64,

    /// Days to keep remediation logs
    #[serde(default = "default_remediation_retention")]
    pub remediation_retention: i64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/lookout")
}

fn default_alert_retention() -> i64 {
    2
}

fn default_diagnosis_retention() -> i64 {
    3
}

fn default_remediation_retention() -> i64 {
    7
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            alert_retention: default_alert_retention(),
            diagnosis_retention: default_diagnosis_retention(),
            remediation_retention: default_remediation_retention(),
        }
    }
}

/// Synthetic failure injection
#[derive(Debug, Clone, Deserialize)]
pub struct FlappingConfig {
    /// Active strategy (none disables injection)
    pub strategy: Option<StrategyKind>,

    /// Bucket width for the time-window strategy (seconds)
    #[serde(default = "default_window")]
    pub window: u64,

    /// Injection probability for the random strategy
    #[serde(default = "default_probability")]
    pub probability: f64,

    /// Seed for the random strategy (unseeded when absent)
    pub seed: Option<u64>,

    /// State file for the persistent strategy
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Always-unreachable target appended when injecting
    #[serde(default = "default_failure_target")]
    pub failure_target: String,
}

fn default_window() -> u64 {
    300
}

fn default_probability() -> f64 {
    0.35
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/lookout/flapping.state")
}

fn default_failure_target() -> String {
    "10.255.255.1".to_string()
}

impl Default for FlappingConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            window: default_window(),
            probability: default_probability(),
            seed: None,
            state_file: default_state_file(),
            failure_target: default_failure_target(),
        }
    }
}

/// Host files and command limits used by the system primitives
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_resolv_conf")]
    pub resolv_conf: PathBuf,

    #[serde(default = "default_hosts_file")]
    pub hosts_file: PathBuf,

    /// IPv4 routing table
    #[serde(default = "default_route_table")]
    pub route_table: PathBuf,

    /// Upper bound for helper commands such as `dhclient` (seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
}

impl HostConfig {
    pub fn command_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

fn default_resolv_conf() -> PathBuf {
    PathBuf::from("/etc/resolv.conf")
}

fn default_hosts_file() -> PathBuf {
    PathBuf::from("/etc/hosts")
}

fn default_route_table() -> PathBuf {
    PathBuf::from("/proc/net/route")
}

fn default_command_timeout() -> u64 {
    30
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            resolv_conf: default_resolv_conf(),
            hosts_file: default_hosts_file(),
            route_table: default_route_table(),
            command_timeout: default_command_timeout(),
        }
    }
}
