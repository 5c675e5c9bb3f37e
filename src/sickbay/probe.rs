//! Reachability probe with bounded retries
//!
//! Each attempt is a single ping; attempts stop at the first reply and are
//! separated by a fixed backoff.

use crate::network::{ping, Host};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::thread;
use std::time::Duration;

/// A monitored endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Literal network address
    Address(IpAddr),
    /// Hostname that needs resolving first
    Name(String),
}

impl Target {
    /// Classify a target identifier
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<IpAddr>() {
            Ok(addr) => Target::Address(addr),
            Err(_) => Target::Name(s.to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Address(addr) => write!(f, "{}", addr),
            Target::Name(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of probing one target in one cycle
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub target: Target,
    pub reachable: bool,
    /// Round-trip time of the successful attempt, when it could be parsed
    pub latency: Option<Duration>,
    /// Attempts made (at least 1)
    pub attempts: u32,
    pub attempts_failed: u32,
}

impl ProbeResult {
    /// Short human-readable outcome
    pub fn summary(&self) -> String {
        match (self.reachable, self.latency) {
            (true, Some(latency)) => format!(
                "{} reachable ({:.1}ms)",
                self.target,
                latency.as_secs_f64() * 1000.0
            ),
            (true, None) => format!("{} reachable (latency unavailable)", self.target),
            (false, _) => format!(
                "{} unreachable ({}/{} attempts failed)",
                self.target, self.attempts_failed, self.attempts
            ),
        }
    }
}

/// Runs reachability checks through a [`Host`]
pub struct Prober<'a, H: Host + ?Sized> {
    host: &'a H,
    backoff: Duration,
}

impl<'a, H: Host + ?Sized> Prober<'a, H> {
    pub fn new(host: &'a H, backoff: Duration) -> Self {
        Self { host, backoff }
    }

    /// Probe `target` up to `max_retries` times, each bounded by `timeout`
    pub fn check(&self, target: &Target, timeout: Duration, max_retries: u32) -> ProbeResult {
        let max_attempts = max_retries.max(1);
        let addr = target.to_string();
        let mut attempts_failed = 0;

        for attempt in 1..=max_attempts {
            let reply = self.host.ping(&addr, timeout);
            if reply.success {
                return ProbeResult {
                    target: target.clone(),
                    reachable: true,
                    latency: ping::parse_latency(&reply.output),
                    attempts: attempt,
                    attempts_failed,
                };
            }

            attempts_failed += 1;
            if attempt < max_attempts && !self.backoff.is_zero() {
                thread::sleep(self.backoff);
            }
        }

        ProbeResult {
            target: target.clone(),
            reachable: false,
            latency: None,
            attempts: max_attempts,
            attempts_failed,
        }
    }
}
