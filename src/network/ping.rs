//! Single-packet ICMP reachability test
//!
//! Wraps the system `ping` binary (one echo request, bounded wait) and
//! extracts the round-trip time from its output.

use crate::network::command;
use std::time::Duration;

/// Outcome of one ping attempt
#[derive(Debug, Clone, Default)]
pub struct PingReply {
    /// An echo reply came back
    pub success: bool,
    /// Raw tool output (or the error that prevented running it)
    pub output: String,
}

impl PingReply {
    pub fn new(success: bool, output: impl Into<String>) -> Self {
        Self {
            success,
            output: output.into(),
        }
    }
}

/// Send one echo request to `target`, waiting at most `timeout`
pub fn ping_once(target: &str, timeout: Duration) -> PingReply {
    // -W takes whole seconds
    let wait = timeout.as_secs().max(1).to_string();
    let args = ["-c", "1", "-W", wait.as_str(), target];

    // Leave the tool room to report its own timeout before we kill it
    match command::run("ping", &args, timeout + Duration::from_secs(1)) {
        Ok(output) => PingReply::new(output.success, output.combined()),
        Err(e) => PingReply::new(false, e.to_string()),
    }
}

/// Extract round-trip latency from ping output
///
/// Understands `time=12.3 ms`, `time=0.045ms` and `time<1 ms`.
pub fn parse_latency(output: &str) -> Option<Duration> {
    let idx = output.find("time=").or_else(|| output.find("time<"))?;
    let rest = &output[idx + 5..];
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let millis: f64 = number.parse().ok()?;
    if !millis.is_finite() || millis < 0.0 {
        return None;
    }
    Some(Duration::from_nanos((millis * 1_000_000.0).round() as u64))
}
