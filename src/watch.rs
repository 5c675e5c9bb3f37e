//! One monitor check cycle
//!
//! Probes every target in turn, raises one alert per unreachable target,
//! diagnoses each failure and, when a gateway-class fault shows up, hands
//! over to the remediation engine once for the whole cycle.

use crate::error::Result;
use crate::flapping::FlappingSimulator;
use crate::logbook::{AlertRecord, Channel, Level, Logbook};
use crate::manifest::LookoutConfig;
use crate::network::Host;
use crate::sickbay::{
    Classifier, Diagnosis, ProbeResult, Prober, RemediationEngine, RemediationReport, Target,
};
use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Overall result of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Healthy,
    Degraded,
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStatus::Healthy => write!(f, "HEALTHY"),
            CycleStatus::Degraded => write!(f, "DEGRADED"),
        }
    }
}

/// Everything one cycle observed and did
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub targets: Vec<Target>,
    /// The flapping simulator added its failure target
    pub injected: bool,
    pub results: Vec<ProbeResult>,
    pub alerts: Vec<AlertRecord>,
    pub diagnoses: Vec<Diagnosis>,
    pub remediation: Option<RemediationReport>,
    pub status: CycleStatus,
}

impl CycleReport {
    pub fn failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.reachable)
    }

    /// Process exit code; degraded cycles only fail in strict mode
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && self.status == CycleStatus::Degraded {
            1
        } else {
            0
        }
    }
}

/// Monitor loop bound to a host, configuration and log directory
pub struct Watch<'a, H: Host + ?Sized> {
    host: &'a H,
    config: &'a LookoutConfig,
    logbook: &'a Logbook,
    flapping: Option<FlappingSimulator>,
}

impl<'a, H: Host + ?Sized> Watch<'a, H> {
    pub fn new(host: &'a H, config: &'a LookoutConfig, logbook: &'a Logbook) -> Self {
        Self {
            host,
            config,
            logbook,
            flapping: None,
        }
    }

    /// Inject synthetic failures with `simulator`
    pub fn with_flapping(mut self, simulator: Option<FlappingSimulator>) -> Self {
        self.flapping = simulator;
        self
    }

    /// Run one cycle now
    pub fn run_cycle(&mut self, targets: &[String]) -> Result<CycleReport> {
        self.run_cycle_at(targets, Local::now().fixed_offset())
    }

    /// Run one cycle with `now` as the cycle clock
    pub fn run_cycle_at(
        &mut self,
        targets: &[String],
        now: DateTime<FixedOffset>,
    ) -> Result<CycleReport> {
        let requested: &[String] = if targets.is_empty() {
            &self.config.targets
        } else {
            targets
        };
        let mut targets: Vec<Target> = requested.iter().map(|t| Target::parse(t)).collect();

        let injected = match self.flapping.as_mut() {
            Some(simulator) => {
                let injected = simulator.inject(&mut targets, now);
                if injected {
                    warn!(
                        "Flapping ({}) injected failure target {}",
                        simulator.kind(),
                        simulator.failure_target()
                    );
                }
                injected
            }
            None => false,
        };

        let names: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        self.logbook.monitor(Level::Info, "Starting network check")?;
        self.logbook
            .monitor(Level::Info, &format!("Targets: {}", names.join(", ")))?;

        let probe = &self.config.probe;
        let prober = Prober::new(self.host, probe.backoff_duration());
        let classifier = Classifier::new(self.host, &self.config.diagnosis);

        let mut results = Vec::with_capacity(targets.len());
        let mut alerts = Vec::new();
        let mut diagnoses = Vec::new();

        for target in &targets {
            let result = prober.check(target, probe.timeout_duration(), probe.max_retries);

            if result.reachable {
                self.logbook.monitor(Level::Info, &result.summary())?;
                results.push(result);
                continue;
            }

            self.logbook.monitor(Level::Error, &result.summary())?;

            let alert = AlertRecord {
                target: target.to_string(),
                timestamp: now.naive_local(),
                reason: format!("unreachable after {} attempts", result.attempts),
            };
            self.logbook.alert(&alert)?;
            alerts.push(alert);

            let diagnosis = classifier.diagnose(target);
            for entry in &diagnosis.entries {
                self.logbook.diagnosis(&diagnosis.target.to_string(), entry)?;
            }
            diagnoses.push(diagnosis);
            results.push(result);
        }

        let remediation = self.remediate_if_needed(&diagnoses)?;

        let status = if alerts.is_empty() {
            CycleStatus::Healthy
        } else {
            CycleStatus::Degraded
        };
        self.logbook
            .monitor(Level::Info, &format!("Network status: {}", status))?;

        self.logbook.prune(Channel::Alerts)?;
        self.logbook.prune(Channel::Diagnosis)?;

        Ok(CycleReport {
            targets,
            injected,
            results,
            alerts,
            diagnoses,
            remediation,
            status,
        })
    }

    fn remediate_if_needed(&self, diagnoses: &[Diagnosis]) -> Result<Option<RemediationReport>> {
        let Some(trigger) = diagnoses.iter().find(|d| d.gateway_unreachable()) else {
            return Ok(None);
        };

        if !self.config.remediation.enabled {
            self.logbook.monitor(
                Level::Info,
                &format!("Gateway unreachable ({}), remediation disabled", trigger.target),
            )?;
            return Ok(None);
        }

        self.logbook.monitor(
            Level::Info,
            &format!("Gateway unreachable ({}), starting remediation", trigger.target),
        )?;

        let engine = RemediationEngine::new(self.host, &self.config.remediation, self.logbook);
        match engine.run() {
            Ok(report) => {
                let level = if report.outcome.exit_code() == 0 {
                    Level::Info
                } else {
                    Level::Error
                };
                self.logbook
                    .monitor(level, &format!("Remediation result: {}", report.outcome))?;
                Ok(Some(report))
            }
            Err(e) => {
                self.logbook
                    .monitor(Level::Error, &format!("Remediation aborted: {}", e))?;
                Ok(None)
            }
        }
    }
}
