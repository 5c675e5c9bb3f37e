//! Network health checks and recovery
//!
//! Provides:
//! - Reachability probes with bounded retries
//! - Root-cause classification of failed targets
//! - Lock-guarded, verified remediation runs

pub mod diagnosis;
pub mod lock;
pub mod probe;
pub mod remediation;
pub mod state;

pub use diagnosis::{Classifier, Diagnosis};
pub use probe::{ProbeResult, Prober, Target};
pub use remediation::{AttemptOutcome, RemediationEngine, RemediationReport};
