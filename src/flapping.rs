//! Synthetic failure injection
//!
//! A flapping strategy decides, once per cycle, whether to append a known
//! unreachable target to that cycle's target list. Used to exercise the
//! alert, diagnosis and remediation paths on a healthy host.

use crate::error::{Error, Result};
use crate::manifest::FlappingConfig;
use crate::sickbay::probe::Target;
use chrono::{DateTime, FixedOffset, Timelike};
use rand::SeedableRng;
use rand::distr::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// Width of a persistent-toggle bucket, in minutes
const TOGGLE_BUCKET_MINUTES: i64 = 5;

/// Selectable strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Even fixed-width wall-clock buckets fail
    TimeWindow,
    /// Independent trial per cycle
    Random,
    /// Four 5-minute windows per hour fail
    Pattern,
    /// Toggle between normal and failure on each new 5-minute bucket
    Persistent,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::TimeWindow => write!(f, "time-window"),
            StrategyKind::Random => write!(f, "random"),
            StrategyKind::Pattern => write!(f, "pattern"),
            StrategyKind::Persistent => write!(f, "persistent"),
        }
    }
}

/// Failure-injection decision
pub trait FlapStrategy {
    fn kind(&self) -> StrategyKind;

    /// Whether this cycle, evaluated at `now`, should see a synthetic failure
    ///
    /// Bucketed strategies count from the Unix epoch, so the offset carried
    /// by `now` only matters for minute-of-hour decisions.
    fn should_inject_failure(&mut self, now: DateTime<FixedOffset>) -> bool;
}

/// Inject on even-numbered wall-clock buckets
#[derive(Debug, Clone)]
pub struct TimeWindow {
    window: u64,
}

impl TimeWindow {
    pub fn new(window: u64) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl FlapStrategy for TimeWindow {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TimeWindow
    }

    fn should_inject_failure(&mut self, now: DateTime<FixedOffset>) -> bool {
        let bucket = now.timestamp().div_euclid(self.window as i64);
        bucket % 2 == 0
    }
}

/// Bernoulli trial per cycle
#[derive(Debug)]
pub struct Random {
    rng: StdRng,
    trial: Bernoulli,
}

impl Random {
    pub fn new(probability: f64, seed: Option<u64>) -> Result<Self> {
        let trial = Bernoulli::new(probability).map_err(|e| {
            Error::ConfigValidation(format!("flapping probability {}: {}", probability, e))
        })?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self { rng, trial })
    }
}

impl FlapStrategy for Random {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn should_inject_failure(&mut self, _now: DateTime<FixedOffset>) -> bool {
        self.trial.sample(&mut self.rng)
    }
}

/// Minutes 0-4, 15-19, 30-34 and 45-49 of every hour
#[derive(Debug, Clone, Default)]
pub struct Pattern;

impl FlapStrategy for Pattern {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pattern
    }

    fn should_inject_failure(&mut self, now: DateTime<FixedOffset>) -> bool {
        now.minute() % 15 < 5
    }
}

/// Toggle state of the persistent strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlapState {
    Normal,
    Failure,
}

impl FlapState {
    pub fn flipped(self) -> Self {
        match self {
            FlapState::Normal => FlapState::Failure,
            FlapState::Failure => FlapState::Normal,
        }
    }
}

/// Persisted toggle: the state and the epoch minute it was set at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlappingState {
    pub state: FlapState,
    pub last_bucket: i64,
}

impl FlappingState {
    fn bucket(&self) -> i64 {
        self.last_bucket.div_euclid(TOGGLE_BUCKET_MINUTES)
    }
}

impl fmt::Display for FlappingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            FlapState::Normal => "normal",
            FlapState::Failure => "failure",
        };
        write!(f, "{}:{}", state, self.last_bucket)
    }
}

impl FromStr for FlappingState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (state, bucket) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected 'state:bucket', got '{}'", s.trim()))?;

        let state = match state.to_ascii_lowercase().as_str() {
            "normal" => FlapState::Normal,
            "failure" => FlapState::Failure,
            other => return Err(format!("unknown state '{}'", other)),
        };
        let last_bucket = bucket
            .parse()
            .map_err(|_| format!("invalid bucket '{}'", bucket))?;

        Ok(Self { state, last_bucket })
    }
}

/// Get/set storage for the persistent toggle
pub trait StateStore {
    /// Stored state; `Ok(None)` when nothing has been stored yet
    fn load(&self) -> Result<Option<FlappingState>>;

    fn save(&mut self, state: &FlappingState) -> Result<()>;
}

/// Single-line state file
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn state_error(&self, message: impl Into<String>) -> Error {
        Error::StateFile {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<FlappingState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.state_error(e.to_string())),
        };
        content
            .parse()
            .map(Some)
            .map_err(|e: String| self.state_error(e))
    }

    fn save(&mut self, state: &FlappingState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.state_error(e.to_string()))?;
        }
        fs::write(&self.path, format!("{}\n", state)).map_err(|e| self.state_error(e.to_string()))
    }
}

/// Flip between normal and failure whenever a new 5-minute bucket starts
pub struct Persistent<S: StateStore> {
    store: S,
}

impl<S: StateStore> Persistent<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: StateStore> FlapStrategy for Persistent<S> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Persistent
    }

    fn should_inject_failure(&mut self, now: DateTime<FixedOffset>) -> bool {
        let minute = now.timestamp().div_euclid(60);

        let stored = self.store.load().unwrap_or_else(|e| {
            warn!("{}, resetting to normal", e);
            None
        });
        let Some(current) = stored else {
            let baseline = FlappingState {
                state: FlapState::Normal,
                last_bucket: minute,
            };
            if let Err(e) = self.store.save(&baseline) {
                warn!("Failed to record flapping baseline: {}", e);
            }
            return false;
        };

        if minute.div_euclid(TOGGLE_BUCKET_MINUTES) == current.bucket() {
            return current.state == FlapState::Failure;
        }

        let next = FlappingState {
            state: current.state.flipped(),
            last_bucket: minute,
        };
        debug!("Flapping toggled {} -> {}", current, next);
        if let Err(e) = self.store.save(&next) {
            warn!("Failed to persist flapping state: {}", e);
        }
        next.state == FlapState::Failure
    }
}

/// Appends the failure target to a cycle's target list when the strategy says so
pub struct FlappingSimulator {
    strategy: Box<dyn FlapStrategy>,
    failure_target: Target,
}

impl FlappingSimulator {
    pub fn new(strategy: Box<dyn FlapStrategy>, failure_target: Target) -> Self {
        Self {
            strategy,
            failure_target,
        }
    }

    /// Simulator for the configured strategy, or `None` when flapping is off
    pub fn from_config(config: &FlappingConfig) -> Result<Option<Self>> {
        config
            .strategy
            .map(|kind| Self::with_kind(kind, config))
            .transpose()
    }

    /// Simulator for an explicit strategy, other settings from `config`
    pub fn with_kind(kind: StrategyKind, config: &FlappingConfig) -> Result<Self> {
        let strategy: Box<dyn FlapStrategy> = match kind {
            StrategyKind::TimeWindow => Box::new(TimeWindow::new(config.window)),
            StrategyKind::Random => Box::new(Random::new(config.probability, config.seed)?),
            StrategyKind::Pattern => Box::new(Pattern),
            StrategyKind::Persistent => {
                Box::new(Persistent::new(FileStateStore::new(&config.state_file)))
            }
        };
        Ok(Self::new(strategy, Target::parse(&config.failure_target)))
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn failure_target(&self) -> &Target {
        &self.failure_target
    }

    pub fn should_inject(&mut self, now: DateTime<FixedOffset>) -> bool {
        self.strategy.should_inject_failure(now)
    }

    /// Evaluate the strategy and append the failure target if it fires
    pub fn inject(&mut self, targets: &mut Vec<Target>, now: DateTime<FixedOffset>) -> bool {
        if !self.should_inject(now) {
            return false;
        }
        if !targets.contains(&self.failure_target) {
            targets.push(self.failure_target.clone());
        }
        true
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    /// `secs` past the epoch, seen from UTC
    fn at(secs: i64) -> DateTime<FixedOffset> {
        DateTime::from_timestamp(secs, 0).unwrap().fixed_offset()
    }

    fn at_minute(minute: i64) -> DateTime<FixedOffset> {
        at(minute * 60)
    }

    /// Wall clock `10:minute` in a UTC+05:45 zone
    fn kathmandu(minute: u32) -> DateTime<FixedOffset> {
        let naive = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap();
        let offset = FixedOffset::east_opt(5 * 3600 + 45 * 60).unwrap();
        offset.from_local_datetime(&naive).unwrap()
    }

    #[test]
    fn test_time_window_even_buckets_fail() {
        let mut strategy = TimeWindow::new(300);
        assert!(strategy.should_inject_failure(at(0)));
        assert!(strategy.should_inject_failure(at(299)));
        assert!(!strategy.should_inject_failure(at(300)));
        assert!(!strategy.should_inject_failure(at(599)));
        assert!(strategy.should_inject_failure(at(600)));
    }

    #[test]
    fn test_time_window_ignores_utc_offset() {
        let offset = FixedOffset::east_opt(5 * 3600 + 45 * 60).unwrap();
        let mut strategy = TimeWindow::new(300);
        for secs in [0, 299, 300, 599, 600, 1_760_788_800] {
            let utc = strategy.should_inject_failure(at(secs));
            let local = strategy.should_inject_failure(at(secs).with_timezone(&offset));
            assert_eq!(utc, local, "decision at {} depends on the offset", secs);
        }

        // 10:00 at UTC+05:45 is 04:15 UTC
        let now = kathmandu(0);
        let bucket = now.timestamp().div_euclid(300);
        assert_eq!(strategy.should_inject_failure(now), bucket % 2 == 0);
    }

    #[test]
    fn test_pattern_windows() {
        let mut strategy = Pattern;
        let hits: Vec<u32> = (0..60)
            .filter(|m| strategy.should_inject_failure(kathmandu(*m)))
            .collect();
        let expected: Vec<u32> = [0, 15, 30, 45]
            .iter()
            .flat_map(|start| *start..start + 5)
            .collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn test_random_extremes_and_seeding() {
        let mut never = Random::new(0.0, Some(7)).unwrap();
        let mut always = Random::new(1.0, Some(7)).unwrap();
        for i in 0..50 {
            assert!(!never.should_inject_failure(at(i)));
            assert!(always.should_inject_failure(at(i)));
        }

        let mut a = Random::new(0.35, Some(42)).unwrap();
        let mut b = Random::new(0.35, Some(42)).unwrap();
        let run_a: Vec<bool> = (0..32).map(|i| a.should_inject_failure(at(i))).collect();
        let run_b: Vec<bool> = (0..32).map(|i| b.should_inject_failure(at(i))).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn test_random_rejects_bad_probability() {
        assert!(matches!(
            Random::new(1.5, None),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_persistent_holds_within_bucket() {
        let mut strategy = Persistent::new(MemoryStore::with("normal:10"));

        assert!(!strategy.should_inject_failure(at_minute(12)));
        assert_eq!(strategy.store().saves, 0);
        assert_eq!(strategy.store().state.unwrap().to_string(), "normal:10");
    }

    #[test]
    fn test_persistent_flips_on_new_bucket() {
        let mut strategy = Persistent::new(MemoryStore::with("normal:10"));

        assert!(strategy.should_inject_failure(at_minute(17)));
        assert_eq!(strategy.store().state.unwrap().to_string(), "failure:17");

        // Same bucket holds the failure, next bucket flips back
        assert!(strategy.should_inject_failure(at_minute(19)));
        assert!(!strategy.should_inject_failure(at_minute(20)));
        assert_eq!(strategy.store().state.unwrap().to_string(), "normal:20");
    }

    #[test]
    fn test_persistent_missing_or_corrupt_state_is_normal() {
        let mut fresh = Persistent::new(MemoryStore::default());
        assert!(!fresh.should_inject_failure(at_minute(42)));
        assert_eq!(fresh.store().state.unwrap().to_string(), "normal:42");

        let mut broken = Persistent::new(MemoryStore {
            corrupt: true,
            ..Default::default()
        });
        assert!(!broken.should_inject_failure(at_minute(42)));
        assert_eq!(broken.store().state.unwrap().state, FlapState::Normal);
    }

    #[test]
    fn test_state_line_parsing() {
        let state: FlappingState = "FAILURE:17\n".parse().unwrap();
        assert_eq!(state.state, FlapState::Failure);
        assert_eq!(state.last_bucket, 17);
        assert!("normal".parse::<FlappingState>().is_err());
        assert!("sleepy:3".parse::<FlappingState>().is_err());
        assert!("normal:x".parse::<FlappingState>().is_err());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("flapping.state");
        let mut store = FileStateStore::new(&path);

        assert!(store.load().unwrap().is_none());

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "normal:10\n").unwrap();
        let mut strategy = Persistent::new(store.clone());
        assert!(!strategy.should_inject_failure(at_minute(12)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "normal:10\n");
        assert!(strategy.should_inject_failure(at_minute(17)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "failure:17\n");

        fs::write(&path, "garbage").unwrap();
        assert!(matches!(store.load(), Err(Error::StateFile { .. })));
        store
            .save(&FlappingState {
                state: FlapState::Normal,
                last_bucket: 3,
            })
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "normal:3\n");
    }

    #[test]
    fn test_simulator_appends_failure_target_once() {
        let config = FlappingConfig {
            strategy: Some(StrategyKind::Pattern),
            ..Default::default()
        };
        let mut sim = FlappingSimulator::from_config(&config).unwrap().unwrap();
        assert_eq!(sim.kind(), StrategyKind::Pattern);

        let mut targets = vec![Target::parse("8.8.8.8")];
        assert!(sim.inject(&mut targets, kathmandu(2)));
        assert!(sim.inject(&mut targets, kathmandu(3)));
        assert_eq!(
            targets,
            vec![Target::parse("8.8.8.8"), Target::parse("10.255.255.1")]
        );

        let mut quiet = vec![Target::parse("8.8.8.8")];
        assert!(!sim.inject(&mut quiet, kathmandu(7)));
        assert_eq!(quiet.len(), 1);
    }

    #[test]
    fn test_simulator_disabled_without_strategy() {
        assert!(
            FlappingSimulator::from_config(&FlappingConfig::default())
                .unwrap()
                .is_none()
        );
    }
}
