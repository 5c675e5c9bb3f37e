//! Daily append-only log files
//!
//! Every run appends one line per event to a per-day file:
//! `YYYY-MM-DD HH:MM:SS [LEVEL] message`. Alert, diagnosis and remediation
//! logs are pruned by age; the date is taken from the file name.

use crate::error::{Error, Result};
use crate::manifest::LogbookConfig;
use crate::sickbay::diagnosis::DiagnosisEntry;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_DATE_FORMAT: &str = "%Y%m%d";

/// One of the daily log streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Monitor,
    Alerts,
    Diagnosis,
    Remediation,
}

impl Channel {
    /// File name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            Channel::Monitor => "monitor",
            Channel::Alerts => "alerts",
            Channel::Diagnosis => "diagnosis",
            Channel::Remediation => "remediation",
        }
    }
}

/// Line tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Action,
    Alert,
    Diagnosis,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
            Level::Action => write!(f, "ACTION"),
            Level::Alert => write!(f, "ALERT"),
            Level::Diagnosis => write!(f, "DIAGNOSIS"),
        }
    }
}

/// A target reported down in a check cycle
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub target: String,
    pub timestamp: NaiveDateTime,
    pub reason: String,
}

/// Writer for the daily logs
#[derive(Debug, Clone)]
pub struct Logbook {
    dir: PathBuf,
    alert_retention: i64,
    diagnosis_retention: i64,
    remediation_retention: i64,
}

impl Logbook {
    /// Open (creating if needed) the log directory
    pub fn open(config: &LogbookConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir).map_err(|e| Error::LogWrite {
            path: config.dir.clone(),
            source: e,
        })?;

        Ok(Self {
            dir: config.dir.clone(),
            alert_retention: config.alert_retention,
            diagnosis_retention: config.diagnosis_retention,
            remediation_retention: config.remediation_retention,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Days a channel's files are kept (`None` = forever)
    pub fn retention(&self, channel: Channel) -> Option<i64> {
        match channel {
            Channel::Monitor => None,
            Channel::Alerts => Some(self.alert_retention),
            Channel::Diagnosis => Some(self.diagnosis_retention),
            Channel::Remediation => Some(self.remediation_retention),
        }
    }

    /// Log file for a channel on a given day
    pub fn path_for(&self, channel: Channel, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.log",
            channel.prefix(),
            date.format(FILE_DATE_FORMAT)
        ))
    }

    /// Append a line stamped with the current local time
    pub fn write(&self, channel: Channel, level: Level, message: &str) -> Result<()> {
        self.write_at(channel, level, message, Local::now().naive_local())
    }

    /// Append a line stamped with `at`
    pub fn write_at(
        &self,
        channel: Channel,
        level: Level,
        message: &str,
        at: NaiveDateTime,
    ) -> Result<()> {
        match level {
            Level::Error => error!(log = channel.prefix(), "{}", message),
            Level::Warn | Level::Alert => warn!(log = channel.prefix(), "{}", message),
            Level::Diagnosis => debug!(log = channel.prefix(), "{}", message),
            Level::Info | Level::Action => info!(log = channel.prefix(), "{}", message),
        }

        let path = self.path_for(channel, at.date());
        let line = format!("{} [{}] {}\n", at.format(TIMESTAMP_FORMAT), level, message);

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| Error::LogWrite { path, source: e })
    }

    pub fn monitor(&self, level: Level, message: &str) -> Result<()> {
        self.write(Channel::Monitor, level, message)
    }

    pub fn remediation(&self, level: Level, message: &str) -> Result<()> {
        self.write(Channel::Remediation, level, message)
    }

    /// Record a target as down
    pub fn alert(&self, record: &AlertRecord) -> Result<()> {
        self.write_at(
            Channel::Alerts,
            Level::Alert,
            &format!("{} is DOWN ({})", record.target, record.reason),
            record.timestamp,
        )
    }

    /// Record one classifier finding for a target
    pub fn diagnosis(&self, target: &str, entry: &DiagnosisEntry) -> Result<()> {
        self.write(
            Channel::Diagnosis,
            Level::Diagnosis,
            &format!("{}: {}", target, entry),
        )
    }

    /// Delete a channel's files older than its retention, relative to today
    pub fn prune(&self, channel: Channel) -> Result<Vec<PathBuf>> {
        self.prune_at(channel, Local::now().date_naive())
    }

    /// Delete a channel's files older than its retention, relative to `today`
    pub fn prune_at(&self, channel: Channel, today: NaiveDate) -> Result<Vec<PathBuf>> {
        let Some(days) = self.retention(channel) else {
            return Ok(Vec::new());
        };

        let prefix = format!("{}_", channel.prefix());
        let mut removed = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(".log"))
                .and_then(|d| NaiveDate::parse_from_str(d, FILE_DATE_FORMAT).ok())
            else {
                continue;
            };

            if (today - date).num_days() > days {
                fs::remove_file(entry.path())?;
                debug!("Pruned {}", entry.path().display());
                removed.push(entry.path());
            }
        }

        removed.sort();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sickbay::diagnosis::Category;

    fn logbook(dir: &Path) -> Logbook {
        Logbook::open(&LogbookConfig {
            dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let book = logbook(dir.path());
        let at = day(18).and_hms_opt(14, 5, 9).unwrap();

        book.write_at(Channel::Monitor, Level::Info, "Starting network check", at)
            .unwrap();
        book.write_at(Channel::Monitor, Level::Error, "8.8.8.8 unreachable", at)
            .unwrap();

        let content = fs::read_to_string(dir.path().join("monitor_20261018.log")).unwrap();
        assert_eq!(
            content,
            "2026-10-18 14:05:09 [INFO] Starting network check\n\
             2026-10-18 14:05:09 [ERROR] 8.8.8.8 unreachable\n"
        );
    }

    #[test]
    fn test_alert_line() {
        let dir = tempfile::tempdir().unwrap();
        let book = logbook(dir.path());
        let record = AlertRecord {
            target: "10.255.255.1".into(),
            timestamp: day(18).and_hms_opt(8, 0, 0).unwrap(),
            reason: "2/2 attempts failed".into(),
        };

        book.alert(&record).unwrap();

        let content = fs::read_to_string(dir.path().join("alerts_20261018.log")).unwrap();
        assert_eq!(
            content,
            "2026-10-18 08:00:00 [ALERT] 10.255.255.1 is DOWN (2/2 attempts failed)\n"
        );
    }

    #[test]
    fn test_diagnosis_line() {
        let dir = tempfile::tempdir().unwrap();
        let book = logbook(dir.path());
        let entry = DiagnosisEntry::new(Category::Gateway, false, "192.168.1.1 unreachable");

        book.diagnosis("10.255.255.1", &entry).unwrap();

        let path = book.path_for(Channel::Diagnosis, Local::now().date_naive());
        let content = fs::read_to_string(path).unwrap();
        let expected = "[DIAGNOSIS] 10.255.255.1: GATEWAY FAIL 192.168.1.1 unreachable\n";
        assert!(content.ends_with(expected));
    }

    #[test]
    fn test_prune_respects_retention() {
        let dir = tempfile::tempdir().unwrap();
        let book = logbook(dir.path());
        for name in [
            "alerts_20261015.log",
            "alerts_20261016.log",
            "alerts_20261018.log",
            "diagnosis_20261015.log",
            "remediation_20261001.log",
            "monitor_20260101.log",
            "alerts_notes.txt",
        ] {
            fs::write(dir.path().join(name), "x\n").unwrap();
        }

        let removed = book.prune_at(Channel::Alerts, day(18)).unwrap();
        assert_eq!(removed, vec![dir.path().join("alerts_20261015.log")]);

        // Exactly at the retention boundary is kept
        let removed = book.prune_at(Channel::Diagnosis, day(18)).unwrap();
        assert!(removed.is_empty());

        let removed = book.prune_at(Channel::Remediation, day(18)).unwrap();
        assert_eq!(removed.len(), 1);

        assert!(book.prune_at(Channel::Monitor, day(18)).unwrap().is_empty());
        assert!(dir.path().join("monitor_20260101.log").exists());
        assert!(dir.path().join("alerts_20261016.log").exists());
        assert!(dir.path().join("alerts_notes.txt").exists());
    }
}
