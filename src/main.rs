//! Lookout - host-local network health monitor
//!
//! Probes a set of targets, records alerts for unreachable ones, classifies
//! the likely root cause and, for gateway-class faults, runs a verified
//! remediation sequence under a system-wide lock.

mod cli;
mod error;
mod flapping;
mod logbook;
mod manifest;
mod network;
mod sickbay;
mod watch;

use cli::{CheckArgs, Cli, Commands};
use error::Result;
use flapping::FlappingSimulator;
use logbook::{Channel, Logbook};
use manifest::LookoutConfig;
use network::SystemHost;
use sickbay::{AttemptOutcome, RemediationEngine, RemediationReport};
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use watch::{CycleReport, Watch};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Commands that don't require config
    if let Some(Commands::Completions { shell }) = cli.command {
        Cli::generate_completion(shell);
        return Ok(0);
    }

    let config = match &cli.config {
        Some(path) => manifest::load(path)?,
        None => manifest::load_or_default(Path::new(manifest::DEFAULT_CONFIG_PATH))?,
    };
    debug!("Configuration: {:?}", config);

    if let Some(Commands::Validate) = cli.command {
        println!("Configuration is valid");
        println!("  Targets: {}", config.targets.join(", "));
        println!("  Log directory: {}", config.logbook.dir.display());
        println!(
            "  Remediation: {}",
            if config.remediation.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        match config.flapping.strategy {
            Some(kind) => println!("  Flapping: {}", kind),
            None => println!("  Flapping: off"),
        }
        return Ok(0);
    }

    let host = SystemHost::new(config.host.clone());
    let logbook = Logbook::open(&config.logbook)?;

    match cli.command {
        None => {
            let simulator = FlappingSimulator::from_config(&config.flapping)?;
            check(&host, &config, &logbook, &cli.check, simulator)
        }
        Some(Commands::Check(args)) => {
            let simulator = FlappingSimulator::from_config(&config.flapping)?;
            let args = args.merged(&cli.check);
            check(&host, &config, &logbook, &args, simulator)
        }
        Some(Commands::Remediate { json }) => {
            let report = RemediationEngine::new(&host, &config.remediation, &logbook).run()?;
            print_remediation(&report, json)?;
            Ok(report.outcome.exit_code())
        }
        Some(Commands::Flap { strategy, inject }) => {
            let kind = strategy.or(config.flapping.strategy).ok_or_else(|| {
                error::Error::ConfigValidation(
                    "no flapping strategy configured; pass --strategy".into(),
                )
            })?;
            let mut simulator = FlappingSimulator::with_kind(kind, &config.flapping)?;

            if inject {
                return check(
                    &host,
                    &config,
                    &logbook,
                    &CheckArgs::default(),
                    Some(simulator),
                );
            }

            let now = chrono::Local::now().fixed_offset();
            let fires = simulator.should_inject(now);
            println!(
                "{}: {} ({})",
                kind,
                if fires { "inject" } else { "hold" },
                simulator.failure_target()
            );
            Ok(0)
        }
        Some(Commands::Prune) => {
            debug!("Pruning logs under {}", logbook.dir().display());
            for channel in [Channel::Alerts, Channel::Diagnosis, Channel::Remediation] {
                for path in logbook.prune(channel)? {
                    println!("Removed {}", path.display());
                }
            }
            Ok(0)
        }
        // Already handled above
        Some(Commands::Completions { .. }) | Some(Commands::Validate) => unreachable!(),
    }
}

fn check(
    host: &SystemHost,
    config: &LookoutConfig,
    logbook: &Logbook,
    args: &CheckArgs,
    simulator: Option<FlappingSimulator>,
) -> Result<i32> {
    let report = Watch::new(host, config, logbook)
        .with_flapping(simulator)
        .run_cycle(&args.targets)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_cycle(&report);
    }

    Ok(report.exit_code(args.strict))
}

fn print_cycle(report: &CycleReport) {
    println!(
        "{:<24} {:<12} {:<10} {:<10}",
        "TARGET", "STATUS", "ATTEMPTS", "LATENCY"
    );
    println!("{}", "-".repeat(58));

    for result in &report.results {
        let status = if result.reachable {
            "reachable"
        } else {
            "DOWN"
        };
        let latency = result
            .latency
            .map(|l| format!("{:.1}ms", l.as_secs_f64() * 1000.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<12} {:<10} {:<10}",
            result.target.to_string(),
            status,
            format!("{}/{}", result.attempts_failed, result.attempts),
            latency
        );
    }

    for diagnosis in &report.diagnoses {
        println!("\nDiagnosis for {}:", diagnosis.target);
        for entry in &diagnosis.entries {
            println!("  {}", entry);
        }
    }

    if let Some(remediation) = &report.remediation {
        println!();
        print_remediation_text(remediation);
    }

    let down = report.failures().count();
    if down > 0 {
        println!("\n{} of {} targets unreachable", down, report.results.len());
    }
    if report.injected {
        println!("\n(flapping simulator injected a failure target)");
    }
    println!("\nNetwork status: {}", report.status);
}

fn print_remediation(report: &RemediationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_remediation_text(report);
    }
    Ok(())
}

fn print_remediation_text(report: &RemediationReport) {
    if let Some(precheck) = &report.precheck {
        println!("Precheck: {}", precheck);
    }
    for attempt in &report.attempts {
        let outcome = match attempt.outcome {
            AttemptOutcome::Success => "SUCCESS",
            AttemptOutcome::Failure => "FAILURE",
        };
        println!(
            "  {:<18} {:<8} {}",
            attempt.action.to_string(),
            outcome,
            attempt.post_check
        );
        if let Some(error) = &attempt.error {
            println!("  {:<18} {}", "", error);
        }
    }
    println!("Remediation: {}", report.outcome);
}
