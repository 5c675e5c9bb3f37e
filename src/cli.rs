//! Command-line interface for Lookout
//!
//! Uses clap with derive for type-safe CLI parsing

use crate::flapping::StrategyKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Lookout - network health monitor with verified auto-remediation
#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(subcommand_precedence_over_arg = true)]
pub struct Cli {
    /// Configuration file path [default: /etc/lookout/lookout.toml, if present]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Without a subcommand, run one check cycle
    #[command(flatten)]
    pub check: CheckArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options for a check cycle
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Targets to check (addresses or hostnames); configured targets when empty
    pub targets: Vec<String>,

    /// Output the cycle report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with status 1 when the network is degraded
    #[arg(long)]
    pub strict: bool,
}

impl CheckArgs {
    /// Fold in options given before the `check` subcommand
    pub fn merged(self, outer: &CheckArgs) -> CheckArgs {
        let mut targets = outer.targets.clone();
        targets.extend(self.targets);
        CheckArgs {
            targets,
            json: self.json || outer.json,
            strict: self.strict || outer.strict,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one check cycle: probe, alert, diagnose, remediate
    Check(CheckArgs),

    /// Run the remediation sequence on its own
    Remediate {
        /// Output the remediation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a flapping strategy once
    Flap {
        /// Strategy to evaluate (configured strategy when omitted)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyKind>,

        /// Run a check cycle with this strategy active
        #[arg(long)]
        inject: bool,
    },

    /// Delete log files past their retention
    Prune,

    /// Validate configuration
    Validate,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "lookout", &mut std::io::stdout());
    }
}
