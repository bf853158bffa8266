//! Command-line interface for the courier peer tracker.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

/// Courier - peer backoff and blacklist tracker
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration
    #[command(flatten)]
    pub(crate) log_args: LogArgs,

    /// Path to a TOML configuration file
    #[arg(long, short, global = true, env = "COURIER_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Logging configuration
#[derive(Debug, Args, Clone)]
pub(crate) struct LogArgs {
    /// Silence all output
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbosity: u8,

    /// Include timestamps in logs
    #[arg(long, global = true)]
    pub(crate) timestamps: bool,

    /// Log filter
    #[arg(long = "log.filter", global = true, value_name = "DIRECTIVE")]
    pub(crate) filter: Option<String>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Replay outcome scripts against the tracker
    Simulate(SimulateArgs),

    /// List peers in the durable blacklist
    Blacklist(BlacklistArgs),
}

#[derive(Debug, Args)]
pub(crate) struct SimulateArgs {
    /// Peer and its outcome script, e.g. `a.example=ffs`.
    ///
    /// `f` reports a failure and waits out any backoff window, `s` reports a success,
    /// `a` marks the peer alive.
    #[arg(long = "peer", value_name = "ID=SCRIPT", required = true)]
    pub(crate) peers: Vec<PeerScript>,

    /// Override the configured failure threshold
    #[arg(long)]
    pub(crate) failures_until_blacklist: Option<u32>,

    /// Override the configured blacklist file
    #[arg(long)]
    pub(crate) blacklist_file: Option<PathBuf>,
}

impl SimulateArgs {
    /// Each peer may appear at most once.
    pub(crate) fn validate(&self) -> eyre::Result<()> {
        let mut seen = HashSet::new();
        for script in &self.peers {
            if !seen.insert(script.id.as_str()) {
                eyre::bail!(
                    "peer `{}` given more than once, combine its steps into one --peer",
                    script.id
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub(crate) struct BlacklistArgs {
    /// Override the configured blacklist file
    #[arg(long)]
    pub(crate) blacklist_file: Option<PathBuf>,
}

/// One scripted outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Failure,
    Success,
    MarkAlive,
}

/// A peer id with the outcomes to replay against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PeerScript {
    pub(crate) id: String,
    pub(crate) steps: Vec<Step>,
}

impl FromStr for PeerScript {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, script) = s
            .split_once('=')
            .ok_or_else(|| format!("expected ID=SCRIPT, got `{s}`"))?;
        if id.is_empty() {
            return Err("peer id must not be empty".to_string());
        }

        let steps = script
            .chars()
            .map(|c| match c {
                'f' => Ok(Step::Failure),
                's' => Ok(Step::Success),
                'a' => Ok(Step::MarkAlive),
                other => Err(format!("unknown step `{other}`, expected one of f, s, a")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: id.to_string(),
            steps,
        })
    }
}
