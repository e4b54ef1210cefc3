//! Command-line parsing for the model-space search.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! search and ensembling code. Flags left unset fall back to the `--config` file,
//! then to `SearchConfig::default()`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::Strategy;
use crate::telemetry::LogLevel;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rover", version, about = "Model-space search and ensembling")]
pub struct Cli {
    /// Default log level when RUST_LOG is not set.
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the model space of a seeded synthetic dataset, build the ensemble,
    /// and print the run summary.
    Search(SearchArgs),
    /// Print the effective search configuration as JSON and exit.
    Config(SearchArgs),
}

/// Unit penalties selectable from the command line; use `--custom-penalty` for
/// anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PenaltyArg {
    Aic,
    Bic,
}

#[derive(Debug, Parser, Clone)]
pub struct SearchArgs {
    /// JSON search configuration (flags below override it).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Number of synthetic rows to generate.
    #[arg(short = 'n', long, default_value_t = 200)]
    pub rows: usize,

    /// Random seed for the synthetic dataset.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Covariate and its true coefficient, e.g. `age=1.5` (repeatable).
    #[arg(long = "covariate", value_name = "NAME=BETA", value_parser = parse_covariate)]
    pub covariates: Vec<(String, f64)>,

    /// Covariate always included in every model (repeatable).
    #[arg(long = "fixed", value_name = "NAME")]
    pub fixed: Vec<String>,

    /// Covariates that enter and leave together, e.g. `edu=hs,college` (repeatable).
    #[arg(long = "group", value_name = "LABEL=A,B", value_parser = parse_group)]
    pub groups: Vec<(String, Vec<String>)>,

    /// Standard deviation of the response noise.
    #[arg(long, default_value_t = 1.0)]
    pub noise_sd: f64,

    /// Fraction of rows held out to evaluate ensemble predictions.
    #[arg(long, default_value_t = 0.2)]
    pub holdout: f64,

    /// L1 penalty for the Gaussian fit (0 = ordinary least squares).
    #[arg(long, default_value_t = 0.0)]
    pub lasso: f64,

    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    #[arg(long, value_enum, conflicts_with = "custom_penalty")]
    pub penalty: Option<PenaltyArg>,

    /// Custom complexity penalty per effective parameter.
    #[arg(long)]
    pub custom_penalty: Option<f64>,

    /// Keep the k best models in the ensemble.
    #[arg(long, conflicts_with = "threshold")]
    pub top_k: Option<usize>,

    /// Keep every model within this score distance of the best.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Skip specifications with more covariates than this.
    #[arg(long)]
    pub max_covariates: Option<usize>,

    /// Maximum greedy moves.
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Fitting worker threads.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-fit wall-clock limit in seconds.
    #[arg(long)]
    pub fit_timeout: Option<f64>,

    /// Rows shown in the ranked model table.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export scored models, ensemble, and coefficients to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

fn parse_covariate(s: &str) -> Result<(String, f64), String> {
    let (name, beta) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=BETA, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty covariate name in '{s}'"));
    }
    let beta: f64 = beta
        .trim()
        .parse()
        .map_err(|e| format!("invalid coefficient in '{s}': {e}"))?;
    Ok((name.to_string(), beta))
}

fn parse_group(s: &str) -> Result<(String, Vec<String>), String> {
    let (label, members) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=A,B, got '{s}'"))?;
    let members: Vec<String> = members
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if label.trim().is_empty() || members.is_empty() {
        return Err(format!("group needs a label and at least one member: '{s}'"));
    }
    Ok((label.trim().to_string(), members))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_covariates_and_groups() {
        assert_eq!(parse_covariate("age = 1.5").unwrap(), ("age".into(), 1.5));
        assert!(parse_covariate("age").is_err());
        assert!(parse_covariate("=1").is_err());

        let (label, members) = parse_group("edu=hs, college").unwrap();
        assert_eq!(label, "edu");
        assert_eq!(members, ["hs", "college"]);
        assert!(parse_group("edu=").is_err());
    }

    #[test]
    fn search_flags_parse() {
        let cli = Cli::try_parse_from([
            "rover",
            "search",
            "--strategy",
            "greedy-forward",
            "--covariate",
            "a=1",
            "--covariate",
            "b=0",
            "--top-k",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.strategy, Some(Strategy::GreedyForward));
        assert_eq!(args.covariates.len(), 2);
        assert_eq!(args.top_k, Some(3));
    }

    #[test]
    fn top_k_and_threshold_conflict() {
        let res = Cli::try_parse_from(["rover", "search", "--top-k", "3", "--threshold", "2"]);
        assert!(res.is_err());
    }
}
