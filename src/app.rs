//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up tracing
//! - merges the JSON config file with flag overrides
//! - runs the search pipeline
//! - prints the report and writes the optional export

use clap::Parser;

use crate::cli::{Command, PenaltyArg, SearchArgs};
use crate::data::SampleConfig;
use crate::domain::{Penalty, SearchConfig, SelectionMode};
use crate::error::{RoverError, RoverResult};
use crate::io::{RunExport, write_run_json};
use crate::telemetry::init_tracing;

pub mod pipeline;

use pipeline::{RunConfig, run_pipeline};

/// Entry point for the `rover` binary.
pub fn run() -> RoverResult<()> {
    // `rover --strategy ...` behaves like `rover search --strategy ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_tracing(cli.log_json, cli.log_level.into());

    match cli.command {
        Command::Search(args) => handle_search(args),
        Command::Config(args) => handle_config(args),
    }
}

fn handle_search(args: SearchArgs) -> RoverResult<()> {
    let config = run_config_from_args(&args)?;
    let run = run_pipeline(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.outcome, &config.search, &run.collaborator, run.train_rows)
    );
    let ranked = run.outcome.ranked();
    println!(
        "{}",
        crate::report::format_model_table(&ranked, &run.ensemble, &run.model_holdout, args.top)
    );
    if !run.ensemble.is_empty() {
        println!(
            "{}",
            crate::report::format_coefficients(&run.coefficients, &run.sample.true_coefficients)
        );
    }
    print!(
        "{}",
        crate::report::format_holdout(run.holdout.as_ref(), &run.ensemble)
    );

    if let Some(path) = &args.export {
        let export = RunExport::new(
            &config.search,
            &run.collaborator,
            &run.outcome,
            &run.ensemble,
            &run.coefficients,
            run.holdout.as_ref(),
            &run.model_holdout,
        );
        write_run_json(path, &export)?;
    }

    Ok(())
}

fn handle_config(args: SearchArgs) -> RoverResult<()> {
    let config = search_config_from_args(&args)?;
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| RoverError::invalid_config(format!("cannot serialize config: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Demo covariates used when no `--covariate` is given.
fn default_covariates() -> Vec<(String, f64)> {
    [("x1", 1.5), ("x2", -0.8), ("x3", 0.0), ("x4", 0.4), ("x5", 0.0)]
        .into_iter()
        .map(|(name, beta)| (name.to_string(), beta))
        .collect()
}

pub fn run_config_from_args(args: &SearchArgs) -> RoverResult<RunConfig> {
    let covariates = if args.covariates.is_empty() {
        default_covariates()
    } else {
        args.covariates.clone()
    };

    Ok(RunConfig {
        sample: SampleConfig {
            n_rows: args.rows,
            seed: args.seed,
            response: "y".to_string(),
            intercept: 1.0,
            covariates,
            noise_sd: args.noise_sd,
        },
        fixed: args.fixed.clone(),
        groups: args.groups.clone(),
        holdout_fraction: args.holdout,
        lasso_lambda: args.lasso,
        search: search_config_from_args(args)?,
    })
}

/// Config file (or defaults), then flag overrides, then validation.
pub fn search_config_from_args(args: &SearchArgs) -> RoverResult<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::from_json_path(path)?,
        None => SearchConfig::default(),
    };

    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    match (args.penalty, args.custom_penalty) {
        (Some(PenaltyArg::Aic), _) => config.penalty = Penalty::Aic,
        (Some(PenaltyArg::Bic), _) => config.penalty = Penalty::Bic,
        (None, Some(v)) => config.penalty = Penalty::Custom(v),
        (None, None) => {}
    }
    if let Some(k) = args.top_k {
        config.selection_mode = SelectionMode::TopK(k);
    }
    if let Some(delta) = args.threshold {
        config.selection_mode = SelectionMode::Threshold(delta);
    }
    if args.max_covariates.is_some() {
        config.max_covariates = args.max_covariates;
    }
    if let Some(steps) = args.max_steps {
        config.max_steps = steps;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.fit_timeout.is_some() {
        config.fit_timeout_secs = args.fit_timeout;
    }

    config.validate()?;
    Ok(config)
}

/// Rewrite argv so bare flags default to the `search` subcommand.
///
/// Rules:
/// - `rover`                       -> `rover search`
/// - `rover --strategy ...`        -> `rover search --strategy ...`
/// - `rover --help/--version/-h`   -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("search".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "search" | "config");
    if !is_subcommand && arg1.starts_with('-') {
        argv.insert(1, "search".to_string());
    }
    argv
}
