//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the search/ensemble code stays clean and testable
//! - output changes are localized

use std::collections::HashMap;

use crate::domain::{ScoredModel, SearchConfig, SelectionMode};
use crate::ensemble::{Ensemble, EnsembleCoefficient};
use crate::report::{HoldoutSummary, ModelHoldout};
use crate::search::SearchOutcome;

/// Header block: configuration, run state, and counts.
pub fn format_run_summary(
    outcome: &SearchOutcome,
    config: &SearchConfig,
    collaborator: &str,
    train_rows: usize,
) -> String {
    let mut out = String::new();

    out.push_str("=== rover - model-space search ===\n");
    out.push_str(&format!(
        "Strategy: {} | penalty: {} | selection: {}\n",
        outcome.strategy.display_name(),
        config.penalty.display_name(),
        fmt_selection(config.selection_mode),
    ));
    out.push_str(&format!(
        "Collaborator: {collaborator} | rows: {train_rows} | max covariates: {}\n",
        config
            .max_covariates
            .map_or_else(|| "none".to_string(), |m| m.to_string()),
    ));
    out.push_str(&format!(
        "State: {} | scored: {} (converged {}) | skipped: {} | fits: {}",
        outcome.state.as_str(),
        outcome.scored.len(),
        outcome.converged_count(),
        outcome.skipped_count,
        outcome.fits_computed,
    ));
    if outcome.strategy.is_greedy() {
        out.push_str(&format!(" | greedy steps: {}", outcome.greedy_steps));
    }
    out.push('\n');

    out
}

/// Ranked model table, best first. Ensemble members are starred with their weight;
/// holdout RMSE is shown when the run kept holdout rows.
pub fn format_model_table(
    ranked: &[ScoredModel],
    ensemble: &Ensemble,
    holdout: &[ModelHoldout],
    top_n: usize,
) -> String {
    let weights: HashMap<_, f64> = ensemble
        .members()
        .iter()
        .map(|m| (m.model.key().clone(), m.weight))
        .collect();
    let rmse: HashMap<_, f64> = holdout.iter().map(|h| (&h.key, h.rmse)).collect();

    let mut out = String::new();
    out.push_str(&format!(
        "{:<2}{:<40} {:>12} {:>4} {:>8} {:>10} {:<16}\n",
        "", "specification", "score", "k", "weight", "holdout", "status"
    ));
    out.push_str(&format!(
        "{:<2}{:-<40} {:-<12} {:-<4} {:-<8} {:-<10} {:-<16}\n",
        "", "", "", "", "", "", ""
    ));

    for m in ranked.iter().take(top_n) {
        let weight = weights.get(m.key());
        let status = match m.fit.failure_reason {
            Some(reason) => reason.as_str(),
            None => "converged",
        };
        let line = format!(
            "{:<2}{:<40} {:>12} {:>4} {:>8} {:>10} {:<16}",
            if weight.is_some() { "*" } else { "" },
            truncate(&m.key().to_string(), 40),
            fmt_score(m.score),
            m.effective_parameter_count,
            weight.map_or_else(String::new, |w| format!("{w:.4}")),
            rmse.get(m.key()).map_or_else(String::new, |r| format!("{r:.4}")),
            status,
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    if ranked.len() > top_n {
        out.push_str(&format!("  ... {} more\n", ranked.len() - top_n));
    }

    out
}

/// Model-averaged coefficients, with the true values when known.
pub fn format_coefficients(coefficients: &[EnsembleCoefficient], truth: &[(String, f64)]) -> String {
    let truth: HashMap<&str, f64> = truth.iter().map(|(n, b)| (n.as_str(), *b)).collect();

    let mut out = String::new();
    out.push_str("Ensemble coefficients:\n");
    for c in coefficients {
        let line = format!(
            "  {:<20} {:>10.4} ± {:<10.4} incl={:.2} {}",
            truncate(&c.name, 20),
            c.estimate,
            c.variance.sqrt(),
            c.inclusion,
            truth
                .get(c.name.as_str())
                .map_or_else(String::new, |b| format!("(true {b:.4})")),
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn format_holdout(summary: Option<&HoldoutSummary>, ensemble: &Ensemble) -> String {
    if ensemble.is_empty() {
        return "Ensemble is empty: no model converged.\n".to_string();
    }
    match summary {
        Some(h) => format!(
            "Holdout: n={} | RMSE={:.4} | MAE={:.4} | mean variance={:.4}\n",
            h.n, h.rmse, h.mean_abs_error, h.mean_variance
        ),
        None => "Holdout: none\n".to_string(),
    }
}

fn fmt_selection(mode: SelectionMode) -> String {
    match mode {
        SelectionMode::TopK(k) => format!("top {k}"),
        SelectionMode::Threshold(d) => format!("within {d}"),
    }
}

fn fmt_score(score: f64) -> String {
    if score.is_finite() {
        format!("{score:.3}")
    } else {
        "inf".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CoefficientEstimate, FailureReason, FitResult, SpecKey, Strategy};
    use crate::ensemble::build_ensemble;
    use crate::search::RunState;
    use std::sync::Arc;

    fn converged(names: &[&str], score: f64) -> ScoredModel {
        ScoredModel {
            fit: Arc::new(FitResult {
                specification_key: SpecKey::from_names(names.iter().copied()),
                coefficients: names
                    .iter()
                    .map(|n| CoefficientEstimate {
                        name: n.to_string(),
                        estimate: 1.0,
                        variance: 0.04,
                    })
                    .collect(),
                covariance: None,
                log_likelihood: Some(-score / 2.0),
                converged: true,
                iterations_used: 1,
                failure_reason: None,
                n_obs: 10,
            }),
            score,
            effective_parameter_count: names.len(),
        }
    }

    fn failed(name: &str) -> ScoredModel {
        ScoredModel {
            fit: Arc::new(FitResult::failed(
                SpecKey::from_names([name]),
                FailureReason::SingularDesign,
                10,
                0,
            )),
            score: f64::INFINITY,
            effective_parameter_count: 0,
        }
    }

    #[test]
    fn table_marks_members_and_failures() {
        let ranked = vec![converged(&["i", "x"], 10.0), converged(&["i"], 14.0), failed("z")];
        let ensemble = build_ensemble(&ranked, SelectionMode::TopK(1)).unwrap();
        let holdout = [ModelHoldout {
            key: SpecKey::from_names(["i", "x"]),
            rmse: 0.25,
        }];
        let table = format_model_table(&ranked, &ensemble, &holdout, 10);

        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[2].starts_with("* i + x"));
        assert!(lines[2].contains("1.0000"));
        assert!(lines[2].contains("0.2500"));
        assert!(!lines[3].contains("0.2500"));
        assert!(!lines[3].starts_with('*'));
        assert!(lines[4].contains("inf"));
        assert!(lines[4].contains("singular_design"));
    }

    #[test]
    fn table_is_truncated_to_top_n() {
        let ranked = vec![converged(&["a"], 1.0), converged(&["b"], 2.0), converged(&["c"], 3.0)];
        let table = format_model_table(&ranked, &Ensemble::default(), &[], 2);
        assert!(table.contains("... 1 more"));
    }

    #[test]
    fn summary_mentions_state_and_counts() {
        let outcome = SearchOutcome {
            state: RunState::Completed,
            strategy: Strategy::GreedyForward,
            scored: vec![converged(&["a"], 1.0), failed("b")],
            skipped: vec![],
            skipped_count: 0,
            fits_computed: 2,
            greedy_steps: 1,
        };
        let text = format_run_summary(&outcome, &SearchConfig::default(), "gaussian", 50);
        assert!(text.contains("State: completed"));
        assert!(text.contains("converged 1"));
        assert!(text.contains("greedy steps: 1"));
        assert!(text.contains("BIC"));
    }

    #[test]
    fn empty_ensemble_is_reported() {
        let text = format_holdout(None, &Ensemble::default());
        assert!(text.contains("empty"));
    }

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
