//! Plain-text summary of a completed run, printed to stdout

use std::fmt::Write as _;

use uqchaos_core::error::CollaboratorError;
use uqchaos_core::model::{CompletedRun, FeatureStatistics, Plotter};

/// Prints a summary of every completed run
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReport;

impl Plotter for ConsoleReport {
    fn plot(&self, _name: &str, run: &CompletedRun) -> Result<(), CollaboratorError> {
        println!("{}", render(run));
        Ok(())
    }
}

/// Summary of `run`. Time-dependent features are reported at their last time point.
pub fn render(run: &CompletedRun) -> String {
    let meta = &run.metadata;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} ({}, {} nodes, {:.2}s)",
        meta.name,
        meta.method.label(),
        meta.node_count,
        meta.elapsed_seconds
    );
    let _ = writeln!(out, "  uncertain: {}", meta.uncertain_parameters.join(", "));

    for (feature, stats) in &run.statistics.features {
        let _ = writeln!(out, "  {feature}{}", summarize(stats));
    }

    if !run.statistics.sensitivity_ranking.is_empty() {
        let _ = writeln!(out, "  sensitivity ranking:");
        for share in &run.statistics.sensitivity_ranking {
            let _ = writeln!(out, "    {:<16} {:>6.1}%", share.parameter, share.share * 100.0);
        }
    }

    out.trim_end().to_string()
}

fn summarize(stats: &FeatureStatistics) -> String {
    let Some(i) = stats.mean.len().checked_sub(1) else {
        return ": empty".to_string();
    };
    let at = match &stats.time {
        Some(time) => time
            .last()
            .map_or_else(String::new, |t| format!(" @ t={t}")),
        None if stats.mean.len() > 1 => format!(" [{i}]"),
        None => String::new(),
    };
    let mut line = format!(
        "{at}: E={:.6} Var={:.6} 90% band=[{:.6}, {:.6}]",
        stats.mean[i], stats.variance[i], stats.p_05[i], stats.p_95[i]
    );
    if stats.nodes_excluded > 0 {
        let _ = write!(line, " ({} nodes excluded)", stats.nodes_excluded);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use uqchaos_core::model::{Method, RunMetadata, SensitivityShare, StatisticsBundle};

    fn stats(time: Option<Vec<f64>>, mean: Vec<f64>) -> FeatureStatistics {
        let n = mean.len();
        FeatureStatistics {
            time,
            shape: if n > 1 { vec![n] } else { vec![] },
            variance: vec![0.25; n],
            p_05: vec![0.0; n],
            p_95: vec![2.0; n],
            mean,
            sensitivity: None,
            nodes_used: 20,
            nodes_excluded: 1,
        }
    }

    #[test]
    fn test_render_summary() {
        let mut statistics = StatisticsBundle::default();
        statistics.features.insert(
            "direct_comparison".into(),
            stats(Some(vec![0.0, 1.0, 2.0]), vec![1.0, 0.8, 0.6]),
        );
        statistics
            .features
            .insert("peak_time".into(), stats(None, vec![1.5]));
        statistics.sensitivity_ranking = vec![SensitivityShare {
            parameter: "k".into(),
            share: 1.0,
        }];

        let run = CompletedRun {
            metadata: RunMetadata {
                name: "decay".into(),
                method: Method::PolynomialChaos,
                uncertain_parameters: vec!["k".into()],
                features: vec!["peak_time".into()],
                node_count: 9,
                started_at: jiff::Timestamp::UNIX_EPOCH,
                elapsed_seconds: 0.25,
            },
            statistics,
        };

        let text = render(&run);
        assert!(text.starts_with("decay (pc, 9 nodes, 0.25s)"));
        assert!(text.contains("direct_comparison @ t=2: E=0.600000"));
        assert!(text.contains("peak_time: E=1.500000"));
        assert!(text.contains("(1 nodes excluded)"));
        assert!(text.contains("100.0%"));
    }

    #[test]
    fn test_empty_feature() {
        assert_eq!(summarize(&stats(None, vec![])), ": empty");
    }
}
