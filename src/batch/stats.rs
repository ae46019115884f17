use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::policy::Action;
use crate::report::CaseReport;

/// The slice of a case report the batch evaluation keeps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub transaction_id: i64,
    pub label: i64,
    pub action: Action,
    pub proba: f64,
    pub signal_score: u8,
    pub identity_missing_heavy: bool,
    pub email_mismatch: bool,
    pub neighbor_rate: Option<f64>,
    pub close_count: usize,
}

impl CaseOutcome {
    pub fn from_report(report: &CaseReport, label: i64) -> Self {
        Self {
            transaction_id: report.transaction_id,
            label,
            action: report.recommended_action,
            proba: report.fraud_proba,
            signal_score: report.signals.signal_score,
            identity_missing_heavy: report.signals.identity_missing_heavy,
            email_mismatch: report.signals.email_mismatch,
            neighbor_rate: report.neighbor_fraud_rate_close,
            close_count: report.neighbor_close_count,
        }
    }

    fn is_fraud(&self) -> bool {
        self.label == 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketStats {
    pub count: usize,
    pub fraud_count: usize,
    pub fraud_rate: Option<f64>,
    pub avg_model_proba: Option<f64>,
}

/// Per-action counts, fraud rate and mean model probability. Every action gets a bucket,
/// empty ones with unknown rates.
pub fn compute_bucket_stats(outcomes: &[CaseOutcome]) -> BTreeMap<Action, BucketStats> {
    Action::ALL
        .into_iter()
        .map(|action| {
            let items: Vec<&CaseOutcome> =
                outcomes.iter().filter(|o| o.action == action).collect();
            let count = items.len();
            let fraud_count = items.iter().filter(|o| o.is_fraud()).count();
            let (fraud_rate, avg_model_proba) = if count == 0 {
                (None, None)
            } else {
                let proba_sum: f64 = items.iter().map(|o| o.proba).sum();
                (
                    Some(fraud_count as f64 / count as f64),
                    Some(proba_sum / count as f64),
                )
            };
            (
                action,
                BucketStats {
                    count,
                    fraud_count,
                    fraud_rate,
                    avg_model_proba,
                },
            )
        })
        .collect()
}

pub fn overall_fraud_rate(outcomes: &[CaseOutcome]) -> Option<f64> {
    if outcomes.is_empty() {
        return None;
    }
    let fraud = outcomes.iter().filter(|o| o.is_fraud()).count();
    Some(fraud as f64 / outcomes.len() as f64)
}

fn fmt_rate(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

/// One line per action bucket.
pub fn render_buckets(stats: &BTreeMap<Action, BucketStats>) -> String {
    let mut out = String::new();
    for (action, s) in stats {
        let _ = writeln!(
            out,
            "{:>6} | count={:>4} | fraud_count={:>4} | fraud_rate={:<8} | avg_model_proba={}",
            action.as_str().to_uppercase(),
            s.count,
            s.fraud_count,
            fmt_rate(s.fraud_rate),
            fmt_rate(s.avg_model_proba),
        );
    }
    out
}

/// Upper edges of the neighbor-rate histogram for blocked cases. Unknown rates land
/// in their own bin.
const NEIGHBOR_RATE_BINS: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

/// Example rows per bucket plus a breakdown of what drove the blocks.
pub fn render_debug(outcomes: &[CaseOutcome]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== DEBUG: Example rows per bucket ===");
    for action in Action::ALL {
        let mut rows: Vec<&CaseOutcome> = outcomes.iter().filter(|o| o.action == action).collect();
        rows.sort_by(|a, b| b.proba.total_cmp(&a.proba));
        let _ = writeln!(
            out,
            "\n-- {} examples (top 10 by proba) --",
            action.as_str().to_uppercase()
        );
        if rows.is_empty() {
            let _ = writeln!(out, "(none)");
            continue;
        }
        let _ = writeln!(
            out,
            "{:>10} {:>5} {:>8} {:>9} {:>22} {:>14} {:>13} {:>11}",
            "tx_id",
            "label",
            "proba",
            "sig_score",
            "identity_missing_heavy",
            "email_mismatch",
            "neighbor_rate",
            "close_count"
        );
        for row in rows.iter().take(10) {
            let _ = writeln!(
                out,
                "{:>10} {:>5} {:>8.4} {:>9} {:>22} {:>14} {:>13} {:>11}",
                row.transaction_id,
                row.label,
                row.proba,
                row.signal_score,
                row.identity_missing_heavy,
                row.email_mismatch,
                fmt_rate(row.neighbor_rate),
                row.close_count
            );
        }
    }

    let blocked: Vec<&CaseOutcome> = outcomes
        .iter()
        .filter(|o| o.action == Action::Block)
        .collect();
    if blocked.is_empty() {
        return out;
    }

    let _ = writeln!(out, "\n=== DEBUG: BLOCK counts by neighbor_rate bucket ===");
    let unknown = blocked.iter().filter(|o| o.neighbor_rate.is_none()).count();
    let _ = writeln!(out, "{:<12} {}", "unknown", unknown);
    let mut lower: Option<f64> = None;
    for upper in NEIGHBOR_RATE_BINS {
        let count = blocked
            .iter()
            .filter_map(|o| o.neighbor_rate)
            .filter(|&r| r <= upper && lower.map_or(true, |l| r > l))
            .count();
        let label = match lower {
            None => format!("<= {:.1}", upper),
            Some(l) => format!("({:.1}, {:.1}]", l, upper),
        };
        let _ = writeln!(out, "{:<12} {}", label, count);
        lower = Some(upper);
    }

    let _ = writeln!(
        out,
        "\n=== DEBUG: How many blocked had identity_missing_heavy True? ==="
    );
    let heavy = blocked.iter().filter(|o| o.identity_missing_heavy).count();
    let _ = writeln!(out, "{:<6} {}", "False", blocked.len() - heavy);
    let _ = writeln!(out, "{:<6} {}", "True", heavy);

    out
}
