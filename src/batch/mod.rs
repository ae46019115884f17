pub mod dataset;
pub mod stats;

use futures::StreamExt;
use std::collections::BTreeMap;
use std::fmt::Write;
use tokio_util::sync::CancellationToken;

use crate::error::CaseError;
use crate::evidence::EvidenceProvider;
use crate::neighbors::NeighborRetriever;
use crate::policy::Action;
use crate::report::ReportAssembler;
use crate::scoring::ProbabilityScorer;

pub use dataset::{load_labeled_cases, read_labeled_cases, sample_cases, LabeledCase};
pub use stats::{compute_bucket_stats, overall_fraud_rate, BucketStats, CaseOutcome};

/// Failures listed in the summary before truncation.
const MAX_LISTED_FAILURES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct BatchParams {
    pub top_k: usize,
    pub max_distance: f64,
    pub concurrency: usize,
}

/// Result of a batch run. Cases that failed are listed with their error and do not
/// contribute to the bucket statistics.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub requested: usize,
    pub outcomes: Vec<CaseOutcome>,
    pub failures: Vec<(i64, String)>,
    /// Set when shutdown was requested before every case finished.
    pub interrupted: bool,
}

impl BatchSummary {
    pub fn bucket_stats(&self) -> BTreeMap<Action, BucketStats> {
        compute_bucket_stats(&self.outcomes)
    }

    pub fn overall_fraud_rate(&self) -> Option<f64> {
        overall_fraud_rate(&self.outcomes)
    }

    pub fn render(&self, params: &BatchParams, source: &str, debug: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Batch Policy Evaluation ===");
        let _ = writeln!(out, "Data: {}", source);
        let _ = writeln!(
            out,
            "Sample size requested: {} | evaluated: {} | failures: {}{}",
            self.requested,
            self.outcomes.len(),
            self.failures.len(),
            if self.interrupted { " | interrupted" } else { "" }
        );
        let _ = writeln!(
            out,
            "top_k={} | max_distance={}\n",
            params.top_k, params.max_distance
        );
        out.push_str(&stats::render_buckets(&self.bucket_stats()));

        if let Some(rate) = self.overall_fraud_rate() {
            let _ = writeln!(out, "\nOverall sample fraud rate: {:.4}", rate);
        }

        if debug && !self.outcomes.is_empty() {
            out.push('\n');
            out.push_str(&stats::render_debug(&self.outcomes));
        }

        if !self.failures.is_empty() {
            let _ = writeln!(out, "\n=== Failures (first {}) ===", MAX_LISTED_FAILURES);
            for (id, error) in self.failures.iter().take(MAX_LISTED_FAILURES) {
                let _ = writeln!(out, "{}: {}", id, error);
            }
        }
        out
    }
}

/// Evaluate every case through the assembler with bounded concurrency.
///
/// Per-case failures are recorded and the run continues, except `ModelUnavailable`,
/// which no later case can recover from and is returned immediately. Cancelling
/// `shutdown` stops the run and returns what finished so far.
pub async fn run_batch<E, S, R>(
    assembler: &ReportAssembler<E, S, R>,
    cases: &[LabeledCase],
    params: BatchParams,
    shutdown: &CancellationToken,
) -> Result<BatchSummary, CaseError>
where
    E: EvidenceProvider,
    S: ProbabilityScorer,
    R: NeighborRetriever,
{
    let mut summary = BatchSummary {
        requested: cases.len(),
        ..Default::default()
    };

    let mut results = futures::stream::iter(cases.iter().copied().enumerate())
        .map(|(index, case)| async move {
            let result = assembler
                .build_report(case.transaction_id, params.top_k, params.max_distance)
                .await;
            (index, case, result)
        })
        .buffer_unordered(params.concurrency.max(1));

    let mut finished: Vec<(usize, CaseOutcome)> = Vec::with_capacity(cases.len());
    let mut failed: Vec<(usize, i64, String)> = Vec::new();

    loop {
        tokio::select! {
            next = results.next() => {
                let Some((index, case, result)) = next else {
                    break;
                };
                match result {
                    Ok(report) => {
                        finished.push((index, CaseOutcome::from_report(&report, case.label)));
                    }
                    Err(e) if e.is_fatal_for_run() => {
                        tracing::error!(
                            transaction_id = case.transaction_id,
                            error = %e,
                            "Aborting batch run"
                        );
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::warn!(
                            transaction_id = case.transaction_id,
                            kind = e.kind(),
                            error = %e,
                            "Case failed"
                        );
                        failed.push((index, case.transaction_id, e.to_string()));
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!(
                    completed = finished.len() + failed.len(),
                    total = cases.len(),
                    "Shutdown received, stopping batch"
                );
                summary.interrupted = true;
                break;
            }
        }
    }

    // Report in sample order regardless of completion order.
    finished.sort_by_key(|(index, _)| *index);
    failed.sort_by_key(|(index, _, _)| *index);
    summary.outcomes = finished.into_iter().map(|(_, o)| o).collect();
    summary.failures = failed.into_iter().map(|(_, id, e)| (id, e)).collect();

    tracing::info!(
        evaluated = summary.outcomes.len(),
        failures = summary.failures.len(),
        "Batch run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::evidence::Evidence;
    use crate::neighbors::{NeighborRecord, RetrievalProvenance};
    use crate::policy::DecisionPolicy;

    struct MapEvidence(HashMap<i64, Evidence>);

    impl EvidenceProvider for MapEvidence {
        async fn get_evidence(&self, transaction_id: i64) -> Result<Evidence, CaseError> {
            self.0
                .get(&transaction_id)
                .cloned()
                .ok_or(CaseError::NotFound(transaction_id))
        }
    }

    /// Fails with `ModelUnavailable` for the configured id.
    struct FixedScorer {
        proba: f64,
        broken_for: Option<i64>,
    }

    impl ProbabilityScorer for FixedScorer {
        async fn score(&self, transaction_id: i64) -> Result<f64, CaseError> {
            if self.broken_for == Some(transaction_id) {
                return Err(CaseError::ModelUnavailable("artifact missing".to_string()));
            }
            Ok(self.proba)
        }
    }

    struct NoIndex;

    impl NeighborRetriever for NoIndex {
        async fn retrieve(
            &self,
            _query_text: &str,
            _top_k: usize,
        ) -> Result<Vec<NeighborRecord>, CaseError> {
            Err(CaseError::RetrievalUnavailable("no index".to_string()))
        }

        fn provenance(&self) -> RetrievalProvenance {
            RetrievalProvenance {
                index_path: "none".to_string(),
                collection: "none".to_string(),
            }
        }
    }

    fn params() -> BatchParams {
        BatchParams {
            top_k: 5,
            max_distance: 0.25,
            concurrency: 4,
        }
    }

    fn assembler(
        known: &[i64],
        proba: f64,
        broken_for: Option<i64>,
    ) -> ReportAssembler<MapEvidence, FixedScorer, NoIndex> {
        let evidence = known.iter().map(|&id| (id, Evidence::default())).collect();
        ReportAssembler::new(
            MapEvidence(evidence),
            FixedScorer { proba, broken_for },
            NoIndex,
            DecisionPolicy::default(),
        )
    }

    fn cases(ids: &[i64]) -> Vec<LabeledCase> {
        ids.iter()
            .map(|&id| LabeledCase {
                transaction_id: id,
                label: id % 2,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_case() {
        let assembler = assembler(&[1, 2, 4], 0.99, None);
        let shutdown = CancellationToken::new();
        let summary = run_batch(&assembler, &cases(&[1, 2, 3, 4]), params(), &shutdown)
            .await
            .unwrap();

        assert_eq!(summary.requested, 4);
        let ids: Vec<i64> = summary.outcomes.iter().map(|o| o.transaction_id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert!(summary.outcomes.iter().all(|o| o.action == Action::Block));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, 3);
        assert!(summary.failures[0].1.contains("not found"));
        assert!(!summary.interrupted);

        let stats = summary.bucket_stats();
        assert_eq!(stats[&Action::Block].count, 3);
        assert_eq!(stats[&Action::Block].fraud_count, 1);
    }

    #[tokio::test]
    async fn test_model_unavailable_aborts_run() {
        let assembler = assembler(&[1, 2, 3], 0.5, Some(2));
        let shutdown = CancellationToken::new();
        let err = run_batch(&assembler, &cases(&[1, 2, 3]), params(), &shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_partial_summary() {
        let assembler = assembler(&[1, 2], 0.1, None);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let summary = run_batch(&assembler, &cases(&[1, 2]), params(), &shutdown)
            .await
            .unwrap();
        assert_eq!(summary.requested, 2);
        assert!(summary.outcomes.len() + summary.failures.len() <= 2);
    }

    #[test]
    fn test_render_lists_failures() {
        let summary = BatchSummary {
            requested: 2,
            outcomes: Vec::new(),
            failures: vec![(7, "transaction 7 not found".to_string())],
            interrupted: false,
        };
        let text = summary.render(&params(), "cases.csv", false);
        assert!(text.contains("Sample size requested: 2 | evaluated: 0 | failures: 1"));
        assert!(text.contains("7: transaction 7 not found"));
        assert!(!text.contains("Overall sample fraud rate"));
    }
}
