use chrono::{SecondsFormat, Utc};

use crate::error::CaseError;
use crate::evidence::EvidenceProvider;
use crate::neighbors::{summarize, NeighborRetriever};
use crate::policy::{DecisionInput, DecisionPolicy};
use crate::scoring::ProbabilityScorer;
use crate::signals::compute_signals;

use super::narrative;
use super::types::{case_id, CaseReport, Explanation, DECISION_LOGIC};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_DISTANCE: f64 = 0.25;

/// Orchestrates one decision:
/// 1. Evidence lookup, then signals and query text
/// 2. Model probability
/// 3. Similar-case retrieval and neighbor statistics
/// 4. Policy decision
/// 5. Explanation text
///
/// Holds no per-case state, so one assembler can serve concurrent cases.
pub struct ReportAssembler<E, S, R> {
    evidence: E,
    scorer: S,
    retriever: R,
    policy: DecisionPolicy,
}

impl<E, S, R> ReportAssembler<E, S, R>
where
    E: EvidenceProvider,
    S: ProbabilityScorer,
    R: NeighborRetriever,
{
    pub fn new(evidence: E, scorer: S, retriever: R, policy: DecisionPolicy) -> Self {
        Self {
            evidence,
            scorer,
            retriever,
            policy,
        }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Build the case report for one transaction.
    ///
    /// Evidence and scoring failures are returned as-is. An unavailable case index only
    /// removes precedent from the decision.
    pub async fn build_report(
        &self,
        transaction_id: i64,
        top_k: usize,
        max_distance: f64,
    ) -> Result<CaseReport, CaseError> {
        let evidence = self.evidence.get_evidence(transaction_id).await?;
        let signals = compute_signals(&evidence);
        let query_text = evidence.query_text();

        let fraud_proba = self.scorer.score(transaction_id).await?;
        if !(0.0..=1.0).contains(&fraud_proba) {
            tracing::warn!(transaction_id, fraud_proba, "Scorer returned probability outside [0, 1]");
        }

        let similar_cases = match self.retriever.retrieve(&query_text, top_k).await {
            Ok(neighbors) => neighbors,
            Err(CaseError::RetrievalUnavailable(reason)) => {
                tracing::warn!(transaction_id, %reason, "Retrieval unavailable, deciding without precedent");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let neighbor_stats = summarize(&similar_cases, max_distance);

        let decision = self.policy.evaluate(&DecisionInput {
            proba: fraud_proba,
            signals: &signals,
            close_rate: neighbor_stats.close_rate,
            close_count: neighbor_stats.close_count,
        });

        tracing::info!(
            transaction_id,
            fraud_proba,
            action = decision.action.as_str(),
            rule = decision.rule,
            signal_score = signals.signal_score,
            close_count = neighbor_stats.close_count,
            close_rate = ?neighbor_stats.close_rate,
            "Case decided"
        );

        let explanation = Explanation {
            decision_logic: DECISION_LOGIC,
            policy_version: decision.policy_version,
            decision_rule: decision.rule,
            signal_reasons: signals.signal_reasons.clone(),
            precedent_summary: narrative::precedent_summary(&neighbor_stats),
            evidence_bullets: narrative::evidence_bullets(&evidence),
            investigator_narrative: narrative::investigator_narrative(
                decision.action,
                fraud_proba,
                &evidence,
            ),
            retrieval: self.retriever.provenance(),
        };

        Ok(CaseReport {
            case_id: case_id(transaction_id),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            transaction_id,
            fraud_proba,
            recommended_action: decision.action,
            neighbor_fraud_rate_close: neighbor_stats.close_rate,
            neighbor_close_count: neighbor_stats.close_count,
            neighbor_fraud_rate_all: neighbor_stats.all_neighbors.rate,
            neighbor_all_count: neighbor_stats.all_neighbors.count,
            signals,
            evidence,
            similar_cases,
            neighbor_stats,
            explanation,
        })
    }
}
