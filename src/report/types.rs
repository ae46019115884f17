use serde::Serialize;

use crate::evidence::Evidence;
use crate::neighbors::{NeighborRecord, NeighborStats, RetrievalProvenance};
use crate::policy::{Action, PolicyVersion};
use crate::signals::SignalResult;

pub const DECISION_LOGIC: &str =
    "Action is based on model probability, rule signals, and close neighbor precedent.";

/// Human-readable account of how the action was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub decision_logic: &'static str,
    pub policy_version: PolicyVersion,
    pub decision_rule: &'static str,
    pub signal_reasons: Vec<String>,
    pub precedent_summary: String,
    pub evidence_bullets: Vec<String>,
    pub investigator_narrative: String,
    pub retrieval: RetrievalProvenance,
}

/// The externally visible artifact of one decision. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub case_id: String,
    /// UTC, RFC 3339 with a `Z` suffix.
    pub created_at: String,
    pub transaction_id: i64,
    pub fraud_proba: f64,
    pub recommended_action: Action,
    pub signals: SignalResult,
    pub evidence: Evidence,
    pub similar_cases: Vec<NeighborRecord>,
    pub neighbor_stats: NeighborStats,
    pub neighbor_fraud_rate_close: Option<f64>,
    pub neighbor_close_count: usize,
    pub neighbor_fraud_rate_all: Option<f64>,
    pub neighbor_all_count: usize,
    pub explanation: Explanation,
}

pub fn case_id(transaction_id: i64) -> String {
    format!("CASE-{}", transaction_id)
}
