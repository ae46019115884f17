use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use caseguard::error::CaseError;
use caseguard::evidence::{Evidence, EvidenceProvider};
use caseguard::neighbors::{NeighborLabel, NeighborRecord, NeighborRetriever, RetrievalProvenance};
use caseguard::policy::{Action, DecisionPolicy, PolicyVersion};
use caseguard::scoring::ProbabilityScorer;
use caseguard::ReportAssembler;

struct MemoryEvidence(HashMap<i64, Evidence>);

impl EvidenceProvider for MemoryEvidence {
    async fn get_evidence(&self, transaction_id: i64) -> Result<Evidence, CaseError> {
        self.0
            .get(&transaction_id)
            .cloned()
            .ok_or(CaseError::NotFound(transaction_id))
    }
}

struct MemoryScorer(HashMap<i64, f64>);

impl ProbabilityScorer for MemoryScorer {
    async fn score(&self, transaction_id: i64) -> Result<f64, CaseError> {
        self.0
            .get(&transaction_id)
            .copied()
            .ok_or_else(|| CaseError::ModelUnavailable("no artifact loaded".to_string()))
    }
}

enum MemoryIndex {
    Cases(Vec<NeighborRecord>),
    Missing,
    Broken,
}

/// Counts calls so tests can check retrieval happened after scoring.
struct CountingIndex {
    index: MemoryIndex,
    calls: AtomicUsize,
}

impl CountingIndex {
    fn new(index: MemoryIndex) -> Self {
        Self {
            index,
            calls: AtomicUsize::new(0),
        }
    }
}

impl NeighborRetriever for CountingIndex {
    async fn retrieve(
        &self,
        _query_text: &str,
        top_k: usize,
    ) -> Result<Vec<NeighborRecord>, CaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.index {
            MemoryIndex::Cases(cases) => Ok(cases.iter().take(top_k).cloned().collect()),
            MemoryIndex::Missing => Err(CaseError::RetrievalUnavailable(
                "index file missing".to_string(),
            )),
            MemoryIndex::Broken => Err(CaseError::Malformed("index corrupt".to_string())),
        }
    }

    fn provenance(&self) -> RetrievalProvenance {
        RetrievalProvenance {
            index_path: "memory".to_string(),
            collection: "fraud_cases".to_string(),
        }
    }
}

fn neighbor(id: i64, label: i64, distance: f64) -> NeighborRecord {
    NeighborRecord {
        transaction_id: Some(id),
        label: Some(NeighborLabel::Int(label)),
        document: format!("TransactionID={} | amount=50.0", id),
        distance: Some(distance),
    }
}

fn assembler(
    evidence: Evidence,
    proba: f64,
    index: MemoryIndex,
) -> ReportAssembler<MemoryEvidence, MemoryScorer, CountingIndex> {
    ReportAssembler::new(
        MemoryEvidence(HashMap::from([(1, evidence)])),
        MemoryScorer(HashMap::from([(1, proba)])),
        CountingIndex::new(index),
        DecisionPolicy::default(),
    )
}

#[tokio::test]
async fn test_scenario_a_high_probability_blocks() {
    let evidence = Evidence {
        identity_missing_ratio: Some(1.0),
        ..Default::default()
    };
    let cases = (10..15).map(|id| neighbor(id, 0, 0.05)).collect();
    let report = assembler(evidence, 0.98, MemoryIndex::Cases(cases))
        .build_report(1, 5, 0.25)
        .await
        .unwrap();

    assert_eq!(report.recommended_action, Action::Block);
    assert_eq!(report.explanation.decision_rule, "model_block");
    assert_eq!(report.neighbor_close_count, 5);
    assert_eq!(report.neighbor_fraud_rate_close, Some(0.0));
}

#[tokio::test]
async fn test_scenario_b_strong_rules_review() {
    let evidence = Evidence {
        amount: Some(1500.0),
        p_emaildomain: Some("gmail.com".to_string()),
        r_emaildomain: Some("yahoo.com".to_string()),
        ..Default::default()
    };
    let report = assembler(evidence, 0.65, MemoryIndex::Cases(Vec::new()))
        .build_report(1, 5, 0.25)
        .await
        .unwrap();

    assert!(report.signals.high_amount);
    assert!(report.signals.email_mismatch);
    assert_eq!(report.signals.signal_score, 2);
    assert_eq!(report.recommended_action, Action::Review);
    assert_eq!(report.explanation.decision_rule, "rules_review");
    assert_eq!(
        report.explanation.signal_reasons,
        vec![
            "High amount threshold triggered.".to_string(),
            "P and R email domain mismatch.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_scenario_c_quiet_case_allows() {
    let report = assembler(Evidence::default(), 0.50, MemoryIndex::Cases(Vec::new()))
        .build_report(1, 5, 0.25)
        .await
        .unwrap();

    assert_eq!(report.recommended_action, Action::Allow);
    assert_eq!(report.explanation.decision_rule, "default_allow");
    assert_eq!(report.neighbor_stats.all_neighbors.count, 0);
    assert_eq!(report.neighbor_stats.all_neighbors.rate, None);
    assert_eq!(report.neighbor_stats.ui_rate, None);
    assert_eq!(report.explanation.precedent_summary, "");
}

#[tokio::test]
async fn test_scenario_d_neighbor_override_reviews() {
    // 19 of 20 close neighbors are fraud: rate 0.95.
    let mut cases: Vec<NeighborRecord> = (0..19).map(|id| neighbor(id, 1, 0.1)).collect();
    cases.push(neighbor(19, 0, 0.2));
    let report = assembler(Evidence::default(), 0.65, MemoryIndex::Cases(cases))
        .build_report(1, 20, 0.25)
        .await
        .unwrap();

    assert_eq!(report.neighbor_close_count, 20);
    assert_eq!(report.neighbor_fraud_rate_close, Some(0.95));
    assert_eq!(report.recommended_action, Action::Review);
    assert_eq!(report.explanation.decision_rule, "neighbor_review");
    assert_eq!(
        report.explanation.precedent_summary,
        "Close neighbors (distance <= 0.25): 19/20 fraud (rate 0.95)."
    );
}

#[tokio::test]
async fn test_too_few_close_neighbors_do_not_override() {
    let cases = (0..4).map(|id| neighbor(id, 1, 0.1)).collect();
    let report = assembler(Evidence::default(), 0.65, MemoryIndex::Cases(cases))
        .build_report(1, 5, 0.25)
        .await
        .unwrap();

    assert_eq!(report.neighbor_close_count, 4);
    assert_eq!(report.neighbor_fraud_rate_close, Some(1.0));
    assert_eq!(report.recommended_action, Action::Allow);
}

#[tokio::test]
async fn test_missing_index_degrades_to_no_precedent() {
    let assembler = assembler(Evidence::default(), 0.95, MemoryIndex::Missing);
    let report = assembler.build_report(1, 5, 0.25).await.unwrap();

    assert!(report.similar_cases.is_empty());
    assert_eq!(report.neighbor_all_count, 0);
    assert_eq!(report.neighbor_fraud_rate_all, None);
    assert_eq!(report.recommended_action, Action::Review);
    assert_eq!(assembler.retriever().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_other_retrieval_errors_propagate() {
    let err = assembler(Evidence::default(), 0.95, MemoryIndex::Broken)
        .build_report(1, 5, 0.25)
        .await
        .unwrap_err();
    assert!(matches!(err, CaseError::Malformed(_)));
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let assembler = assembler(Evidence::default(), 0.5, MemoryIndex::Cases(Vec::new()));
    let err = assembler.build_report(42, 5, 0.25).await.unwrap_err();

    assert!(matches!(err, CaseError::NotFound(42)));
    assert!(!err.is_fatal_for_run());
    assert_eq!(assembler.retriever().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_model_unavailable_propagates() {
    let assembler = ReportAssembler::new(
        MemoryEvidence(HashMap::from([(1, Evidence::default())])),
        MemoryScorer(HashMap::new()),
        CountingIndex::new(MemoryIndex::Cases(Vec::new())),
        DecisionPolicy::default(),
    );
    let err = assembler.build_report(1, 5, 0.25).await.unwrap_err();

    assert!(matches!(err, CaseError::ModelUnavailable(_)));
    assert!(err.is_fatal_for_run());
    assert_eq!(assembler.retriever().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_report_fields_and_serialization() {
    let evidence = Evidence {
        amount: Some(68.5),
        entity_key_used: Some("card1_only".to_string()),
        entity_tx_count_10m: Some(1),
        entity_tx_count_1h: Some(2),
        entity_tx_count_24h: Some(3),
        ..Default::default()
    };
    let cases = vec![neighbor(7, 1, 0.1), neighbor(8, 0, 0.5)];
    let report = assembler(evidence, 0.12, MemoryIndex::Cases(cases))
        .build_report(1, 5, 0.25)
        .await
        .unwrap();

    assert_eq!(report.case_id, "CASE-1");
    assert_eq!(report.transaction_id, 1);
    assert!(report.created_at.ends_with('Z'));
    assert_eq!(report.neighbor_all_count, 2);
    assert_eq!(report.neighbor_fraud_rate_all, Some(0.5));
    assert_eq!(report.neighbor_close_count, 1);
    assert_eq!(report.explanation.policy_version, PolicyVersion::V9);
    assert_eq!(report.explanation.retrieval.collection, "fraud_cases");
    assert!(report
        .explanation
        .investigator_narrative
        .ends_with("Recommendation: allow, but monitor for repeated activity or pattern escalation."));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["recommended_action"], "allow");
    assert_eq!(json["explanation"]["policy_version"], "v9");
    assert_eq!(json["evidence"]["amount"], 68.5);
    assert_eq!(json["neighbor_stats"]["close_neighbors"]["fraud"], 1);
    assert!(json["neighbor_stats"]["close_rate"].is_number());
}

#[tokio::test]
async fn test_model_only_policy_version() {
    let assembler = ReportAssembler::new(
        MemoryEvidence(HashMap::from([(1, Evidence::default())])),
        MemoryScorer(HashMap::from([(1, 0.91)])),
        CountingIndex::new(MemoryIndex::Missing),
        DecisionPolicy::for_version(PolicyVersion::V1),
    );
    let report = assembler.build_report(1, 5, 0.25).await.unwrap();
    assert_eq!(report.recommended_action, Action::Block);
    assert_eq!(report.explanation.policy_version, PolicyVersion::V1);
}
