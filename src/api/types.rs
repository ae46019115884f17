use serde::{Deserialize, Serialize};

use crate::neighbors::{NeighborRecord, RetrievalProvenance};
use crate::policy::PolicyVersion;
use crate::signals::SignalResult;

// ============================================================
// Query params
// ============================================================

#[derive(Debug, Default, Deserialize)]
pub struct CaseParams {
    pub top_k: Option<usize>,
    pub max_distance: Option<f64>,
}

// ============================================================
// Request bodies
// ============================================================

#[derive(Debug, Deserialize)]
pub struct NeighborSummaryRequest {
    #[serde(default)]
    pub neighbors: Vec<NeighborRecord>,
    pub max_distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub proba: f64,
    #[serde(default)]
    pub signals: SignalResult,
    #[serde(default)]
    pub close_rate: Option<f64>,
    #[serde(default)]
    pub close_count: usize,
}

// ============================================================
// Responses
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub policy_version: PolicyVersion,
    pub retrieval: RetrievalProvenance,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}
