use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::error::CaseError;
use crate::evidence::{Evidence, EvidenceProvider};
use crate::neighbors::{summarize, NeighborRetriever, NeighborStats};
use crate::policy::{Decision, DecisionInput};
use crate::report::CaseReport;
use crate::scoring::ProbabilityScorer;
use crate::signals::{compute_signals, SignalResult};

use super::types::*;
use super::AppState;

/// Upper bound on neighbors a single request may ask for.
pub const MAX_TOP_K: usize = 50;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(
    status: StatusCode,
    kind: &str,
    msg: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
            kind: kind.to_string(),
        }),
    )
}

fn case_error(e: CaseError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        CaseError::NotFound(_) => StatusCode::NOT_FOUND,
        CaseError::ModelUnavailable(_) | CaseError::RetrievalUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CaseError::Database(_) | CaseError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(kind = e.kind(), error = %e, "Case request failed");
    }
    api_error(status, e.kind(), e.to_string())
}

fn parse_max_distance(
    value: Option<f64>,
    default: f64,
) -> Result<f64, (StatusCode, Json<ErrorResponse>)> {
    let max_distance = value.unwrap_or(default);
    if !max_distance.is_finite() || max_distance < 0.0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            format!("max_distance must be a non-negative number, got {}", max_distance),
        ));
    }
    Ok(max_distance)
}

// ============================================================
// Health
// ============================================================

pub async fn health<E, S, R>(State(state): State<Arc<AppState<E, S, R>>>) -> Json<HealthResponse>
where
    E: EvidenceProvider,
    S: ProbabilityScorer,
    R: NeighborRetriever,
{
    Json(HealthResponse {
        status: "ok".to_string(),
        policy_version: state.assembler.policy().version(),
        retrieval: state.assembler.retriever().provenance(),
    })
}

// ============================================================
// Cases
// ============================================================

pub async fn case_report<E, S, R>(
    State(state): State<Arc<AppState<E, S, R>>>,
    Path(transaction_id): Path<i64>,
    Query(params): Query<CaseParams>,
) -> ApiResult<CaseReport>
where
    E: EvidenceProvider,
    S: ProbabilityScorer,
    R: NeighborRetriever,
{
    let top_k = params.top_k.unwrap_or(state.default_top_k);
    if top_k == 0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "top_k must be at least 1",
        ));
    }
    let top_k = top_k.min(MAX_TOP_K);
    let max_distance = parse_max_distance(params.max_distance, state.default_max_distance)?;

    state
        .assembler
        .build_report(transaction_id, top_k, max_distance)
        .await
        .map(Json)
        .map_err(case_error)
}

// ============================================================
// Pure components
// ============================================================

pub async fn signals(Json(evidence): Json<Evidence>) -> Json<SignalResult> {
    Json(compute_signals(&evidence))
}

pub async fn neighbor_summary<E, S, R>(
    State(state): State<Arc<AppState<E, S, R>>>,
    Json(req): Json<NeighborSummaryRequest>,
) -> ApiResult<NeighborStats>
where
    E: EvidenceProvider,
    S: ProbabilityScorer,
    R: NeighborRetriever,
{
    let max_distance = parse_max_distance(req.max_distance, state.default_max_distance)?;
    Ok(Json(summarize(&req.neighbors, max_distance)))
}

pub async fn decide<E, S, R>(
    State(state): State<Arc<AppState<E, S, R>>>,
    Json(req): Json<DecideRequest>,
) -> Json<Decision>
where
    E: EvidenceProvider,
    S: ProbabilityScorer,
    R: NeighborRetriever,
{
    Json(state.assembler.policy().evaluate(&DecisionInput {
        proba: req.proba,
        signals: &req.signals,
        close_rate: req.close_rate,
        close_count: req.close_count,
    }))
}
