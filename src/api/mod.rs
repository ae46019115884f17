pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::evidence::{EvidenceProvider, PgEvidenceProvider};
use crate::neighbors::{CaseIndexRetriever, NeighborRetriever};
use crate::report::ReportAssembler;
use crate::scoring::{LogisticScorer, ProbabilityScorer};

pub struct AppState<E, S, R> {
    pub assembler: ReportAssembler<E, S, R>,
    pub default_top_k: usize,
    pub default_max_distance: f64,
}

/// State wired to the Postgres evidence store, model artifact and file-backed index.
pub type PgAppState = AppState<PgEvidenceProvider, LogisticScorer, CaseIndexRetriever>;

pub fn router<E, S, R>(state: AppState<E, S, R>) -> Router
where
    E: EvidenceProvider + 'static,
    S: ProbabilityScorer + 'static,
    R: NeighborRetriever + 'static,
{
    let state = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(handlers::health::<E, S, R>))
        .route(
            "/api/v1/cases/{transaction_id}",
            get(handlers::case_report::<E, S, R>),
        )
        .route("/api/v1/signals", post(handlers::signals))
        .route(
            "/api/v1/neighbors/summary",
            post(handlers::neighbor_summary::<E, S, R>),
        )
        .route("/api/v1/decide", post(handlers::decide::<E, S, R>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve<E, S, R>(
    state: AppState<E, S, R>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()>
where
    E: EvidenceProvider + 'static,
    S: ProbabilityScorer + 'static,
    R: NeighborRetriever + 'static,
{
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
