/// Failures a single case can hit while its report is being assembled.
///
/// Only collaborator failures end up here. The pure components (signals, neighbor
/// statistics, policy) are total and never produce one.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// Unknown transaction id. Fatal for that case, never retried.
    #[error("transaction {0} not found")]
    NotFound(i64),

    /// Missing or corrupt scoring artifact. Fatal for the whole run.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Case index absent. Recoverable: the assembler degrades to no neighbors.
    #[error("retrieval index unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl CaseError {
    /// Whether no further case in the same run can succeed after this error.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::RetrievalUnavailable(_) => "retrieval_unavailable",
            Self::Database(_) => "database",
            Self::Malformed(_) => "malformed",
        }
    }
}
