use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::db::repository::TransactionStore;
use crate::error::CaseError;

/// Encoded value for anything the model cannot read (null, NaN, unseen category).
const MISSING: f64 = -1.0;

/// Source of the model's fraud probability for a transaction.
pub trait ProbabilityScorer: Send + Sync {
    /// Probability in [0, 1]. `CaseError::ModelUnavailable` when no artifact is loaded.
    fn score(&self, transaction_id: i64) -> impl Future<Output = Result<f64, CaseError>> + Send;
}

/// Exported linear classifier: `logistic(intercept + sum(coef * feature))`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub model_version: String,
    /// Feature columns in training order.
    pub columns: Vec<String>,
    pub intercept: f64,
    pub coefficients: HashMap<String, f64>,
    /// Category codes per string column, as assigned at training time.
    #[serde(default)]
    pub categories: HashMap<String, HashMap<String, f64>>,
}

impl ModelArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CaseError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CaseError::ModelUnavailable(format!(
                "model artifact not found at '{}'",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CaseError::ModelUnavailable(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CaseError> {
        let artifact: ModelArtifact = serde_json::from_str(content)
            .map_err(|e| CaseError::ModelUnavailable(format!("corrupt model artifact: {}", e)))?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), CaseError> {
        if self.columns.is_empty() {
            return Err(CaseError::ModelUnavailable(
                "model artifact has no feature columns".to_string(),
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.values().any(|w| !w.is_finite()) {
            return Err(CaseError::ModelUnavailable(
                "model artifact has non-finite weights".to_string(),
            ));
        }
        Ok(())
    }

    /// Encode one row the way the training pipeline did. Columns absent from the row
    /// are treated as missing.
    pub fn encode(&self, row: &Map<String, JsonValue>) -> Vec<f64> {
        self.columns
            .iter()
            .map(|col| match row.get(col) {
                None | Some(JsonValue::Null) => MISSING,
                Some(JsonValue::Bool(b)) => f64::from(u8::from(*b)),
                Some(JsonValue::Number(n)) => n
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .unwrap_or(MISSING),
                Some(JsonValue::String(s)) if s == "NaN" => MISSING,
                Some(JsonValue::String(s)) => self
                    .categories
                    .get(col)
                    .and_then(|codes| codes.get(s))
                    .copied()
                    .unwrap_or(MISSING),
                Some(_) => MISSING,
            })
            .collect()
    }

    pub fn predict(&self, row: &Map<String, JsonValue>) -> f64 {
        let features = self.encode(row);
        let z = self
            .columns
            .iter()
            .zip(features)
            .fold(self.intercept, |acc, (col, x)| {
                acc + self.coefficients.get(col).copied().unwrap_or(0.0) * x
            });
        logistic(z)
    }
}

fn logistic(z: f64) -> f64 {
    (1.0 / (1.0 + (-z).exp())).clamp(0.0, 1.0)
}

/// Scores transactions with a [`ModelArtifact`] over rows from the transaction store.
#[derive(Clone)]
pub struct LogisticScorer {
    artifact: Arc<ModelArtifact>,
    store: TransactionStore,
}

impl LogisticScorer {
    pub fn load(path: impl AsRef<Path>, store: TransactionStore) -> Result<Self, CaseError> {
        let artifact = ModelArtifact::load(&path)?;
        tracing::info!(
            model_version = %artifact.model_version,
            features = artifact.columns.len(),
            path = %path.as_ref().display(),
            "Model artifact loaded"
        );
        Ok(Self {
            artifact: Arc::new(artifact),
            store,
        })
    }

    pub fn model_version(&self) -> &str {
        &self.artifact.model_version
    }
}

impl ProbabilityScorer for LogisticScorer {
    async fn score(&self, transaction_id: i64) -> Result<f64, CaseError> {
        let row = self
            .store
            .fetch_row(transaction_id)
            .await?
            .ok_or(CaseError::NotFound(transaction_id))?;
        Ok(self.artifact.predict(&row))
    }
}
