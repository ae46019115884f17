use serde_json::{Map, Value as JsonValue};
use std::future::Future;

use crate::db::repository::{EntityKey, TransactionStore};
use crate::error::CaseError;
use crate::lenient;

use super::types::{Evidence, CONTEXT_FIELDS};

/// Identity completeness at or above this ratio means identity is "largely missing".
const IDENTITY_ABSENT_RATIO: f64 = 0.95;

/// Source of per-transaction evidence.
pub trait EvidenceProvider: Send + Sync {
    /// Build the evidence record for a transaction. Unknown ids yield `CaseError::NotFound`.
    fn get_evidence(
        &self,
        transaction_id: i64,
    ) -> impl Future<Output = Result<Evidence, CaseError>> + Send;
}

/// Evidence built from the joined transaction table in Postgres.
#[derive(Clone)]
pub struct PgEvidenceProvider {
    store: TransactionStore,
    amount_high_threshold: f64,
}

impl PgEvidenceProvider {
    pub fn new(store: TransactionStore, amount_high_threshold: f64) -> Self {
        Self {
            store,
            amount_high_threshold,
        }
    }
}

impl EvidenceProvider for PgEvidenceProvider {
    async fn get_evidence(&self, transaction_id: i64) -> Result<Evidence, CaseError> {
        let row = self
            .store
            .fetch_row(transaction_id)
            .await?
            .ok_or(CaseError::NotFound(transaction_id))?;

        let mut evidence = evidence_from_row(&row, self.amount_high_threshold);

        // Velocity needs a timestamp and at least card1 to resolve an entity.
        if let (Some(_), Some(key)) = (evidence.transaction_dt, select_entity_key(&row)) {
            let counts = self.store.velocity_counts(transaction_id, key).await?;
            evidence.entity_key_used = Some(key.as_str().to_string());
            evidence.entity_tx_count_10m = Some(counts.count_10m);
            evidence.entity_tx_count_1h = Some(counts.count_1h);
            evidence.entity_tx_count_24h = Some(counts.count_24h);
        }

        tracing::debug!(
            transaction_id,
            entity_key = ?evidence.entity_key_used,
            identity_missing_ratio = ?evidence.identity_missing_ratio,
            "Evidence built"
        );

        Ok(evidence)
    }
}

/// Everything derivable from the row alone. Velocity fields are left unknown.
pub fn evidence_from_row(row: &Map<String, JsonValue>, amount_high_threshold: f64) -> Evidence {
    let (identity_present, identity_missing_ratio, identity_cols_count) = identity_presence(row);
    let amount = row_f64(row, "TransactionAmt");

    let mut context = std::collections::BTreeMap::new();
    for key in CONTEXT_FIELDS {
        if let Some(value) = row.get(key) {
            let value = if is_missing(value) {
                JsonValue::Null
            } else {
                value.clone()
            };
            context.insert(key.to_string(), value);
        }
    }

    Evidence {
        amount,
        amount_high: amount.map(|a| a >= amount_high_threshold),
        entity_key_used: None,
        entity_tx_count_10m: None,
        entity_tx_count_1h: None,
        entity_tx_count_24h: None,
        transaction_dt: row_i64(row, "TransactionDT"),
        identity_present,
        identity_missing_ratio,
        identity_cols_count,
        p_emaildomain: row_string(row, "P_emaildomain"),
        r_emaildomain: row_string(row, "R_emaildomain"),
        context,
    }
}

/// Share of identity columns (`id_*`, `DeviceType`, `DeviceInfo`) that are missing.
///
/// Returns `(present, missing_ratio, column_count)`; both values are unknown when the
/// row carries no identity columns at all.
pub fn identity_presence(row: &Map<String, JsonValue>) -> (Option<bool>, Option<f64>, usize) {
    let identity_cols: Vec<&JsonValue> = row
        .iter()
        .filter(|(k, _)| k.starts_with("id_") || *k == "DeviceType" || *k == "DeviceInfo")
        .map(|(_, v)| v)
        .collect();

    if identity_cols.is_empty() {
        return (None, None, 0);
    }

    let missing = identity_cols.iter().filter(|v| is_missing(v)).count();
    let ratio = missing as f64 / identity_cols.len() as f64;

    (
        Some(ratio < IDENTITY_ABSENT_RATIO),
        Some(ratio),
        identity_cols.len(),
    )
}

/// Pick the most specific entity key the row can resolve, if any.
pub fn select_entity_key(row: &Map<String, JsonValue>) -> Option<EntityKey> {
    let card1 = present(row, "card1");
    let addr1 = present(row, "addr1");
    let email = present(row, "P_emaildomain");

    match (card1, addr1, email) {
        (true, true, true) => Some(EntityKey::Full),
        (true, _, _) => Some(EntityKey::Card1Only),
        _ => None,
    }
}

/// Null, or the `"NaN"` string Postgres emits for NaN floats.
fn is_missing(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s == "NaN",
        _ => false,
    }
}

fn present(row: &Map<String, JsonValue>, key: &str) -> bool {
    row.get(key).map(|v| !is_missing(v)).unwrap_or(false)
}

fn row_f64(row: &Map<String, JsonValue>, key: &str) -> Option<f64> {
    row.get(key).and_then(lenient::value_as_f64)
}

fn row_i64(row: &Map<String, JsonValue>, key: &str) -> Option<i64> {
    row.get(key).and_then(lenient::value_as_i64)
}

fn row_string(row: &Map<String, JsonValue>, key: &str) -> Option<String> {
    row.get(key).and_then(lenient::value_as_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("test row must be an object"),
        }
    }

    #[test]
    fn test_identity_presence_without_identity_columns() {
        let r = row(json!({"TransactionID": 1, "TransactionAmt": 10.0}));
        assert_eq!(identity_presence(&r), (None, None, 0));
    }

    #[test]
    fn test_identity_presence_ratio() {
        let r = row(json!({
            "id_01": null,
            "id_02": 3.0,
            "id_03": null,
            "DeviceType": "desktop",
        }));
        let (present, ratio, count) = identity_presence(&r);
        assert_eq!(count, 4);
        assert_eq!(ratio, Some(0.5));
        assert_eq!(present, Some(true));
    }

    #[test]
    fn test_identity_fully_missing_is_not_present() {
        let r = row(json!({"id_01": null, "id_02": "NaN", "DeviceInfo": null}));
        let (present, ratio, _) = identity_presence(&r);
        assert_eq!(ratio, Some(1.0));
        assert_eq!(present, Some(false));
    }

    #[test]
    fn test_select_entity_key() {
        let full = row(json!({"card1": 1, "addr1": 2.0, "P_emaildomain": "x.com"}));
        assert_eq!(select_entity_key(&full), Some(EntityKey::Full));

        let card_only = row(json!({"card1": 1, "addr1": null, "P_emaildomain": "x.com"}));
        assert_eq!(select_entity_key(&card_only), Some(EntityKey::Card1Only));

        let none = row(json!({"card1": null, "addr1": 2.0, "P_emaildomain": "x.com"}));
        assert_eq!(select_entity_key(&none), None);
    }

    #[test]
    fn test_evidence_from_row_amount_hint() {
        let r = row(json!({
            "TransactionAmt": 750.0,
            "TransactionDT": 86400,
            "ProductCD": "W",
            "card1": 9500,
            "P_emaildomain": "gmail.com",
            "R_emaildomain": null,
            "isFraud": 0,
        }));
        let evidence = evidence_from_row(&r, 500.0);
        assert_eq!(evidence.amount, Some(750.0));
        assert_eq!(evidence.amount_high, Some(true));
        assert_eq!(evidence.transaction_dt, Some(86400));
        assert_eq!(evidence.p_emaildomain.as_deref(), Some("gmail.com"));
        assert_eq!(evidence.r_emaildomain, None);
        assert_eq!(evidence.context_value("ProductCD"), Some(&json!("W")));
        assert!(!evidence.context.contains_key("isFraud"));
        assert_eq!(evidence.entity_tx_count_10m, None);
    }

    #[test]
    fn test_evidence_from_row_missing_amount_stays_unknown() {
        let r = row(json!({"TransactionAmt": null}));
        let evidence = evidence_from_row(&r, 500.0);
        assert_eq!(evidence.amount, None);
        assert_eq!(evidence.amount_high, None);
    }
}
