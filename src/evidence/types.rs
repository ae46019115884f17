use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::lenient;

/// Context fields copied verbatim from the transaction row into the evidence record.
pub const CONTEXT_FIELDS: [&str; 10] = [
    "ProductCD",
    "card1",
    "card2",
    "card3",
    "card5",
    "card6",
    "addr1",
    "addr2",
    "DeviceType",
    "DeviceInfo",
];

/// Per-transaction evidence snapshot.
///
/// Every field is optional: `None` means "unknown", which is not the same thing as
/// zero transactions or an empty domain. Signal evaluation decides how to treat it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub amount_high: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub entity_key_used: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub entity_tx_count_10m: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub entity_tx_count_1h: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub entity_tx_count_24h: Option<i64>,
    #[serde(default, rename = "TransactionDT", deserialize_with = "lenient::opt_i64")]
    pub transaction_dt: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub identity_present: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub identity_missing_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub identity_cols_count: usize,
    #[serde(default, rename = "P_emaildomain", deserialize_with = "lenient::opt_string")]
    pub p_emaildomain: Option<String>,
    #[serde(default, rename = "R_emaildomain", deserialize_with = "lenient::opt_string")]
    pub r_emaildomain: Option<String>,
    /// Remaining pass-through fields (`ProductCD`, `card1`, `DeviceType`, ...).
    #[serde(flatten)]
    pub context: BTreeMap<String, JsonValue>,
}

impl Evidence {
    /// Look up a context field, treating JSON null as absent.
    pub fn context_value(&self, key: &str) -> Option<&JsonValue> {
        self.context.get(key).filter(|v| !v.is_null())
    }

    /// Text used to query the case index for similar historical cases.
    ///
    /// The index documents are rendered with the same `key=value | ...` layout, so
    /// the formatting here is part of the retrieval contract.
    pub fn query_text(&self) -> String {
        let parts = [
            format!("amount={}", display_opt_float(self.amount)),
            format!("ProductCD={}", self.display_context("ProductCD")),
            format!("card1={}", self.display_context("card1")),
            format!("addr1={}", self.display_context("addr1")),
            format!("P_emaildomain={}", display_opt(self.p_emaildomain.as_deref())),
            format!("R_emaildomain={}", display_opt(self.r_emaildomain.as_deref())),
            format!("DeviceType={}", self.display_context("DeviceType")),
            format!("entity_key={}", display_opt(self.entity_key_used.as_deref())),
            format!("v10={}", display_opt(self.entity_tx_count_10m)),
            format!("v1h={}", display_opt(self.entity_tx_count_1h)),
            format!("v24h={}", display_opt(self.entity_tx_count_24h)),
            format!(
                "identity_missing_ratio={}",
                display_opt_float(self.identity_missing_ratio)
            ),
        ];
        parts.join(" | ")
    }

    fn display_context(&self, key: &str) -> String {
        self.context_value(key)
            .map(display_json)
            .unwrap_or_else(|| NONE.to_string())
    }
}

const NONE: &str = "None";

/// Render a float the way the index documents do: integral values keep one decimal.
pub fn display_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

pub fn display_opt_float(value: Option<f64>) -> String {
    value.map(display_float).unwrap_or_else(|| NONE.to_string())
}

pub fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NONE.to_string())
}

/// Render a JSON scalar without quotes around strings.
pub fn display_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => NONE.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => display_float(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
