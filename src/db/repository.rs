use serde_json::{Map, Value as JsonValue};
use sqlx::PgPool;

use crate::error::CaseError;

/// Trailing windows for entity velocity, in `TransactionDT` seconds.
const WINDOW_10M_SECS: i64 = 600;
const WINDOW_1H_SECS: i64 = 3600;
const WINDOW_24H_SECS: i64 = 86400;

/// Which columns identify the entity whose recent transactions are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKey {
    /// `card1 + addr1 + P_emaildomain`
    Full,
    /// `card1` alone, used when the address or email is missing.
    Card1Only,
}

impl EntityKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "card1+addr1+P_emaildomain",
            Self::Card1Only => "card1_only",
        }
    }

    fn predicate(&self) -> &'static str {
        match self {
            Self::Full => {
                "x.card1 = target.card1 AND x.addr1 = target.addr1 \
                 AND x.\"P_emaildomain\" = target.email"
            }
            Self::Card1Only => "x.card1 = target.card1",
        }
    }
}

/// Transaction counts for one entity over the trailing windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityCounts {
    pub count_10m: i64,
    pub count_1h: i64,
    pub count_24h: i64,
}

/// Read-only access to the joined transaction table (transaction + identity columns).
#[derive(Clone)]
pub struct TransactionStore {
    pool: PgPool,
    table: String,
}

impl TransactionStore {
    /// `table` must already be validated as a plain SQL identifier.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch one transaction row as a JSON object keyed by column name.
    pub async fn fetch_row(
        &self,
        transaction_id: i64,
    ) -> Result<Option<Map<String, JsonValue>>, CaseError> {
        let sql = format!(
            "SELECT row_to_json(t)::text FROM {} t WHERE \"TransactionID\" = $1 LIMIT 1",
            self.table
        );

        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some((text,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<JsonValue>(&text) {
            Ok(JsonValue::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(CaseError::Malformed(format!(
                "row for transaction {} is not an object",
                transaction_id
            ))),
            Err(e) => Err(CaseError::Malformed(format!(
                "row for transaction {} is not valid JSON: {}",
                transaction_id, e
            ))),
        }
    }

    /// Count the entity's transactions in the 10m / 1h / 24h windows ending at this
    /// transaction's `TransactionDT` (the transaction itself included).
    pub async fn velocity_counts(
        &self,
        transaction_id: i64,
        key: EntityKey,
    ) -> Result<VelocityCounts, CaseError> {
        let sql = format!(
            "WITH target AS (
                SELECT \"TransactionDT\" AS dt, card1, addr1, \"P_emaildomain\" AS email
                FROM {table} WHERE \"TransactionID\" = $1 LIMIT 1
            )
            SELECT
                COUNT(*) FILTER (WHERE x.\"TransactionDT\" BETWEEN target.dt - $2 AND target.dt),
                COUNT(*) FILTER (WHERE x.\"TransactionDT\" BETWEEN target.dt - $3 AND target.dt),
                COUNT(*) FILTER (WHERE x.\"TransactionDT\" BETWEEN target.dt - $4 AND target.dt)
            FROM {table} x, target
            WHERE {predicate}",
            table = self.table,
            predicate = key.predicate(),
        );

        let (count_10m, count_1h, count_24h): (i64, i64, i64) = sqlx::query_as(&sql)
            .bind(transaction_id)
            .bind(WINDOW_10M_SECS)
            .bind(WINDOW_1H_SECS)
            .bind(WINDOW_24H_SECS)
            .fetch_one(&self.pool)
            .await?;

        Ok(VelocityCounts {
            count_10m,
            count_1h,
            count_24h,
        })
    }
}
