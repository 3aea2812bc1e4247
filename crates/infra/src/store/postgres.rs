//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Insert of an existing (product_id, condition) pair |
//! | Database (check constraint violation) | `23514` | `Backend` | Negative quantity or unknown condition reached SQL |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! ## Optimistic Concurrency
//!
//! `update()` is a single conditional statement:
//! `UPDATE ... SET version = version + 1 WHERE product_id = $1 AND condition = $2 AND version = $n`.
//! Zero affected rows means the row is gone or moved on; a follow-up read tells the two apart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use stockroom_core::{ExpectedVersion, ProductId, Quantity};
use stockroom_inventory::{Condition, InventoryRecord, RecordFilter, RecordKey};

use super::{InventoryStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory (
    product_id        BIGINT      NOT NULL,
    condition         TEXT        NOT NULL CHECK (condition IN ('new', 'open_box', 'used')),
    name              TEXT        NULL,
    quantity          BIGINT      NOT NULL CHECK (quantity >= 0),
    reorder_quantity  BIGINT      NOT NULL CHECK (reorder_quantity >= 0),
    restock_level     BIGINT      NOT NULL CHECK (restock_level >= 0),
    active            BOOLEAN     NOT NULL DEFAULT TRUE,
    version           BIGINT      NOT NULL DEFAULT 1,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (product_id, condition)
)
"#;

const COLUMNS: &str = "product_id, condition, name, quantity, reorder_quantity, restock_level, \
                       active, version, created_at, updated_at";

/// Postgres-backed store for inventory records (`inventory` table).
///
/// Uses the SQLx connection pool, which is `Send + Sync`; every operation is a
/// single statement, so no explicit transactions are needed.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url` and make sure the table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `inventory` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn current_version(&self, key: &RecordKey) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT version FROM inventory WHERE product_id = $1 AND condition = $2")
            .bind(key.product_id.get())
            .bind(key.condition.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("current_version", e))?;

        row.map(|r| {
            r.try_get::<i64, _>("version")
                .map(|v| v as u64)
                .map_err(|e| map_sqlx_error("current_version", e))
        })
        .transpose()
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, record), fields(key = %record.key), err)]
    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO inventory ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COLUMNS}
            "#
        );
        let row: RecordRow = sqlx::query_as(&sql)
            .bind(record.key.product_id.get())
            .bind(record.key.condition.as_str())
            .bind(record.name.as_deref())
            .bind(record.quantity.get())
            .bind(record.reorder_quantity.get())
            .bind(record.restock_level.get())
            .bind(record.active)
            .bind(record.version as i64)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(record.key)
                } else {
                    map_sqlx_error("insert", e)
                }
            })?;
        row.try_into()
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn get(&self, key: &RecordKey) -> Result<Option<InventoryRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM inventory WHERE product_id = $1 AND condition = $2");
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(key.product_id.get())
            .bind(key.condition.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.map(InventoryRecord::try_from).transpose()
    }

    #[instrument(skip(self, record), fields(key = %record.key), err)]
    async fn update(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE inventory SET name = ");
        qb.push_bind(record.name.as_deref())
            .push(", quantity = ")
            .push_bind(record.quantity.get())
            .push(", reorder_quantity = ")
            .push_bind(record.reorder_quantity.get())
            .push(", restock_level = ")
            .push_bind(record.restock_level.get())
            .push(", active = ")
            .push_bind(record.active)
            .push(", updated_at = ")
            .push_bind(record.updated_at)
            .push(", version = version + 1 WHERE product_id = ")
            .push_bind(record.key.product_id.get())
            .push(" AND condition = ")
            .push_bind(record.key.condition.as_str());
        if let ExpectedVersion::Exact(v) = expected {
            qb.push(" AND version = ").push_bind(v as i64);
        }
        qb.push(" RETURNING ").push(COLUMNS);

        let row: Option<RecordRow> = qb
            .build_query_as()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        match row {
            Some(row) => row.try_into(),
            None => match self.current_version(&record.key).await? {
                None => Err(StoreError::NotFound(record.key)),
                Some(actual) => Err(StoreError::VersionMismatch {
                    key: record.key,
                    expected,
                    actual,
                }),
            },
        }
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn delete(&self, key: &RecordKey) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM inventory WHERE product_id = $1 AND condition = $2")
            .bind(key.product_id.get())
            .bind(key.condition.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(COLUMNS).push(" FROM inventory WHERE TRUE");

        if let Some(pattern) = filter.name_like_pattern() {
            qb.push(" AND name ILIKE ").push_bind(pattern);
        }
        if let Some(condition) = filter.condition {
            qb.push(" AND condition = ").push_bind(condition.as_str());
        }
        if let Some(q) = filter.quantity {
            // Operator text comes from a closed enum, never from the request.
            qb.push(" AND quantity ")
                .push(q.operator.as_sql())
                .push(" ")
                .push_bind(q.value.get());
        }
        if let Some(active) = filter.active {
            qb.push(" AND active = ").push_bind(active);
        }
        qb.push(" ORDER BY product_id ASC, condition ASC");

        let rows: Vec<RecordRow> = qb
            .build_query_as()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        rows.into_iter().map(InventoryRecord::try_from).collect()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Backend(format!(
            "database error in {} ({}): {}",
            operation,
            db_err.code().as_deref().unwrap_or("?"),
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

struct RecordRow {
    product_id: i64,
    condition: String,
    name: Option<String>,
    quantity: i64,
    reorder_quantity: i64,
    restock_level: i64,
    active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for RecordRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(RecordRow {
            product_id: row.try_get("product_id")?,
            condition: row.try_get("condition")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            reorder_quantity: row.try_get("reorder_quantity")?,
            restock_level: row.try_get("restock_level")?,
            active: row.try_get("active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<RecordRow> for InventoryRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let corrupt = |e: stockroom_core::DomainError| {
            StoreError::Backend(format!("corrupt inventory row for product {}: {e}", row.product_id))
        };

        let condition: Condition = row.condition.parse().map_err(corrupt)?;
        Ok(InventoryRecord {
            key: RecordKey::new(ProductId::new(row.product_id), condition),
            name: row.name,
            quantity: Quantity::new(row.quantity).map_err(corrupt)?,
            reorder_quantity: Quantity::new(row.reorder_quantity).map_err(corrupt)?,
            restock_level: Quantity::new(row.restock_level).map_err(corrupt)?,
            active: row.active,
            version: u64::try_from(row.version)
                .map_err(|_| StoreError::Backend(format!("negative version {}", row.version)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
