pub mod guard;

use std::fmt;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rusqlite::types::ValueRef;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::storage::schema::{self, ColumnInfo};
use crate::storage::Database;

/// A table and its columns as reported by SQLite.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table: {}", self.name)?;
        for c in &self.columns {
            write!(f, "\n  - {} ({})", c.name, c.data_type)?;
        }
        Ok(())
    }
}

/// Result of an ad-hoc query. A rejected query was never executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Rejected {
        reason: String,
    },
}

impl QueryOutcome {
    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, Value>> {
        match self {
            QueryOutcome::Rows { columns, rows } => rows
                .iter()
                .map(|row| columns.iter().cloned().zip(row.iter().cloned()).collect())
                .collect(),
            QueryOutcome::Rejected { .. } => vec![],
        }
    }
}

/// Every user table with its columns.
pub async fn inspect_schema(db: &Database) -> Result<Vec<TableSchema>> {
    db.conn()
        .call(|conn| {
            let mut tables = Vec::new();
            for name in schema::list_tables(conn)? {
                let columns = schema::table_columns(conn, &name)?;
                tables.push(TableSchema { name, columns });
            }
            Ok::<_, rusqlite::Error>(tables)
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Run a caller-supplied SELECT. Queries failing the keyword filter come
/// back as `Rejected`; SQL errors come back as `Err`.
pub async fn run_read_query(db: &Database, sql: &str) -> Result<QueryOutcome> {
    if let Err(reason) = guard::check_read_only(sql) {
        log::warn!("Rejected ad-hoc query: {reason}");
        return Ok(QueryOutcome::Rejected { reason });
    }

    let sql = sql.to_string();
    db.conn()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let width = columns.len();

            let mut rows = Vec::new();
            let mut cursor = stmt.query([])?;
            while let Some(row) = cursor.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(value_to_json(row.get_ref(i)?));
                }
                rows.push(values);
            }
            Ok::<_, rusqlite::Error>(QueryOutcome::Rows { columns, rows })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

fn value_to_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(B64.encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyMetrics;
    use crate::storage::repository;
    use chrono::NaiveDate;

    async fn seeded() -> Database {
        let db = Database::open_memory().await.unwrap();
        db.conn()
            .call(|conn| {
                for (day, steps) in [(1, Some(9000)), (2, None), (3, Some(11000))] {
                    let mut m = DailyMetrics::new(NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
                    m.steps = steps;
                    m.weight = Some(80.5);
                    repository::upsert_daily_metrics(conn, &m)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_inspect_schema_lists_cache_tables() {
        let db = Database::open_memory().await.unwrap();
        let tables = inspect_schema(&db).await.unwrap();

        let sleep = tables.iter().find(|t| t.name == "sleep_cache").unwrap();
        assert!(sleep
            .columns
            .iter()
            .any(|c| c.name == "reality_score" && c.data_type == "INTEGER"));
        assert!(tables.iter().any(|t| t.name == "cache_metadata"));
        assert!(sleep.to_string().starts_with("Table: sleep_cache\n  - date (TEXT)"));
    }

    #[tokio::test]
    async fn test_select_returns_typed_rows() {
        let db = seeded().await;
        let out = run_read_query(&db, "SELECT date, steps, weight FROM daily_metrics_cache ORDER BY date LIMIT 5")
            .await
            .unwrap();

        let QueryOutcome::Rows { columns, rows } = &out else {
            panic!("expected rows, got {out:?}");
        };
        assert_eq!(columns, &vec!["date", "steps", "weight"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][1], Value::from(9000));
        assert_eq!(rows[1][1], Value::Null);
        assert_eq!(rows[2][2], Value::from(80.5));

        let records = out.to_records();
        assert_eq!(records[0]["date"], "2024-03-01");
    }

    #[tokio::test]
    async fn test_rejected_query_is_not_executed() {
        let db = seeded().await;

        let out = run_read_query(&db, "DELETE FROM daily_metrics_cache").await.unwrap();
        assert!(matches!(out, QueryOutcome::Rejected { .. }));

        let out = run_read_query(&db, "SELECT * FROM daily_metrics_cache; DROP TABLE daily_metrics_cache")
            .await
            .unwrap();
        assert!(matches!(out, QueryOutcome::Rejected { .. }));
        assert!(out.to_records().is_empty());

        let out = run_read_query(&db, "SELECT COUNT(*) AS n FROM daily_metrics_cache")
            .await
            .unwrap();
        assert_eq!(out.to_records()[0]["n"], 3);
    }

    #[tokio::test]
    async fn test_sql_error_is_an_error() {
        let db = seeded().await;
        assert!(run_read_query(&db, "SELECT * FROM no_such_table").await.is_err());
    }
}
