//! SQLite execution: read-only connection, row limit, deadline enforcement.

use crate::guard::ensure_read_only;
use crate::timeout::with_timeout;
use crate::{ExecutorError, QueryResult};
use nq_catalog::DatabaseDir;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};

/// Virtual-machine instructions between deadline checks.
const PROGRESS_INTERVAL: i32 = 1_000;

#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    databases: DatabaseDir,
}

impl SqliteExecutor {
    pub fn new(databases: DatabaseDir) -> Self {
        Self { databases }
    }

    /// Run one read-only query against `db`, returning at most `max_rows` rows.
    pub async fn execute(
        &self,
        db: &str,
        sql: &str,
        timeout: Duration,
        max_rows: usize,
    ) -> Result<QueryResult, ExecutorError> {
        let statement = ensure_read_only(sql)?.to_string();
        let databases = self.databases.clone();
        let name = db.to_string();

        let started = Instant::now();
        let deadline = started + timeout;
        let task = tokio::task::spawn_blocking(move || {
            let path = databases
                .path_for(&name)
                .ok_or(ExecutorError::DatabaseNotFound(name))?;
            run_query(&path, &statement, deadline, max_rows)
        });

        let result = with_timeout(timeout, async {
            task.await
                .map_err(|e| ExecutorError::Internal(format!("query task failed: {e}")))?
        })
        .await;

        match &result {
            Ok(r) => tracing::debug!(
                db,
                rows = r.rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query executed"
            ),
            Err(e) => tracing::debug!(db, error = %e, "Query failed"),
        }
        result
    }
}

fn run_query(
    path: &Path,
    sql: &str,
    deadline: Instant,
    max_rows: usize,
) -> Result<QueryResult, ExecutorError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ExecutorError::Internal(format!("failed to open database: {e}")))?;

    // Abort the statement once the deadline passes; the blocking thread
    // would otherwise outlive the async timeout.
    conn.progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= deadline));

    let budget = deadline.saturating_duration_since(Instant::now());
    let mut stmt = conn.prepare(sql).map_err(|e| map_sqlite_error(e, budget))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query([]).map_err(|e| map_sqlite_error(e, budget))?;
    let mut out = Vec::new();
    while out.len() < max_rows {
        let Some(row) = rows.next().map_err(|e| map_sqlite_error(e, budget))? else {
            break;
        };
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            let value = row.get_ref(idx).map_err(|e| map_sqlite_error(e, budget))?;
            values.push(to_json(value));
        }
        out.push(values);
    }

    Ok(QueryResult { columns, rows: out })
}

fn map_sqlite_error(e: rusqlite::Error, budget: Duration) -> ExecutorError {
    if e.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
        ExecutorError::Timeout(budget.as_millis() as u64)
    } else {
        ExecutorError::Database(e.to_string())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}
