//! Database operations for `reconcile_runs`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `reconcile_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReconcileRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// `fuzzy` or `strict`.
    pub mode: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub listings_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, public_id, mode, trigger_source, status, started_at, completed_at, \
                       listings_processed, error_message, created_at";

// ---------------------------------------------------------------------------
// reconcile_runs operations
// ---------------------------------------------------------------------------

/// Creates a new run in `queued` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_reconcile_run(
    pool: &PgPool,
    mode: &str,
    trigger_source: &str,
) -> Result<ReconcileRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let sql = format!(
        "INSERT INTO reconcile_runs (public_id, mode, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, ReconcileRunRow>(&sql)
        .bind(public_id)
        .bind(mode)
        .bind(trigger_source)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_reconcile_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconcile_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records how many listings it processed.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_reconcile_run(
    pool: &PgPool,
    id: i64,
    listings_processed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconcile_runs \
         SET status = 'succeeded', completed_at = NOW(), listings_processed = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(listings_processed)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_reconcile_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconcile_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_reconcile_run(pool: &PgPool, id: i64) -> Result<ReconcileRunRow, DbError> {
    let sql = format!("SELECT {COLUMNS} FROM reconcile_runs WHERE id = $1");
    sqlx::query_as::<_, ReconcileRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reconcile_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ReconcileRunRow>, DbError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM reconcile_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, ReconcileRunRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
