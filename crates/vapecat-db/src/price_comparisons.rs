//! Database operations for `price_comparisons`.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `price_comparisons` table: the current price of one
/// product at one (seller, url) pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceComparisonRow {
    pub id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub seller_url: String,
    pub price: i64,
    /// Raw listing title from the latest observation.
    pub origin_title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPriceComparison {
    pub product_id: i64,
    pub seller_id: i64,
    pub seller_url: String,
    pub price: i64,
    pub origin_title: String,
}

const COLUMNS: &str = "id, product_id, seller_id, seller_url, price, origin_title, \
                       created_at, updated_at";

// ---------------------------------------------------------------------------
// price_comparisons operations
// ---------------------------------------------------------------------------

/// Most recently updated comparison carrying `seller_url`, under any product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_comparison_by_url<'e, E>(
    executor: E,
    seller_url: &str,
) -> Result<Option<PriceComparisonRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM price_comparisons \
         WHERE seller_url = $1 \
         ORDER BY updated_at DESC, id DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, PriceComparisonRow>(&sql)
        .bind(seller_url)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Comparison for an exact `(product, url, seller)` identity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_comparison<'e, E>(
    executor: E,
    product_id: i64,
    seller_url: &str,
    seller_id: i64,
) -> Result<Option<PriceComparisonRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM price_comparisons \
         WHERE product_id = $1 AND seller_url = $2 AND seller_id = $3"
    );
    let row = sqlx::query_as::<_, PriceComparisonRow>(&sql)
        .bind(product_id)
        .bind(seller_url)
        .bind(seller_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Insert a comparison and return its id.
///
/// # Errors
///
/// Returns [`DbError::Duplicate`] on a unique violation of
/// `(product_id, seller_url, seller_id)`, or [`DbError::Sqlx`] if the insert
/// fails otherwise.
pub async fn insert_comparison<'e, E>(
    executor: E,
    comparison: &NewPriceComparison,
) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO price_comparisons \
             (product_id, seller_id, seller_url, price, origin_title) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(comparison.product_id)
    .bind(comparison.seller_id)
    .bind(&comparison.seller_url)
    .bind(comparison.price)
    .bind(&comparison.origin_title)
    .fetch_one(executor)
    .await
    .map_err(|e| map_unique_violation(e, comparison))?;
    Ok(id)
}

/// Set a new price and origin title on an existing comparison.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn update_comparison_price<'e, E>(
    executor: E,
    id: i64,
    price: i64,
    origin_title: &str,
) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE price_comparisons \
         SET price = $1, origin_title = $2, updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(price)
    .bind(origin_title)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Refresh only the origin title of an existing comparison.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn update_comparison_title<'e, E>(
    executor: E,
    id: i64,
    origin_title: &str,
) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE price_comparisons \
         SET origin_title = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(origin_title)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Lowest price across every seller of a product, `None` when it has no
/// comparisons.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lowest_price<'e, E>(executor: E, product_id: i64) -> Result<Option<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let lowest = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MIN(price) FROM price_comparisons WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(executor)
    .await?;
    Ok(lowest)
}

fn map_unique_violation(err: sqlx::Error, comparison: &NewPriceComparison) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return DbError::Duplicate(format!(
                "price comparison for product {} at {}",
                comparison.product_id, comparison.seller_url
            ));
        }
    }
    DbError::Sqlx(err)
}
