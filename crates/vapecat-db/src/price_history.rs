//! Database operations for the append-only `price_history` ledger.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::DbError;

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub old_price: i64,
    pub new_price: i64,
    /// `NULL` for first observations.
    pub price_difference: Option<i64>,
    /// `NULL` for first observations and when the old price was zero.
    pub percentage_change: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceHistory {
    pub product_id: i64,
    pub seller_id: i64,
    pub old_price: i64,
    pub new_price: i64,
    pub price_difference: Option<i64>,
    pub percentage_change: Option<f64>,
}

impl NewPriceHistory {
    /// Entry recorded when a (product, seller, url) pair is first seen.
    #[must_use]
    pub fn first_observation(product_id: i64, seller_id: i64, price: i64) -> Self {
        Self {
            product_id,
            seller_id,
            old_price: 0,
            new_price: price,
            price_difference: None,
            percentage_change: None,
        }
    }

    /// Entry recorded when the product's lowest price moves.
    #[must_use]
    pub fn lowest_price_change(
        product_id: i64,
        seller_id: i64,
        old_lowest: i64,
        new_lowest: i64,
    ) -> Self {
        let difference = new_lowest - old_lowest;
        #[allow(clippy::cast_precision_loss)]
        let percentage_change =
            (old_lowest != 0).then(|| difference as f64 / old_lowest as f64 * 100.0);
        Self {
            product_id,
            seller_id,
            old_price: old_lowest,
            new_price: new_lowest,
            price_difference: Some(difference),
            percentage_change,
        }
    }
}

/// Append a ledger entry and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_history<'e, E>(executor: E, entry: &NewPriceHistory) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO price_history \
             (product_id, seller_id, old_price, new_price, price_difference, percentage_change) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(entry.product_id)
    .bind(entry.seller_id)
    .bind(entry.old_price)
    .bind(entry.new_price)
    .bind(entry.price_difference)
    .bind(entry.percentage_change)
    .fetch_one(executor)
    .await?;
    Ok(id)
}
