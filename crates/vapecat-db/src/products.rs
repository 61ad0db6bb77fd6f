//! Database operations for canonical `products`.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub company_id: i64,
    pub product_category_id: i64,
    /// Normalized title of the first listing that created the product.
    pub visible_name: String,
    /// Token-sorted identity name; unique together with company and category.
    pub grouping_name: String,
    /// Set once at creation, never updated.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub company_id: i64,
    pub product_category_id: i64,
    pub visible_name: String,
    pub grouping_name: String,
    pub image_url: Option<String>,
}

/// Outcome of [`create_product`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedProduct {
    pub id: i64,
    /// `false` when a row with the same identity already existed.
    pub inserted: bool,
}

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Look up a product by its identity triple.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_product<'e, E>(
    executor: E,
    company_id: i64,
    grouping_name: &str,
    product_category_id: i64,
) -> Result<Option<ProductRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, company_id, product_category_id, visible_name, grouping_name, \
                image_url, created_at, updated_at \
         FROM products \
         WHERE company_id = $1 AND grouping_name = $2 AND product_category_id = $3",
    )
    .bind(company_id)
    .bind(grouping_name)
    .bind(product_category_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Insert a product, or return the id of the row that already holds its
/// identity triple.
///
/// The insert and the conflict check happen in one statement. If the insert
/// is skipped and the follow-up select still finds nothing, the row was
/// removed underneath us and the run cannot continue safely.
///
/// Takes a connection rather than a pool so both statements can run inside
/// the caller's transaction.
///
/// # Errors
///
/// Returns [`DbError::InconsistentState`] when the conflicting row cannot be
/// read back, or [`DbError::Sqlx`] if a query fails.
pub async fn create_product(
    conn: &mut PgConnection,
    product: &NewProduct,
) -> Result<CreatedProduct, DbError> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (company_id, product_category_id, visible_name, grouping_name, image_url) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (company_id, grouping_name, product_category_id) DO NOTHING \
         RETURNING id",
    )
    .bind(product.company_id)
    .bind(product.product_category_id)
    .bind(&product.visible_name)
    .bind(&product.grouping_name)
    .bind(&product.image_url)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(CreatedProduct { id, inserted: true });
    }

    tracing::warn!(
        company_id = product.company_id,
        grouping_name = %product.grouping_name,
        product_category_id = product.product_category_id,
        "product insert conflicted, reading existing row"
    );

    let existing = find_product(
        &mut *conn,
        product.company_id,
        &product.grouping_name,
        product.product_category_id,
    )
    .await?
    .ok_or_else(|| {
        DbError::InconsistentState(format!(
            "product ({}, {:?}, {}) conflicted on insert but could not be read",
            product.company_id, product.grouping_name, product.product_category_id
        ))
    })?;

    Ok(CreatedProduct {
        id: existing.id,
        inserted: false,
    })
}
