//! The data-access interface the catalog reconciler is written against.

use sqlx::{PgPool, Postgres, Transaction};

use crate::price_comparisons::{self, NewPriceComparison, PriceComparisonRow};
use crate::price_history::{self, NewPriceHistory};
use crate::products::{self, CreatedProduct, NewProduct, ProductRow};
use crate::DbError;

/// A source of catalog transactions.
///
/// Callers drive one product identity at a time; implementations are not
/// required to serialize concurrent transactions touching the same product.
#[allow(async_fn_in_trait)]
pub trait CatalogStore {
    type Tx<'s>: CatalogTx
    where
        Self: 's;

    /// Open a unit of work. Its writes become visible only on
    /// [`CatalogTx::commit`]; dropping it without committing discards them.
    async fn begin(&self) -> Result<Self::Tx<'_>, DbError>;
}

/// Typed reads and writes over products, price comparisons and price history,
/// scoped to one transaction. Reads observe the transaction's own writes.
#[allow(async_fn_in_trait)]
pub trait CatalogTx: Sized {
    async fn find_comparison_by_url(
        &mut self,
        seller_url: &str,
    ) -> Result<Option<PriceComparisonRow>, DbError>;

    async fn find_product(
        &mut self,
        company_id: i64,
        grouping_name: &str,
        product_category_id: i64,
    ) -> Result<Option<ProductRow>, DbError>;

    /// Insert a product or return the one already holding its identity.
    async fn create_product(&mut self, product: &NewProduct) -> Result<CreatedProduct, DbError>;

    async fn find_comparison(
        &mut self,
        product_id: i64,
        seller_url: &str,
        seller_id: i64,
    ) -> Result<Option<PriceComparisonRow>, DbError>;

    async fn insert_comparison(&mut self, comparison: &NewPriceComparison) -> Result<i64, DbError>;

    async fn update_comparison_price(
        &mut self,
        id: i64,
        price: i64,
        origin_title: &str,
    ) -> Result<(), DbError>;

    async fn update_comparison_title(&mut self, id: i64, origin_title: &str) -> Result<(), DbError>;

    async fn lowest_price(&mut self, product_id: i64) -> Result<Option<i64>, DbError>;

    async fn append_history(&mut self, entry: &NewPriceHistory) -> Result<i64, DbError>;

    async fn commit(self) -> Result<(), DbError>;
}

/// [`CatalogStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CatalogStore for PgStore {
    type Tx<'s> = PgTx;

    async fn begin(&self) -> Result<Self::Tx<'_>, DbError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

/// An open Postgres transaction. Dropping it rolls back.
#[derive(Debug)]
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl CatalogTx for PgTx {
    async fn find_comparison_by_url(
        &mut self,
        seller_url: &str,
    ) -> Result<Option<PriceComparisonRow>, DbError> {
        price_comparisons::find_comparison_by_url(&mut *self.tx, seller_url).await
    }

    async fn find_product(
        &mut self,
        company_id: i64,
        grouping_name: &str,
        product_category_id: i64,
    ) -> Result<Option<ProductRow>, DbError> {
        products::find_product(&mut *self.tx, company_id, grouping_name, product_category_id)
            .await
    }

    async fn create_product(&mut self, product: &NewProduct) -> Result<CreatedProduct, DbError> {
        products::create_product(&mut self.tx, product).await
    }

    async fn find_comparison(
        &mut self,
        product_id: i64,
        seller_url: &str,
        seller_id: i64,
    ) -> Result<Option<PriceComparisonRow>, DbError> {
        price_comparisons::find_comparison(&mut *self.tx, product_id, seller_url, seller_id).await
    }

    async fn insert_comparison(&mut self, comparison: &NewPriceComparison) -> Result<i64, DbError> {
        price_comparisons::insert_comparison(&mut *self.tx, comparison).await
    }

    async fn update_comparison_price(
        &mut self,
        id: i64,
        price: i64,
        origin_title: &str,
    ) -> Result<(), DbError> {
        price_comparisons::update_comparison_price(&mut *self.tx, id, price, origin_title).await
    }

    async fn update_comparison_title(
        &mut self,
        id: i64,
        origin_title: &str,
    ) -> Result<(), DbError> {
        price_comparisons::update_comparison_title(&mut *self.tx, id, origin_title).await
    }

    async fn lowest_price(&mut self, product_id: i64) -> Result<Option<i64>, DbError> {
        price_comparisons::lowest_price(&mut *self.tx, product_id).await
    }

    async fn append_history(&mut self, entry: &NewPriceHistory) -> Result<i64, DbError> {
        price_history::append_history(&mut *self.tx, entry).await
    }

    async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}
