//! In-memory [`CatalogStore`] with the same identity rules as the schema.
//!
//! A transaction works on its own copy of the tables and swaps it back in on
//! commit, so an abandoned transaction leaves the store untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::price_comparisons::{NewPriceComparison, PriceComparisonRow};
use crate::price_history::{NewPriceHistory, PriceHistoryRow};
use crate::products::{CreatedProduct, NewProduct, ProductRow};
use crate::store::{CatalogStore, CatalogTx};
use crate::DbError;

#[derive(Debug, Default, Clone)]
struct Tables {
    products: Vec<ProductRow>,
    comparisons: Vec<PriceComparisonRow>,
    history: Vec<PriceHistoryRow>,
}

/// Catalog tables held in process memory. Unique identities are enforced
/// the way the Postgres indexes enforce them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    reject_writes: AtomicBool,
    fail_history_appends: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise abort paths.
    pub fn reject_writes(&self) {
        self.reject_writes.store(true, Ordering::Release);
    }

    /// Toggle failure of history appends only, leaving other writes working.
    pub fn fail_history_appends(&self, fail: bool) {
        self.fail_history_appends.store(fail, Ordering::Release);
    }

    #[must_use]
    pub fn products(&self) -> Vec<ProductRow> {
        self.lock().products.clone()
    }

    #[must_use]
    pub fn comparisons(&self) -> Vec<PriceComparisonRow> {
        self.lock().comparisons.clone()
    }

    #[must_use]
    pub fn history(&self) -> Vec<PriceHistoryRow> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), DbError> {
        if self.reject_writes.load(Ordering::Acquire) {
            return Err(DbError::InconsistentState(
                "memory store is rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

impl CatalogStore for MemoryStore {
    type Tx<'s> = MemoryTx<'s>;

    async fn begin(&self) -> Result<Self::Tx<'_>, DbError> {
        Ok(MemoryTx {
            store: self,
            tables: self.lock().clone(),
        })
    }
}

/// An open [`MemoryStore`] transaction.
#[derive(Debug)]
pub struct MemoryTx<'s> {
    store: &'s MemoryStore,
    tables: Tables,
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).map_or(i64::MAX, |n| n + 1)
}

impl CatalogTx for MemoryTx<'_> {
    async fn find_comparison_by_url(
        &mut self,
        seller_url: &str,
    ) -> Result<Option<PriceComparisonRow>, DbError> {
        Ok(self
            .tables
            .comparisons
            .iter()
            .filter(|row| row.seller_url == seller_url)
            .max_by_key(|row| (row.updated_at, row.id))
            .cloned())
    }

    async fn find_product(
        &mut self,
        company_id: i64,
        grouping_name: &str,
        product_category_id: i64,
    ) -> Result<Option<ProductRow>, DbError> {
        Ok(self
            .tables
            .products
            .iter()
            .find(|row| {
                row.company_id == company_id
                    && row.grouping_name == grouping_name
                    && row.product_category_id == product_category_id
            })
            .cloned())
    }

    async fn create_product(&mut self, product: &NewProduct) -> Result<CreatedProduct, DbError> {
        self.store.check_writable()?;

        if let Some(existing) = self.tables.products.iter().find(|row| {
            row.company_id == product.company_id
                && row.grouping_name == product.grouping_name
                && row.product_category_id == product.product_category_id
        }) {
            return Ok(CreatedProduct {
                id: existing.id,
                inserted: false,
            });
        }

        let id = next_id(self.tables.products.len());
        let now = Utc::now();
        self.tables.products.push(ProductRow {
            id,
            company_id: product.company_id,
            product_category_id: product.product_category_id,
            visible_name: product.visible_name.clone(),
            grouping_name: product.grouping_name.clone(),
            image_url: product.image_url.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(CreatedProduct { id, inserted: true })
    }

    async fn find_comparison(
        &mut self,
        product_id: i64,
        seller_url: &str,
        seller_id: i64,
    ) -> Result<Option<PriceComparisonRow>, DbError> {
        Ok(self
            .tables
            .comparisons
            .iter()
            .find(|row| {
                row.product_id == product_id
                    && row.seller_url == seller_url
                    && row.seller_id == seller_id
            })
            .cloned())
    }

    async fn insert_comparison(&mut self, comparison: &NewPriceComparison) -> Result<i64, DbError> {
        self.store.check_writable()?;

        let duplicate = self.tables.comparisons.iter().any(|row| {
            row.product_id == comparison.product_id
                && row.seller_url == comparison.seller_url
                && row.seller_id == comparison.seller_id
        });
        if duplicate {
            return Err(DbError::Duplicate(format!(
                "price comparison for product {} at {}",
                comparison.product_id, comparison.seller_url
            )));
        }

        let id = next_id(self.tables.comparisons.len());
        let now = Utc::now();
        self.tables.comparisons.push(PriceComparisonRow {
            id,
            product_id: comparison.product_id,
            seller_id: comparison.seller_id,
            seller_url: comparison.seller_url.clone(),
            price: comparison.price,
            origin_title: comparison.origin_title.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_comparison_price(
        &mut self,
        id: i64,
        price: i64,
        origin_title: &str,
    ) -> Result<(), DbError> {
        self.store.check_writable()?;
        let row = self
            .tables
            .comparisons
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(DbError::NotFound)?;
        row.price = price;
        row.origin_title = origin_title.to_string();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_comparison_title(
        &mut self,
        id: i64,
        origin_title: &str,
    ) -> Result<(), DbError> {
        self.store.check_writable()?;
        let row = self
            .tables
            .comparisons
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(DbError::NotFound)?;
        row.origin_title = origin_title.to_string();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn lowest_price(&mut self, product_id: i64) -> Result<Option<i64>, DbError> {
        Ok(self
            .tables
            .comparisons
            .iter()
            .filter(|row| row.product_id == product_id)
            .map(|row| row.price)
            .min())
    }

    async fn append_history(&mut self, entry: &NewPriceHistory) -> Result<i64, DbError> {
        self.store.check_writable()?;
        if self.store.fail_history_appends.load(Ordering::Acquire) {
            return Err(DbError::InconsistentState(
                "memory store is rejecting history appends".to_string(),
            ));
        }

        let id = next_id(self.tables.history.len());
        self.tables.history.push(PriceHistoryRow {
            id,
            product_id: entry.product_id,
            seller_id: entry.seller_id,
            old_price: entry.old_price,
            new_price: entry.new_price,
            price_difference: entry.price_difference,
            percentage_change: entry.percentage_change,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn commit(self) -> Result<(), DbError> {
        *self.store.lock() = self.tables;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(grouping_name: &str) -> NewProduct {
        NewProduct {
            company_id: 1,
            product_category_id: 2,
            visible_name: "네스티 민트".to_string(),
            grouping_name: grouping_name.to_string(),
            image_url: None,
        }
    }

    fn new_comparison(product_id: i64, url: &str, price: i64) -> NewPriceComparison {
        NewPriceComparison {
            product_id,
            seller_id: 3,
            seller_url: url.to_string(),
            price,
            origin_title: "NASTY Mint".to_string(),
        }
    }

    #[tokio::test]
    async fn create_product_returns_existing_identity() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.create_product(&new_product("민트 네스티")).await.unwrap();
        let second = tx.create_product(&new_product("민트 네스티")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(first.id, second.id);
        assert_eq!(store.products().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_comparison_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_comparison(&new_comparison(1, "u1", 100)).await.unwrap();
        let err = tx
            .insert_comparison(&new_comparison(1, "u1", 200))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));
    }

    #[tokio::test]
    async fn lowest_price_spans_sellers() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lowest_price(1).await.unwrap(), None);
        tx.insert_comparison(&new_comparison(1, "u1", 1200)).await.unwrap();
        tx.insert_comparison(&new_comparison(1, "u2", 1000)).await.unwrap();
        tx.insert_comparison(&new_comparison(2, "u3", 10)).await.unwrap();
        assert_eq!(tx.lowest_price(1).await.unwrap(), Some(1000));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.update_comparison_title(99, "x").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn rejected_writes_fail() {
        let store = MemoryStore::new();
        store.reject_writes();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.create_product(&new_product("a")).await.is_err());
        assert!(store.products().is_empty());
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_store_untouched() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            let product = tx.create_product(&new_product("민트 네스티")).await.unwrap();
            tx.insert_comparison(&new_comparison(product.id, "u1", 100))
                .await
                .unwrap();
            assert!(tx.find_comparison_by_url("u1").await.unwrap().is_some());
            assert!(store.products().is_empty());
        }

        assert!(store.products().is_empty());
        assert!(store.comparisons().is_empty());
    }

    #[tokio::test]
    async fn failing_history_appends_leave_other_writes_working() {
        let store = MemoryStore::new();
        store.fail_history_appends(true);
        let mut tx = store.begin().await.unwrap();
        tx.create_product(&new_product("a")).await.unwrap();
        let err = tx
            .append_history(&NewPriceHistory::first_observation(1, 3, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InconsistentState(_)));
    }
}
