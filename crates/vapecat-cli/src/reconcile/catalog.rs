//! Writes listing groups into the catalog: one canonical product per group,
//! one price comparison per (product, url, seller), and history rows when a
//! product's lowest price moves.
//!
//! Groups are processed strictly one after another, so no two writers ever
//! touch the same product at once. The whole run is one transaction: any
//! error aborts it and nothing it wrote is kept.

use thiserror::Error;
use vapecat_core::{RawListing, Registry};
use vapecat_db::{CatalogStore, CatalogTx, DbError, NewPriceComparison, NewPriceHistory, NewProduct};
use vapecat_matcher::MatchContext;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("seller '{0}' is not in the seller registry")]
    UnknownSeller(String),
    #[error("category '{0}' is not in the category registry")]
    UnknownCategory(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub groups: usize,
    pub listings: usize,
    pub products_created: usize,
    /// Groups that found their product through an already-known URL.
    pub products_reused_by_url: usize,
    /// Groups that found their product through the identity triple.
    pub products_matched: usize,
    pub comparisons_inserted: usize,
    pub comparisons_repriced: usize,
    pub comparisons_unchanged: usize,
    pub history_appended: usize,
}

pub struct Reconciler<'a, S> {
    ctx: &'a MatchContext,
    sellers: &'a Registry,
    categories: &'a Registry,
    store: &'a S,
}

impl<'a, S: CatalogStore> Reconciler<'a, S> {
    pub fn new(
        ctx: &'a MatchContext,
        sellers: &'a Registry,
        categories: &'a Registry,
        store: &'a S,
    ) -> Self {
        Self {
            ctx,
            sellers,
            categories,
            store,
        }
    }

    /// Reconcile every group in order, stopping at the first error.
    ///
    /// Writes are committed only once every group has succeeded.
    pub async fn reconcile(
        &self,
        groups: &[Vec<RawListing>],
    ) -> Result<ReconcileStats, ReconcileError> {
        let mut tx = self.store.begin().await?;
        let mut stats = ReconcileStats::default();
        for group in groups {
            self.reconcile_group(&mut tx, group, &mut stats).await?;
        }
        tx.commit().await?;
        Ok(stats)
    }

    async fn reconcile_group<T: CatalogTx>(
        &self,
        tx: &mut T,
        group: &[RawListing],
        stats: &mut ReconcileStats,
    ) -> Result<(), ReconcileError> {
        let Some(first) = group.first() else {
            return Ok(());
        };

        let category_id = self
            .categories
            .get(&first.product_type)
            .ok_or_else(|| ReconcileError::UnknownCategory(first.product_type.clone()))?
            .id;

        // Every seller is checked before the first write for this group.
        let seller_ids = group
            .iter()
            .map(|listing| self.seller_id(listing))
            .collect::<Result<Vec<_>, _>>()?;

        let visible_name = self.ctx.normalize(&first.title);
        let resolution = self.ctx.resolve_brand(&visible_name);
        let company_id = resolution.brand.id().unwrap_or_else(|| {
            tracing::warn!(
                title = %first.title,
                url = %first.url,
                brand = ?resolution.brand,
                "brand not in registry; using unknown brand id"
            );
            self.ctx.unknown_brand_id()
        });
        let grouping_name = self.ctx.grouping_name(&visible_name);

        let identity = ProductIdentity {
            company_id,
            grouping_name: &grouping_name,
            category_id,
            visible_name: &visible_name,
        };
        let product_id = resolve_product(tx, group, &identity, stats).await?;

        for (listing, seller_id) in group.iter().zip(seller_ids) {
            upsert_comparison(tx, product_id, seller_id, listing, stats).await?;
        }

        stats.groups += 1;
        stats.listings += group.len();
        Ok(())
    }

    fn seller_id(&self, listing: &RawListing) -> Result<i64, ReconcileError> {
        self.sellers
            .get(&listing.source_file)
            .map(|entry| entry.id)
            .ok_or_else(|| ReconcileError::UnknownSeller(listing.source_file.clone()))
    }
}

/// The product identity computed from a group's first listing.
struct ProductIdentity<'a> {
    company_id: i64,
    grouping_name: &'a str,
    category_id: i64,
    visible_name: &'a str,
}

/// Find the product a group belongs to, creating it if needed.
///
/// A URL already present in the catalog wins over the title identity, so
/// a listing keeps its product across runs even if its title drifts.
async fn resolve_product<T: CatalogTx>(
    tx: &mut T,
    group: &[RawListing],
    identity: &ProductIdentity<'_>,
    stats: &mut ReconcileStats,
) -> Result<i64, ReconcileError> {
    for listing in group.iter().filter(|listing| !listing.url.is_empty()) {
        if let Some(existing) = tx.find_comparison_by_url(&listing.url).await? {
            tracing::debug!(
                url = %listing.url,
                product_id = existing.product_id,
                "product found by url"
            );
            stats.products_reused_by_url += 1;
            return Ok(existing.product_id);
        }
    }

    if let Some(product) = tx
        .find_product(identity.company_id, identity.grouping_name, identity.category_id)
        .await?
    {
        stats.products_matched += 1;
        return Ok(product.id);
    }

    let image_url = group
        .iter()
        .filter_map(|listing| listing.image_url.as_deref())
        .find(|url| !url.is_empty())
        .map(str::to_string);

    let created = tx
        .create_product(&NewProduct {
            company_id: identity.company_id,
            product_category_id: identity.category_id,
            visible_name: identity.visible_name.to_string(),
            grouping_name: identity.grouping_name.to_string(),
            image_url,
        })
        .await?;

    if created.inserted {
        tracing::info!(
            product_id = created.id,
            company_id = identity.company_id,
            grouping_name = identity.grouping_name,
            visible_name = identity.visible_name,
            "product created"
        );
        stats.products_created += 1;
    } else {
        stats.products_matched += 1;
    }
    Ok(created.id)
}

async fn upsert_comparison<T: CatalogTx>(
    tx: &mut T,
    product_id: i64,
    seller_id: i64,
    listing: &RawListing,
    stats: &mut ReconcileStats,
) -> Result<(), ReconcileError> {
    let existing = tx.find_comparison(product_id, &listing.url, seller_id).await?;

    match existing {
        None => {
            tx.insert_comparison(&NewPriceComparison {
                product_id,
                seller_id,
                seller_url: listing.url.clone(),
                price: listing.price,
                origin_title: listing.title.clone(),
            })
            .await?;
            tx.append_history(&NewPriceHistory::first_observation(
                product_id,
                seller_id,
                listing.price,
            ))
            .await?;
            stats.comparisons_inserted += 1;
            stats.history_appended += 1;
        }
        Some(row) if row.price == listing.price => {
            tx.update_comparison_title(row.id, &listing.title).await?;
            stats.comparisons_unchanged += 1;
        }
        Some(row) => {
            let old_lowest = tx.lowest_price(product_id).await?;
            tx.update_comparison_price(row.id, listing.price, &listing.title).await?;
            let new_lowest = tx.lowest_price(product_id).await?;
            stats.comparisons_repriced += 1;

            tracing::debug!(
                product_id,
                url = %listing.url,
                old_price = row.price,
                new_price = listing.price,
                "price changed"
            );

            if let (Some(old_lowest), Some(new_lowest)) = (old_lowest, new_lowest) {
                if old_lowest != new_lowest {
                    let entry = NewPriceHistory::lowest_price_change(
                        product_id, seller_id, old_lowest, new_lowest,
                    );
                    tx.append_history(&entry).await?;
                    stats.history_appended += 1;
                    tracing::info!(
                        product_id,
                        old_lowest,
                        new_lowest,
                        percentage_change = ?entry.percentage_change,
                        "lowest price changed"
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
