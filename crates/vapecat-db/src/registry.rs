//! Loading of the brand, seller-site and product-category registries.

use sqlx::PgPool;
use vapecat_core::{Registry, RegistryEntry};

use crate::DbError;

/// The three name → id lookup tables read at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryTable {
    Companies,
    SellerSites,
    ProductCategories,
}

impl RegistryTable {
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            RegistryTable::Companies => "companies",
            RegistryTable::SellerSites => "seller_sites",
            RegistryTable::ProductCategories => "product_categories",
        }
    }
}

impl std::fmt::Display for RegistryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegistryRow {
    id: i64,
    name: String,
}

/// Read every row of a registry table into a name-keyed [`Registry`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_registry(pool: &PgPool, table: RegistryTable) -> Result<Registry, DbError> {
    // Table names come from a closed enum, never from input.
    let sql = format!("SELECT id, name FROM {} ORDER BY id", table.table_name());
    let rows = sqlx::query_as::<_, RegistryRow>(&sql).fetch_all(pool).await?;

    tracing::debug!(table = %table, entries = rows.len(), "registry loaded");

    Ok(rows
        .into_iter()
        .map(|row| RegistryEntry {
            id: row.id,
            name: row.name,
        })
        .collect())
}

/// Insert a registry name, returning the id of the new or existing row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_registry_entry(
    pool: &PgPool,
    table: RegistryTable,
    name: &str,
) -> Result<i64, DbError> {
    let sql = format!(
        "INSERT INTO {} (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
        table.table_name()
    );
    let id = sqlx::query_scalar::<_, i64>(&sql)
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_match_schema() {
        assert_eq!(RegistryTable::Companies.table_name(), "companies");
        assert_eq!(RegistryTable::SellerSites.to_string(), "seller_sites");
        assert_eq!(
            RegistryTable::ProductCategories.table_name(),
            "product_categories"
        );
    }
}
