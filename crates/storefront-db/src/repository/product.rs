//! # Catalog Repository
//!
//! Database operations for categories and products: the rows that cart
//! items and order lines point at.

use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use storefront_core::validation::{
    validate_category_name, validate_price_cents, validate_product_name,
};
use storefront_core::{Category, NewProduct, Product};

const PRODUCT_COLUMNS: &str = "id, name, description, image_url, price_cents, category_id";

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    image_url: Option<String>,
    price_cents: i64,
    category_id: Option<i64>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
            price_cents: row.price_cents,
            category_id: row.category_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Inserts a category.
///
/// ## Returns
/// * `Err(DbError::UniqueViolation)` - name already used
pub async fn insert_category(conn: &mut SqliteConnection, name: &str) -> DbResult<Category> {
    validate_category_name(name)?;
    let name = name.trim();

    debug!(name = %name, "Inserting category");

    let row = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (name) VALUES (?1) RETURNING id, name",
    )
    .bind(name)
    .fetch_one(conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("category", name),
        other => other,
    })?;

    Ok(Category {
        id: row.id,
        name: row.name,
    })
}

/// Inserts a product.
///
/// ## Returns
/// * `Err(DbError::Validation)` - empty name or negative price
/// * `Err(DbError::UniqueViolation)` - name already used
/// * `Err(DbError::NotFound)` - unknown category
pub async fn insert_product(conn: &mut SqliteConnection, product: &NewProduct) -> DbResult<Product> {
    validate_product_name(&product.name)?;
    validate_price_cents(product.price_cents)?;
    let name = product.name.trim();

    debug!(name = %name, price_cents = product.price_cents, "Inserting product");

    let sql = format!(
        "INSERT INTO products (name, description, image_url, price_cents, category_id) \
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {PRODUCT_COLUMNS}"
    );

    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.price_cents)
        .bind(product.category_id)
        .fetch_one(conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("product name", name),
            DbError::ForeignKeyViolation { .. } => DbError::not_found(
                "Category",
                product
                    .category_id
                    .map_or_else(|| "none".to_string(), |id| id.to_string()),
            ),
            other => other,
        })?;

    Ok(row.into())
}

/// Gets a product by id.
pub async fn get_product<'e, E>(executor: E, id: i64) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Product::from))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: Database,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(db: Database) -> Self {
        CatalogRepository { db }
    }

    /// Creates a category.
    pub async fn create_category(&self, name: &str) -> DbResult<Category> {
        let name = name.to_string();
        self.db
            .transaction(move |conn| Box::pin(async move { insert_category(conn, &name).await }))
            .await
    }

    /// Lists categories by name.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    /// Creates a product.
    pub async fn create_product(&self, product: NewProduct) -> DbResult<Product> {
        self.db
            .transaction(move |conn| Box::pin(async move { insert_product(conn, &product).await }))
            .await
    }

    /// Gets a product by id.
    pub async fn get_product(&self, id: i64) -> DbResult<Option<Product>> {
        get_product(self.db.pool(), id).await
    }

    /// Lists every product by name.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Lists the products of one category by name.
    pub async fn list_products_by_category(&self, category_id: i64) -> DbResult<Vec<Product>> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = ?1 ORDER BY name");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Inserts an uncategorized product priced at 10.00.
#[cfg(test)]
pub(crate) async fn insert_test_product(db: &Database, name: &str) -> Product {
    db.catalog()
        .create_product(NewProduct {
            name: name.to_string(),
            description: String::new(),
            image_url: None,
            price_cents: 1000,
            category_id: None,
        })
        .await
        .unwrap()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use storefront_core::ErrorKind;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_product(name: &str, price_cents: i64, category_id: Option<i64>) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: "A fine thing".to_string(),
            image_url: Some("/img/thing.png".to_string()),
            price_cents,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_by_category() {
        let db = setup().await;
        let catalog = db.catalog();

        let kitchen = catalog.create_category("Kitchen").await.unwrap();
        let garden = catalog.create_category("Garden").await.unwrap();

        let teapot = catalog
            .create_product(new_product("Teapot", 2500, Some(kitchen.id)))
            .await
            .unwrap();
        catalog
            .create_product(new_product("Rake", 1800, Some(garden.id)))
            .await
            .unwrap();

        let kitchen_items = catalog.list_products_by_category(kitchen.id).await.unwrap();
        assert_eq!(kitchen_items, vec![teapot.clone()]);

        assert_eq!(catalog.list_products().await.unwrap().len(), 2);
        assert_eq!(catalog.get_product(teapot.id).await.unwrap(), Some(teapot));

        let names: Vec<_> = catalog
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Garden", "Kitchen"]);
    }

    #[tokio::test]
    async fn test_duplicate_product_name() {
        let db = setup().await;
        insert_test_product(&db, "Teapot").await;

        let err = db
            .catalog()
            .create_product(new_product("Teapot", 100, None))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_product_validation() {
        let db = setup().await;

        let err = db
            .catalog()
            .create_product(new_product("", 100, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db
            .catalog()
            .create_product(new_product("Teapot", -1, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let db = setup().await;

        let err = db
            .catalog()
            .create_product(new_product("Teapot", 100, Some(77)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
