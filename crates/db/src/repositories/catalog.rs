use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use dermadesk_core::domain::product::{Product, ProductId};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "product_id, product_name, description, category, stock,
                               CAST(price AS TEXT) AS price_text";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_price(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim())
        .map_err(|error| RepositoryError::Decode(format!("invalid price `{value}`: {error}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_name: String =
        row.try_get("product_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock: i64 = row.try_get("stock").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_text: String =
        row.try_get("price_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        product_id: ProductId(product_id),
        product_name,
        description: description.unwrap_or_default(),
        category: category.unwrap_or_default(),
        stock,
        price: parse_price(&price_text)?,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT category FROM products
             WHERE category IS NOT NULL
             GROUP BY category
             ORDER BY MIN(product_id)",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string())))
            .collect()
    }

    async fn search_by_name(
        &self,
        fragment: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE product_name LIKE ?
             ORDER BY product_id
             LIMIT ?"
        ))
        .bind(format!("%{fragment}%"))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn find_by_category(
        &self,
        category: &str,
        description: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = match description {
            Some(description) => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products
                     WHERE LOWER(category) = LOWER(?) AND LOWER(description) LIKE LOWER(?)
                     ORDER BY product_id
                     LIMIT ?"
                ))
                .bind(category)
                .bind(format!("%{description}%"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products
                     WHERE LOWER(category) = LOWER(?)
                     ORDER BY product_id
                     LIMIT ?"
                ))
                .bind(category)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_product).collect()
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (product_id, product_name, description, category, stock, price)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(product_id) DO UPDATE SET
                 product_name = excluded.product_name,
                 description = excluded.description,
                 category = excluded.category,
                 stock = excluded.stock,
                 price = excluded.price",
        )
        .bind(product.product_id.0)
        .bind(&product.product_name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.stock)
        .bind(product.price.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
