use sqlx::Row;

use dermadesk_core::domain::cart::CartLine;
use dermadesk_core::domain::product::ProductId;
use dermadesk_core::domain::session::SessionId;

use super::catalog::parse_price;
use super::{CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<CartLine, RepositoryError> {
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_name: String =
        row.try_get("product_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_text: String =
        row.try_get("price_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(CartLine {
        product_id: ProductId(product_id),
        product_name,
        price: parse_price(&price_text)?,
        quantity,
    })
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn list_lines(&self, owner: &SessionId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, product_name, CAST(price AS TEXT) AS price_text, quantity
             FROM cart_items WHERE user_id = ? ORDER BY rowid",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line).collect()
    }

    async fn find_line(
        &self,
        owner: &SessionId,
        product_id: &ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query(
            "SELECT product_id, product_name, CAST(price AS TEXT) AS price_text, quantity
             FROM cart_items WHERE user_id = ? AND product_id = ?",
        )
        .bind(owner.as_str())
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_line(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert_line(&self, owner: &SessionId, line: CartLine) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, product_name, price, quantity)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, product_id) DO UPDATE SET
                 quantity = excluded.quantity",
        )
        .bind(owner.as_str())
        .bind(line.product_id.0)
        .bind(&line.product_name)
        .bind(line.price.to_string())
        .bind(line.quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_line(
        &self,
        owner: &SessionId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ?")
            .bind(owner.as_str())
            .bind(product_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
