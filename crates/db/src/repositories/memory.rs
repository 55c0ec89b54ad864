use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use dermadesk_core::domain::cart::CartLine;
use dermadesk_core::domain::checkpoint::Checkpoint;
use dermadesk_core::domain::product::{Product, ProductId};
use dermadesk_core::domain::session::SessionId;

use super::{CartRepository, CatalogRepository, CheckpointRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl InMemoryCatalogRepository {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|product| (product.product_id, product)).collect();
        Self { products: RwLock::new(products) }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_categories(&self) -> Result<Vec<String>, RepositoryError> {
        let products = self.products.read().await;
        let mut categories: Vec<String> = Vec::new();
        for product in products.values() {
            if !categories.contains(&product.category) {
                categories.push(product.category.clone());
            }
        }
        Ok(categories)
    }

    async fn search_by_name(
        &self,
        fragment: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .values()
            .filter(|product| contains_ignore_case(&product.product_name, fragment))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_by_category(
        &self,
        category: &str,
        description: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .values()
            .filter(|product| product.category.to_lowercase() == category.to_lowercase())
            .filter(|product| {
                description.map_or(true, |fragment| {
                    contains_ignore_case(&product.description, fragment)
                })
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(id).cloned())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.product_id, product);
        Ok(())
    }
}

/// Lines kept in insertion order per owner, matching row order of the SQL store.
#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Vec<CartLine>>>,
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn list_lines(&self, owner: &SessionId) -> Result<Vec<CartLine>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(owner.as_str()).cloned().unwrap_or_default())
    }

    async fn find_line(
        &self,
        owner: &SessionId,
        product_id: &ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts
            .get(owner.as_str())
            .and_then(|lines| lines.iter().find(|line| &line.product_id == product_id))
            .cloned())
    }

    async fn upsert_line(&self, owner: &SessionId, line: CartLine) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(owner.as_str().to_string()).or_default();
        match lines.iter_mut().find(|existing| existing.product_id == line.product_id) {
            Some(existing) => existing.quantity = line.quantity,
            None => lines.push(line),
        }
        Ok(())
    }

    async fn delete_line(
        &self,
        owner: &SessionId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut carts = self.carts.write().await;
        let Some(lines) = carts.get_mut(owner.as_str()) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|line| &line.product_id != product_id);
        Ok(lines.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointRepository {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

#[async_trait::async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, RepositoryError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(session_id.as_str()).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.session_id.as_str().to_string(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let mut checkpoints = self.checkpoints.write().await;
        Ok(checkpoints.remove(session_id.as_str()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use dermadesk_core::domain::cart::CartLine;
    use dermadesk_core::domain::product::{Product, ProductId};
    use dermadesk_core::domain::session::SessionId;

    use crate::repositories::{
        CartRepository, CatalogRepository, InMemoryCartRepository, InMemoryCatalogRepository,
    };

    fn product(id: i64, name: &str, category: &str) -> Product {
        Product {
            product_id: ProductId(id),
            product_name: name.to_string(),
            description: format!("{name} for everyday use"),
            category: category.to_string(),
            stock: 4,
            price: Decimal::new(1000, 2),
        }
    }

    #[tokio::test]
    async fn in_memory_catalog_mirrors_sql_matching_rules() {
        let repo = InMemoryCatalogRepository::with_products(vec![
            product(2, "Clay Mask", "Mask"),
            product(1, "Sheet Mask", "Mask"),
            product(3, "Lip Balm", "Lip Care"),
        ]);

        assert_eq!(repo.list_categories().await.expect("categories"), vec!["Mask", "Lip Care"]);
        let hits = repo.search_by_name("MASK", 3).await.expect("search");
        assert_eq!(hits.iter().map(|p| p.product_id.0).collect::<Vec<_>>(), vec![1, 2]);
        let narrowed = repo.find_by_category("mask", Some("clay"), 3).await.expect("lookup");
        assert_eq!(narrowed.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_cart_upsert_keeps_single_line() {
        let repo = InMemoryCartRepository::default();
        let owner = SessionId("owner".to_string());
        let line = CartLine {
            product_id: ProductId(1),
            product_name: "Sheet Mask".to_string(),
            price: Decimal::new(1000, 2),
            quantity: 1,
        };

        repo.upsert_line(&owner, line.clone()).await.expect("insert");
        repo.upsert_line(&owner, CartLine { quantity: 4, ..line }).await.expect("update");

        let lines = repo.list_lines(&owner).await.expect("list");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 4);
    }
}
