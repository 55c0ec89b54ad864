use async_trait::async_trait;
use thiserror::Error;

use dermadesk_core::domain::cart::CartLine;
use dermadesk_core::domain::checkpoint::Checkpoint;
use dermadesk_core::domain::product::{Product, ProductId};
use dermadesk_core::domain::session::SessionId;

pub mod cart;
pub mod catalog;
pub mod checkpoint;
pub mod memory;

pub use cart::SqlCartRepository;
pub use catalog::SqlCatalogRepository;
pub use checkpoint::SqlCheckpointRepository;
pub use memory::{InMemoryCartRepository, InMemoryCatalogRepository, InMemoryCheckpointRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Distinct categories in catalog order.
    async fn list_categories(&self) -> Result<Vec<String>, RepositoryError>;

    /// Case-insensitive partial match on the product name.
    async fn search_by_name(
        &self,
        fragment: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Case-insensitive category equality, optionally narrowed by a partial description match.
    async fn find_by_category(
        &self,
        category: &str,
        description: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

/// Cart lines keyed by session owner; every statement is scoped to one owner.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn list_lines(&self, owner: &SessionId) -> Result<Vec<CartLine>, RepositoryError>;

    async fn find_line(
        &self,
        owner: &SessionId,
        product_id: &ProductId,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Writes the line with its full quantity, replacing any existing row for the product.
    async fn upsert_line(&self, owner: &SessionId, line: CartLine) -> Result<(), RepositoryError>;

    /// Returns whether a row was removed.
    async fn delete_line(
        &self,
        owner: &SessionId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, RepositoryError>;
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError>;
    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError>;
}
