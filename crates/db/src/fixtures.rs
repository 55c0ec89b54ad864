use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Catalog rows the seed script must produce, used to verify a seeded database.
const SEED_PRODUCTS: &[(i64, &str, &str)] = &[
    (1, "Gentle Foaming Cleanser", "Cleanser"),
    (2, "Salicylic Acid Cleanser", "Cleanser"),
    (3, "Micellar Cleansing Water", "Cleanser"),
    (4, "Hydrating Daily Moisturizer", "Moisturizer"),
    (5, "Oil-Free Gel Moisturizer", "Moisturizer"),
    (6, "Rich Night Cream", "Moisturizer"),
    (7, "Vitamin C Brightening Serum", "Serum"),
    (8, "Niacinamide 10% Serum", "Serum"),
    (9, "Retinol Renewal Serum", "Serum"),
    (10, "Mineral Sunscreen SPF 50", "Sunscreen"),
    (11, "Invisible Sun Gel SPF 40", "Sunscreen"),
    (12, "Hydrating Toner", "Toner"),
    (13, "Glycolic Acid Toner", "Toner"),
    (14, "Clay Detox Mask", "Mask"),
    (15, "Overnight Hydration Mask", "Mask"),
    (16, "Caffeine Eye Cream", "Eye Care"),
];

const SEED_CATEGORIES: &[&str] =
    &["Cleanser", "Moisturizer", "Serum", "Sunscreen", "Toner", "Mask", "Eye Care"];

/// Deterministic skincare catalog. Loading it resets the store: the catalog is rewritten
/// and every cart and session checkpoint is cleared.
pub struct CatalogSeedDataset;

impl CatalogSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/catalog_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products_seeded: SEED_PRODUCTS.len(),
            categories: SEED_CATEGORIES.to_vec(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM products").fetch_one(pool).await?;
        checks.push(("product-count", product_count == SEED_PRODUCTS.len() as i64));

        let category_count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT category) FROM products")
                .fetch_one(pool)
                .await?;
        checks.push(("category-count", category_count == SEED_CATEGORIES.len() as i64));

        for &(product_id, product_name, category) in SEED_PRODUCTS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM products
                               WHERE product_id = ?1 AND product_name = ?2 AND category = ?3)",
            )
            .bind(product_id)
            .bind(product_name)
            .bind(category)
            .fetch_one(pool)
            .await?;
            checks.push((product_name, present == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub products_seeded: usize,
    pub categories: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use dermadesk_core::domain::checkpoint::Checkpoint;
    use dermadesk_core::domain::session::SessionId;

    use super::*;
    use crate::repositories::{
        CartRepository, CatalogRepository, CheckpointRepository, SqlCartRepository,
        SqlCatalogRepository, SqlCheckpointRepository,
    };
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_matches_contract_size() {
        let inserted_rows = CatalogSeedDataset::SQL.matches("\n    (").count();
        assert_eq!(inserted_rows, SEED_PRODUCTS.len());
    }

    #[tokio::test]
    async fn seed_is_idempotent_and_verifiable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = CatalogSeedDataset::load(&pool).await.expect("load seed");
        let first_verification = CatalogSeedDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.products_seeded, 16);

        CatalogSeedDataset::load(&pool).await.expect("reload seed");
        let second_verification = CatalogSeedDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        let categories =
            SqlCatalogRepository::new(pool.clone()).list_categories().await.expect("categories");
        assert_eq!(categories, SEED_CATEGORIES);
    }

    #[tokio::test]
    async fn reseeding_clears_carts_and_checkpoints() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        CatalogSeedDataset::load(&pool).await.expect("load seed");

        let owner = SessionId("shopper".to_string());
        let catalog = SqlCatalogRepository::new(pool.clone());
        let carts = SqlCartRepository::new(pool.clone());
        let checkpoints = SqlCheckpointRepository::new(pool.clone());

        let serum = catalog
            .find_by_id(&dermadesk_core::domain::product::ProductId(7))
            .await
            .expect("lookup")
            .expect("seeded");
        carts
            .upsert_line(
                &owner,
                dermadesk_core::domain::cart::CartLine {
                    product_id: serum.product_id,
                    product_name: serum.product_name,
                    price: serum.price,
                    quantity: 1,
                },
            )
            .await
            .expect("add line");
        checkpoints.save(&Checkpoint::new(owner.clone())).await.expect("checkpoint");

        CatalogSeedDataset::load(&pool).await.expect("reseed");

        assert!(carts.list_lines(&owner).await.expect("list").is_empty());
        assert!(checkpoints.load(&owner).await.expect("load").is_none());
    }
}
