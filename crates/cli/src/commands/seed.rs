use dermadesk_core::config::{AppConfig, LoadOptions};
use dermadesk_db::{CatalogSeedDataset, DbPool, SeedResult, VerificationResult};

use crate::commands::{async_runtime, load_config, open_store, CommandResult, Failure};

pub fn run(options: LoadOptions) -> CommandResult {
    match load(options) {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "catalog seed loaded: {} products across {} categories ({}); carts and sessions cleared",
                seeded.products_seeded,
                seeded.categories.len(),
                seeded.categories.join(", ")
            ),
        ),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn load(options: LoadOptions) -> Result<SeedResult, Failure> {
    let config = load_config(options)?;
    async_runtime()?.block_on(seed_store(&config))
}

async fn seed_store(config: &AppConfig) -> Result<SeedResult, Failure> {
    let pool = open_store(config).await?;
    let outcome = seed_catalog(&pool).await;
    pool.close().await;
    outcome
}

async fn seed_catalog(pool: &DbPool) -> Result<SeedResult, Failure> {
    let seeded = CatalogSeedDataset::load(pool)
        .await
        .map_err(|error| Failure::new("seed_execution", error.to_string(), 5))?;
    let verification = CatalogSeedDataset::verify(pool)
        .await
        .map_err(|error| Failure::new("seed_verification", error.to_string(), 6))?;

    if !verification.all_present {
        let message = verification_message(&verification);
        return Err(Failure::new("seed_verification", message, 6));
    }
    Ok(seeded)
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use dermadesk_db::VerificationResult;

    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![
                ("product-count", true),
                ("Vitamin C Brightening Serum", false),
                ("category-count", false),
            ],
        };

        assert_eq!(
            verification_message(&verification),
            "Seed verification failed for checks: Vitamin C Brightening Serum, category-count"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: Vec::new() };
        assert_eq!(verification_message(&verification), "Some seed data failed to load");
    }
}
