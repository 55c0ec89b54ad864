use dermadesk_core::config::LoadOptions;

use crate::commands::{async_runtime, load_config, open_store, CommandResult, Failure};

pub fn run(options: LoadOptions) -> CommandResult {
    match apply(options) {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}

fn apply(options: LoadOptions) -> Result<(), Failure> {
    let config = load_config(options)?;
    async_runtime()?.block_on(async {
        let pool = open_store(&config).await?;
        pool.close().await;
        Ok::<(), Failure>(())
    })
}
