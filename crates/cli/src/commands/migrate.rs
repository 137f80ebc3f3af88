use travelink_core::config::LoadOptions;
use travelink_db::{connect_with_config, migrations};

use crate::commands::{
    load_config, runtime, CommandResult, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION,
};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("migrate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => {
            tracing::info!(
                event_name = "cli.migrate.applied",
                database_url = %config.database.url,
                "pending migrations applied"
            );
            CommandResult::success("migrate", "applied pending migrations")
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
