use std::sync::Arc;

use colored::Colorize;
use encore_core::{Encore, FileStorage, SharedStorage, SqliteStorage, StorageError};
use encore_server::{run_server, Config, StorageBackend};
use log::{error, info};

#[tokio::main]
async fn main() {
    encore_server::init_logger();

    let config = Config::from_env();

    if let Err(error) = init(&config).await {
        error!("{}", "encore failed to start!".bold());
        error!("{}", error);
        error!("{}", format!("Hint: {}", hint(&error)).dimmed().italic());

        std::process::exit(1);
    }
}

async fn init(config: &Config) -> Result<(), StorageError> {
    info!("Connecting to storage...");

    let storage: SharedStorage = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStorage::new(&config.database_url).await?),
        StorageBackend::File => Arc::new(FileStorage::new(&config.data_dir).await?),
    };

    let encore = Arc::new(Encore::new(storage).await?);

    info!("Initialized successfully.");

    run_server(config, encore).await;

    Ok(())
}

fn hint(error: &StorageError) -> &'static str {
    match error {
        StorageError::Internal(_) => {
            "This is a storage error. Make sure the database file or data directory is reachable and writable, then try again."
        }
        StorageError::NotFound { .. } => "This error is fatal, and should not happen.",
    }
}
