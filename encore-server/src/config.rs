use std::env;

use crate::DEFAULT_PORT;

/// Which of the two interchangeable backing stores to use
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageBackend {
    Sqlite,
    File,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: StorageBackend,
    /// Connection url for the SQLite backend
    pub database_url: String,
    /// Data directory for the flat-file backend
    pub data_dir: String,
}

impl Config {
    /// Reads configuration from the environment. Invalid values are fatal.
    pub fn from_env() -> Self {
        let port = env::var("ENCORE_PORT")
            .map(|x| x.parse::<u16>().expect("Port must be a number"))
            .unwrap_or(DEFAULT_PORT);

        let backend = match env::var("ENCORE_STORAGE").ok().as_deref() {
            None | Some("sqlite") => StorageBackend::Sqlite,
            Some("file") => StorageBackend::File,
            Some(other) => panic!("Unknown storage backend: {}", other),
        };

        let database_url = env::var("ENCORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://encore.db?mode=rwc".to_string());

        let data_dir = env::var("ENCORE_DATA_DIR").unwrap_or_else(|_| "data".to_string());

        Self {
            port,
            backend,
            database_url,
            data_dir,
        }
    }
}
