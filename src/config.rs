//! Settings for the dashboard server and the loader they configure.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;
use time::Duration;

use crate::{
    Error, cache,
    loader::{DataLoader, new_dataset_handle},
    source::RemoteSource,
};

/// The cache file used when none is given.
pub const DEFAULT_CACHE_PATH: &str = "dashboard_cache.db";

/// How long fetched data is served before it is refetched, in minutes.
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 60;

/// Where the sales data comes from and how it is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The URL of the sales rows JSON.
    pub sales_url: String,
    /// The URL of the receivables summary JSON.
    pub receivables_url: String,
    /// The SQLite file the last fetched snapshot is cached in.
    pub cache_path: PathBuf,
    /// How long a fetched snapshot stays fresh.
    pub cache_ttl: Duration,
}

impl Config {
    /// Create a config with the default cache settings.
    pub fn new(sales_url: &str, receivables_url: &str) -> Self {
        Self {
            sales_url: sales_url.to_owned(),
            receivables_url: receivables_url.to_owned(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            cache_ttl: Duration::minutes(DEFAULT_CACHE_TTL_MINUTES),
        }
    }

    /// The interval between background refreshes.
    ///
    /// A zero or negative TTL is treated as one minute.
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::try_from(self.cache_ttl)
            .ok()
            .filter(|interval| !interval.is_zero())
            .unwrap_or(std::time::Duration::from_secs(60))
    }

    /// Open the cache database and create a loader for the configured source.
    ///
    /// # Errors
    /// Returns an error if the cache database cannot be opened or initialized.
    pub fn create_loader(&self) -> Result<DataLoader<RemoteSource>, Error> {
        let connection = Connection::open(&self.cache_path).inspect_err(|error| {
            tracing::error!(
                "Could not open cache database {}: {error}",
                self.cache_path.display()
            )
        })?;

        self.loader_with_connection(connection)
    }

    fn loader_with_connection(
        &self,
        connection: Connection,
    ) -> Result<DataLoader<RemoteSource>, Error> {
        cache::initialize(&connection)?;

        Ok(DataLoader::new(
            RemoteSource::new(&self.sales_url, &self.receivables_url),
            Arc::new(Mutex::new(connection)),
            new_dataset_handle(),
            self.cache_ttl,
        ))
    }
}
