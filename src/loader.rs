//! Loads the sales data set and keeps it up to date.
//!
//! The [DataLoader] serves a fresh cached snapshot straight away when it has
//! one, and otherwise waits on the remote source. After that it refetches in
//! the background and swaps in each new [Dataset] whole, so a request that
//! arrives during a refresh is served entirely from the previous data set.

use std::sync::{Arc, Mutex, RwLock};

use rusqlite::Connection;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use crate::{
    Error, cache,
    dataset::{DataOrigin, Dataset, Snapshot},
    source::SalesSource,
};

/// The loading progress of the data set.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    /// Nothing has loaded yet.
    Loading,
    /// A data set is ready to use.
    Ready(Arc<Dataset>),
    /// The first load failed and there is nothing to show.
    Failed(String),
}

/// Shared access to the current [LoadState].
pub type DatasetHandle = Arc<RwLock<LoadState>>;

/// Create a handle in the [LoadState::Loading] state.
pub fn new_dataset_handle() -> DatasetHandle {
    Arc::new(RwLock::new(LoadState::Loading))
}

/// Get a copy of the current load state.
///
/// # Errors
/// Returns [Error::SnapshotLockError] if the lock is poisoned.
pub fn current_state(handle: &DatasetHandle) -> Result<LoadState, Error> {
    handle
        .read()
        .inspect_err(|error| tracing::error!("could not acquire snapshot lock: {error}"))
        .map(|state| state.clone())
        .map_err(|_| Error::SnapshotLockError)
}

/// Fetches data from a [SalesSource], caches it and publishes it to a [DatasetHandle].
pub struct DataLoader<S> {
    source: Arc<S>,
    cache_connection: Arc<Mutex<Connection>>,
    handle: DatasetHandle,
    cache_ttl: Duration,
}

impl<S> Clone for DataLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            cache_connection: self.cache_connection.clone(),
            handle: self.handle.clone(),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<S: SalesSource> DataLoader<S> {
    /// Create a loader.
    ///
    /// `cache_connection` must already have the cache table, see [cache::initialize].
    /// Cached snapshots older than `cache_ttl` are not served on start up.
    pub fn new(
        source: S,
        cache_connection: Arc<Mutex<Connection>>,
        handle: DatasetHandle,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            source: Arc::new(source),
            cache_connection,
            handle,
            cache_ttl,
        }
    }

    /// The handle the loader publishes data sets to.
    pub fn handle(&self) -> DatasetHandle {
        self.handle.clone()
    }

    /// Loads the first data set.
    ///
    /// A fresh cached snapshot is published immediately and a background
    /// refresh is started. Otherwise the remote source is fetched before
    /// returning.
    ///
    /// # Errors
    /// Returns an error if there was no fresh cache and the fetch failed. The
    /// handle is left in [LoadState::Failed] in that case.
    pub async fn initialize(&self) -> Result<(), Error> {
        let cached = {
            let connection = self
                .cache_connection
                .lock()
                .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
                .map_err(|_| Error::DatabaseLockError)?;

            cache::load_snapshot(&connection)
                .inspect_err(|error| tracing::warn!("Could not read the cache: {error}"))
                .ok()
                .flatten()
        };

        match cached {
            Some(cached) if cached.is_fresh(self.cache_ttl, OffsetDateTime::now_utc()) => {
                tracing::info!(
                    "Serving {} cached transactions fetched at {}",
                    cached.snapshot.transactions.len(),
                    cached.fetched_at
                );
                self.publish(Dataset::new(cached.snapshot, DataOrigin::Cache))?;

                let loader = self.clone();
                tokio::spawn(async move {
                    // Failures are logged by `refresh` and the cached data stays up.
                    let _ = loader.refresh().await;
                });

                Ok(())
            }
            _ => {
                tracing::debug!("No fresh cache, fetching from the remote source");
                self.refresh().await
            }
        }
    }

    /// Fetches the latest data, caches it and publishes it.
    ///
    /// # Errors
    /// Returns the fetch error if the source could not be read. If a data set
    /// was already published it is kept, otherwise the handle moves to
    /// [LoadState::Failed].
    pub async fn refresh(&self) -> Result<(), Error> {
        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.record_failure(&error)?;
                return Err(error);
            }
        };

        if let Err(error) = self.save_to_cache(&snapshot) {
            tracing::warn!("Could not save snapshot to the cache: {error}");
        }

        tracing::info!(
            "Loaded {} transactions from the remote source",
            snapshot.transactions.len()
        );

        self.publish(Dataset::new(snapshot, DataOrigin::Network))
    }

    /// Refreshes the data every `interval` until the task is aborted.
    pub fn spawn_refresh_loop(self, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                tracing::debug!("Refreshing sales data");
                let _ = self.refresh().await;
            }
        })
    }

    fn save_to_cache(&self, snapshot: &Snapshot) -> Result<(), Error> {
        let connection = self
            .cache_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        cache::save_snapshot(snapshot, &connection)
    }

    fn publish(&self, dataset: Dataset) -> Result<(), Error> {
        let mut state = self
            .handle
            .write()
            .inspect_err(|error| tracing::error!("could not acquire snapshot lock: {error}"))
            .map_err(|_| Error::SnapshotLockError)?;

        *state = LoadState::Ready(Arc::new(dataset));

        Ok(())
    }

    fn record_failure(&self, error: &Error) -> Result<(), Error> {
        let mut state = self
            .handle
            .write()
            .inspect_err(|error| tracing::error!("could not acquire snapshot lock: {error}"))
            .map_err(|_| Error::SnapshotLockError)?;

        if let LoadState::Ready(_) = *state {
            tracing::warn!("Could not refresh sales data, keeping the previous data: {error}");
        } else {
            tracing::error!("Could not load sales data: {error}");
            *state = LoadState::Failed(error.to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime, macros::date};

    use crate::{
        Error, cache,
        dataset::{DataOrigin, Snapshot},
        normalize::Transaction,
        receivables::Receivables,
        source::SalesSource,
    };

    use super::{DataLoader, LoadState, current_state, new_dataset_handle};

    /// Hands out queued results, oldest first.
    struct FakeSource {
        responses: Mutex<Vec<Result<Snapshot, Error>>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn new(mut responses: Vec<Result<Snapshot, Error>>) -> Self {
            responses.reverse();

            Self {
                responses: Mutex::new(responses),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SalesSource for FakeSource {
        async fn fetch(&self) -> Result<Snapshot, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::Fetch("no more responses".to_owned())))
        }
    }

    fn create_test_snapshot(sales: f64, fetched_at: OffsetDateTime) -> Snapshot {
        Snapshot {
            transactions: vec![Transaction::new(
                date!(2024 - 07 - 01),
                sales,
                "Asha",
                "HE",
            )],
            receivables: Receivables::default(),
            fetched_at,
        }
    }

    fn get_test_connection() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        cache::initialize(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn ready_dataset(state: LoadState) -> Arc<crate::dataset::Dataset> {
        match state {
            LoadState::Ready(dataset) => dataset,
            other => panic!("expected a ready data set, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn initialize_without_cache_fetches_and_caches() {
        let connection = get_test_connection();
        let snapshot = create_test_snapshot(100.0, OffsetDateTime::now_utc());
        let loader = DataLoader::new(
            FakeSource::new(vec![Ok(snapshot.clone())]),
            connection.clone(),
            new_dataset_handle(),
            Duration::hours(1),
        );

        loader.initialize().await.unwrap();

        let dataset = ready_dataset(current_state(&loader.handle()).unwrap());
        assert_eq!(dataset.origin(), DataOrigin::Network);
        assert_eq!(dataset.transactions(), snapshot.transactions.as_slice());

        let cached = cache::load_snapshot(&connection.lock().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(cached.snapshot, snapshot);
    }

    #[tokio::test]
    async fn initialize_serves_fresh_cache_first() {
        let connection = get_test_connection();
        let cached = create_test_snapshot(50.0, OffsetDateTime::now_utc());
        cache::save_snapshot(&cached, &connection.lock().unwrap()).unwrap();
        let source = FakeSource::new(vec![Err(Error::Fetch("offline".to_owned()))]);
        let calls = source.calls.clone();
        let loader = DataLoader::new(
            source,
            connection,
            new_dataset_handle(),
            Duration::hours(1),
        );

        loader.initialize().await.unwrap();

        let dataset = ready_dataset(current_state(&loader.handle()).unwrap());
        assert_eq!(dataset.origin(), DataOrigin::Cache);
        assert_eq!(dataset.transactions()[0].sales, 50.0);

        // Let the background refresh run. Its failure must not replace the cached data.
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;

        let dataset = ready_dataset(current_state(&loader.handle()).unwrap());
        assert_eq!(dataset.origin(), DataOrigin::Cache);
    }

    #[tokio::test]
    async fn initialize_ignores_stale_cache() {
        let connection = get_test_connection();
        let stale = create_test_snapshot(50.0, OffsetDateTime::now_utc() - Duration::hours(2));
        cache::save_snapshot(&stale, &connection.lock().unwrap()).unwrap();
        let fresh = create_test_snapshot(75.0, OffsetDateTime::now_utc());
        let loader = DataLoader::new(
            FakeSource::new(vec![Ok(fresh)]),
            connection,
            new_dataset_handle(),
            Duration::hours(1),
        );

        loader.initialize().await.unwrap();

        let dataset = ready_dataset(current_state(&loader.handle()).unwrap());
        assert_eq!(dataset.origin(), DataOrigin::Network);
        assert_eq!(dataset.transactions()[0].sales, 75.0);
    }

    #[tokio::test]
    async fn failed_first_load_is_recorded() {
        let loader = DataLoader::new(
            FakeSource::new(vec![Err(Error::Fetch("offline".to_owned()))]),
            get_test_connection(),
            new_dataset_handle(),
            Duration::hours(1),
        );

        let result = loader.initialize().await;

        assert_eq!(result, Err(Error::Fetch("offline".to_owned())));
        assert_eq!(
            current_state(&loader.handle()).unwrap(),
            LoadState::Failed("could not fetch data: offline".to_owned())
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_data() {
        let loader = DataLoader::new(
            FakeSource::new(vec![
                Ok(create_test_snapshot(100.0, OffsetDateTime::now_utc())),
                Err(Error::Fetch("offline".to_owned())),
            ]),
            get_test_connection(),
            new_dataset_handle(),
            Duration::hours(1),
        );
        loader.initialize().await.unwrap();

        let result = loader.refresh().await;

        assert!(result.is_err());
        let dataset = ready_dataset(current_state(&loader.handle()).unwrap());
        assert_eq!(dataset.transactions()[0].sales, 100.0);
    }

    #[tokio::test]
    async fn refresh_swaps_in_new_data_without_touching_readers() {
        let loader = DataLoader::new(
            FakeSource::new(vec![
                Ok(create_test_snapshot(100.0, OffsetDateTime::now_utc())),
                Ok(create_test_snapshot(200.0, OffsetDateTime::now_utc())),
            ]),
            get_test_connection(),
            new_dataset_handle(),
            Duration::hours(1),
        );
        loader.initialize().await.unwrap();
        let before = ready_dataset(current_state(&loader.handle()).unwrap());

        loader.refresh().await.unwrap();

        let after = ready_dataset(current_state(&loader.handle()).unwrap());
        assert_eq!(before.transactions()[0].sales, 100.0);
        assert_eq!(after.transactions()[0].sales, 200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_loop_fetches_every_interval() {
        let source = FakeSource::new(vec![
            Ok(create_test_snapshot(1.0, OffsetDateTime::now_utc())),
            Ok(create_test_snapshot(2.0, OffsetDateTime::now_utc())),
        ]);
        let calls = source.calls.clone();
        let loader = DataLoader::new(
            source,
            get_test_connection(),
            new_dataset_handle(),
            Duration::hours(1),
        );
        let handle = loader.handle();

        let task = loader.spawn_refresh_loop(std::time::Duration::from_secs(60));
        tokio::time::sleep(std::time::Duration::from_secs(121)).await;
        task.abort();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let dataset = ready_dataset(current_state(&handle).unwrap());
        assert_eq!(dataset.transactions()[0].sales, 2.0);
    }
}
