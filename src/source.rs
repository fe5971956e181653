//! Fetches sales rows and receivables from the remote source.

use std::future::Future;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    dataset::Snapshot,
    normalize::{RawRow, normalize_rows},
    receivables::Receivables,
};

/// Something that can produce a fresh [Snapshot] of the sales data.
pub trait SalesSource: Send + Sync + 'static {
    /// Fetch and normalize the latest data.
    ///
    /// # Errors
    /// Returns [Error::Fetch] if the source cannot be reached and
    /// [Error::InvalidPayload] if it sends something unexpected.
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, Error>> + Send;
}

/// The body of the sales endpoint.
#[derive(Debug, Deserialize)]
struct SalesPayload {
    rows: Vec<RawRow>,
}

/// Reads the sales sheet and the receivables summary over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: reqwest::Client,
    sales_url: String,
    receivables_url: String,
}

impl RemoteSource {
    /// Create a source that reads from the two given URLs.
    pub fn new(sales_url: &str, receivables_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            sales_url: sales_url.to_owned(),
            receivables_url: receivables_url.to_owned(),
        }
    }

    /// GET `url` with a cache-busting timestamp and decode the JSON body.
    async fn get_json<T>(&self, url: &str, requested_at: OffsetDateTime) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let timestamp_millis = requested_at.unix_timestamp_nanos() / 1_000_000;
        let separator = if url.contains('?') { '&' } else { '?' };

        let response = self
            .client
            .get(format!("{url}{separator}t={timestamp_millis}"))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .inspect_err(|error| tracing::error!("Could not fetch {url}: {error}"))?;

        response
            .json::<T>()
            .await
            .inspect_err(|error| tracing::error!("Could not decode response from {url}: {error}"))
            .map_err(|error| Error::InvalidPayload(error.to_string()))
    }
}

impl SalesSource for RemoteSource {
    async fn fetch(&self) -> Result<Snapshot, Error> {
        let requested_at = OffsetDateTime::now_utc();

        let (sales, receivables) = tokio::try_join!(
            self.get_json::<SalesPayload>(&self.sales_url, requested_at),
            self.get_json::<Receivables>(&self.receivables_url, requested_at),
        )?;

        tracing::info!(
            "Fetched {} sales rows from {}",
            sales.rows.len(),
            self.sales_url
        );

        Ok(Snapshot {
            transactions: normalize_rows(&sales.rows),
            receivables,
            fetched_at: requested_at,
        })
    }
}
