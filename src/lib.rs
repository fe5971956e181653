//! A sales and receivables dashboard.
//!
//! Sales rows and receivables aging data are fetched from a remote source,
//! cached in SQLite and summarised by fiscal year, quarter, month, consultant
//! and provider.
//!
//! This library provides a web server that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod cache;
mod config;
mod dashboard;
mod dataset;
mod endpoints;
mod error;
mod html;
mod internal_server_error;
mod loader;
mod logging;
mod normalize;
mod not_found;
mod period;
mod receivables;
mod routing;
mod source;

pub use app_state::AppState;
pub use config::{Config, DEFAULT_CACHE_PATH, DEFAULT_CACHE_TTL_MINUTES};
pub use dashboard::{Aggregation, DashboardReport, FilterSpec, Selection, aggregate};
pub use dataset::{DataOrigin, Dataset, FilterDomains, Snapshot};
pub use error::Error;
pub use loader::{DataLoader, DatasetHandle, LoadState, current_state, new_dataset_handle};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use normalize::{Transaction, normalize_rows};
pub use period::{FiscalYear, MonthKey};
pub use receivables::{AgingBuckets, Receivables};
pub use routing::build_router;
pub use source::{RemoteSource, SalesSource};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
