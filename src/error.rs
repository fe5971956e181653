//! Defines the app level error type and its conversion to rendered HTML pages.
use axum::response::{IntoResponse, Response};

use crate::internal_server_error::InternalServerError;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A request to the remote sales or receivables source failed.
    ///
    /// The string holds the underlying HTTP error and should only be logged
    /// or shown as a load failure, never matched on.
    #[error("could not fetch data: {0}")]
    Fetch(String),

    /// The remote source responded, but the body was not in the expected shape.
    #[error("the remote source sent an invalid payload: {0}")]
    InvalidPayload(String),

    /// A fiscal year label that does not look like "FY 2024-25".
    #[error("\"{0}\" is not a valid fiscal year label")]
    InvalidFiscalYear(String),

    /// A month key that does not look like "2024-07".
    #[error("\"{0}\" is not a valid month")]
    InvalidMonthKey(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the cache database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Could not acquire the lock on the in-memory sales snapshot.
    #[error("could not acquire the sales snapshot lock")]
    SnapshotLockError,

    /// No sales data has been loaded, either because loading is still in
    /// progress or because it failed.
    #[error("sales data is not available: {0}")]
    DataUnavailable(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Error::InvalidPayload(value.to_string())
        } else {
            Error::Fetch(value.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::DataUnavailable(reason) => InternalServerError {
                description: "Sales data unavailable",
                fix: &format!("The dashboard could not load its data: {reason}. Try again later."),
            }
            .into_response(),
            Error::DatabaseLockError | Error::SnapshotLockError => {
                InternalServerError::default().into_response()
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}
