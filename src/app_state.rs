//! Implements a struct that holds the state of the dashboard server.

use crate::loader::DatasetHandle;

/// The state of the dashboard server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The sales data set the loader publishes to.
    pub dataset: DatasetHandle,
}

impl AppState {
    /// Create a new [AppState] that serves whatever is published to `dataset`.
    pub fn new(dataset: DatasetHandle) -> Self {
        Self { dataset }
    }
}
