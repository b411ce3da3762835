//! Defines the errors a synchronization may end with.

use std::path::PathBuf;
use thiserror::Error;

use crate::service::ServiceError;

/// A failed synchronization. Validation failures happen before any
/// remote call is made; service failures are propagated as received.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid function spec: {0}")]
    Validation(String),

    #[error("failed to read deployment package {path:?}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SyncError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }
}
