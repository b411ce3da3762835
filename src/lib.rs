//! Creates or updates an AWS Lambda function so it matches a
//! declarative description: configuration first, then code, then the
//! requested alias and tags.

pub mod app;
pub mod client;
pub mod conf;
pub mod error;
pub mod service;
pub mod spec;
pub mod sync;
pub mod tags;

pub use error::SyncError;
pub use service::{FunctionService, ServiceError};
pub use spec::FunctionSpec;
pub use sync::{sync, FunctionSynchronizer, SyncResult};
