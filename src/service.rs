//! Defines the remote function-management API the synchronizer talks
//! to, and the values exchanged with it.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::spec::VpcConfig;

/// Resource tags, ordered by key.
pub type Tags = BTreeMap<String, String>;

/// Failure of a remote call. Only `NotFound` is ever handled by the
/// synchronizer, and only at specific call sites.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The named function or alias does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The resource being created already exists.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// Any other failure, carrying the transport error as its source.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

/// Current server-side state of a function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteFunctionConfig {
    pub name: String,
    pub arn: String,
    pub role: Option<String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub description: Option<String>,
    pub timeout: Option<i32>,
    pub memory_size: Option<i32>,
    pub environment: BTreeMap<String, String>,
}

/// The deployment package, either inline bytes or a reference to an
/// S3 object.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionCode {
    ZipFile {
        path: PathBuf,
        bytes: Vec<u8>,
    },
    S3 {
        bucket: String,
        key: String,
        object_version: Option<String>,
    },
}

/// Parameters of a create-function call. Unset fields fall back to
/// the service defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFunction {
    pub name: String,
    pub role: Option<String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub description: Option<String>,
    pub timeout: Option<i32>,
    pub memory_size: Option<i32>,
    pub publish: Option<bool>,
    pub vpc_config: Option<VpcConfig>,
    pub environment: Option<BTreeMap<String, String>>,
    pub tags: Option<Tags>,
    pub layers: Option<Vec<String>>,
    pub code: FunctionCode,
}

/// Parameters of an update-function-configuration call, already
/// reconciled against the remote state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationUpdate {
    pub name: String,
    pub role: Option<String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub description: Option<String>,
    pub timeout: Option<i32>,
    pub memory_size: Option<i32>,
    pub vpc_config: Option<VpcConfig>,
    pub environment: BTreeMap<String, String>,
    pub layers: Option<Vec<String>>,
}

/// Parameters of an update-function-code call.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeUpdate {
    pub name: String,
    pub code: FunctionCode,
    pub publish: Option<bool>,
}

/// An alias and the function version it should point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    pub name: String,
    pub function_name: String,
    pub version: String,
}

/// The function identity returned by create and code-update calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFunction {
    pub arn: String,
    pub version: String,
}

/// Remote function-management API.
#[async_trait]
pub trait FunctionService: Send + Sync {
    /// Fetch a function's current configuration, or fail with
    /// `NotFound`.
    async fn get_function(&self, name: &str) -> Result<RemoteFunctionConfig, ServiceError>;

    async fn create_function(
        &self,
        function: &NewFunction,
    ) -> Result<PublishedFunction, ServiceError>;

    async fn update_function_code(
        &self,
        update: &CodeUpdate,
    ) -> Result<PublishedFunction, ServiceError>;

    /// Apply a configuration update and return the function ARN.
    async fn update_function_configuration(
        &self,
        update: &ConfigurationUpdate,
    ) -> Result<String, ServiceError>;

    async fn list_tags(&self, arn: &str) -> Result<Tags, ServiceError>;

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<(), ServiceError>;

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<(), ServiceError>;

    /// Create an alias and return its ARN, or fail with
    /// `AlreadyExists`.
    async fn create_alias(&self, alias: &AliasTarget) -> Result<String, ServiceError>;

    /// Repoint an existing alias and return its ARN, or fail with
    /// `NotFound`.
    async fn update_alias(&self, alias: &AliasTarget) -> Result<String, ServiceError>;
}
