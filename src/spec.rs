//! Defines the desired state of a function, as given by the caller
//! for a single synchronization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::instrument;

use crate::error::SyncError;
use crate::service::{FunctionCode, Tags};

/// Reference to a deployment package stored in S3.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub object_version: Option<String>,
}

/// Network placement of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

/// The desired state of a function. Every optional field left unset
/// keeps the current remote value when updating, or the service
/// default when creating.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionSpec {
    /// The function name, used as identity key.
    pub name: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub runtime: Option<String>,

    #[serde(default)]
    pub handler: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub timeout_seconds: Option<i32>,

    #[serde(default)]
    pub memory_size_mb: Option<i32>,

    /// A local zip archive with the deployment package. Mutually
    /// exclusive with `s3_object`.
    #[serde(default)]
    pub zip_file: Option<PathBuf>,

    /// An S3 object with the deployment package. Mutually exclusive
    /// with `zip_file`.
    #[serde(default)]
    pub s3_object: Option<S3Object>,

    #[serde(default)]
    pub vpc_config: Option<VpcConfig>,

    /// Environment variables, merged over the remote ones on update.
    #[serde(default)]
    pub environment: Option<BTreeMap<String, String>>,

    /// The complete set of tags the function should end up with. When
    /// absent, tags are left untouched; when empty, every tag is
    /// removed.
    #[serde(default)]
    pub tags: Option<Tags>,

    #[serde(default)]
    pub layers: Option<Vec<String>>,

    /// Whether to publish a new numbered version with the code.
    #[serde(default)]
    pub publish: Option<bool>,

    /// An alias to point at the resulting version.
    #[serde(default)]
    pub alias: Option<String>,
}

/// A validated deployment package source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    Archive(PathBuf),
    S3(S3Object),
}

impl FunctionSpec {
    /// Check the function can be synchronized, and extract its code
    /// source.
    pub fn validate(&self) -> Result<CodeSource, SyncError> {
        if self.name.is_empty() {
            return Err(SyncError::validation("name required"));
        }
        let source = match (&self.zip_file, &self.s3_object) {
            (Some(path), None) => CodeSource::Archive(path.clone()),
            (None, Some(object)) => CodeSource::S3(object.clone()),
            _ => return Err(SyncError::validation("exactly one code source required")),
        };
        if let CodeSource::S3(object) = &source {
            if object.bucket.is_empty() {
                return Err(SyncError::validation("s3 bucket required"));
            }
            if object.key.is_empty() {
                return Err(SyncError::validation("s3 key required"));
            }
        }
        Ok(source)
    }
}

impl CodeSource {
    /// Build the code payload. A local archive is read whole, since
    /// the service takes the complete bytes.
    #[instrument]
    pub async fn load(&self) -> Result<FunctionCode, SyncError> {
        match self {
            CodeSource::Archive(path) => {
                let bytes = fs::read(path).await.map_err(|source| SyncError::Archive {
                    path: path.clone(),
                    source,
                })?;
                Ok(FunctionCode::ZipFile {
                    path: path.clone(),
                    bytes,
                })
            }
            CodeSource::S3(object) => Ok(FunctionCode::S3 {
                bucket: object.bucket.clone(),
                key: object.key.clone(),
                object_version: object.object_version.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> FunctionSpec {
        FunctionSpec {
            name: "f".to_string(),
            ..FunctionSpec::default()
        }
    }

    fn is_validation(result: Result<CodeSource, SyncError>) -> bool {
        matches!(result, Err(SyncError::Validation(_)))
    }

    #[test]
    fn test_name_required() {
        let mut spec = spec();
        spec.name = String::new();
        spec.zip_file = Some(PathBuf::from("function.zip"));
        match spec.validate() {
            Err(SyncError::Validation(msg)) => assert_eq!(msg, "name required"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exactly_one_code_source() {
        let neither = spec();
        assert!(is_validation(neither.validate()));

        let mut both = spec();
        both.zip_file = Some(PathBuf::from("function.zip"));
        both.s3_object = Some(S3Object {
            bucket: "b".to_string(),
            key: "k".to_string(),
            object_version: None,
        });
        match both.validate() {
            Err(SyncError::Validation(msg)) => assert_eq!(msg, "exactly one code source required"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_s3_reference_needs_bucket_and_key() {
        let mut spec = spec();
        spec.s3_object = Some(S3Object {
            bucket: String::new(),
            key: "k".to_string(),
            object_version: None,
        });
        assert!(is_validation(spec.validate()));

        spec.s3_object = Some(S3Object {
            bucket: "b".to_string(),
            key: String::new(),
            object_version: None,
        });
        assert!(is_validation(spec.validate()));

        spec.s3_object = Some(S3Object {
            bucket: "b".to_string(),
            key: "k".to_string(),
            object_version: Some("3".to_string()),
        });
        assert_eq!(
            spec.validate().unwrap(),
            CodeSource::S3(S3Object {
                bucket: "b".to_string(),
                key: "k".to_string(),
                object_version: Some("3".to_string()),
            })
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let spec: FunctionSpec = serde_json::from_value(serde_json::json!({
            "name": "f",
            "zip_file": "build/f.zip",
            "tags": {"team": "core"},
            "publish": true,
            "alias": "live"
        }))
        .unwrap();
        assert_eq!(spec.name, "f");
        assert_eq!(spec.zip_file, Some(PathBuf::from("build/f.zip")));
        assert_eq!(spec.tags.unwrap().get("team").map(String::as_str), Some("core"));
        assert_eq!(spec.environment, None);
        assert_eq!(spec.publish, Some(true));
    }

    #[tokio::test]
    async fn test_load_missing_archive() {
        let source = CodeSource::Archive(PathBuf::from("/nonexistent/function.zip"));
        assert!(matches!(
            source.load().await,
            Err(SyncError::Archive { .. })
        ));
    }
}
