//! Defines configuration as read from the environment.

use aws_config::retry::RetryConfig;
use aws_config::SdkConfig;
use aws_sdk_lambda::config::Region;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::service::Tags;
use crate::spec::{FunctionSpec, S3Object, VpcConfig};

/// Deserialize an optional JSON object of strings given as a single
/// environment variable.
fn json_map<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| serde_json::from_str(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

/// The function to synchronize, given as environment variables.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// The name of the function to create or update.
    pub function_name: String,

    /// The execution role ARN.
    #[serde(default)]
    pub role: Option<String>,

    /// The runtime identifier, e.g. `python3.11` or `provided.al2`.
    #[serde(default)]
    pub runtime: Option<String>,

    #[serde(default)]
    pub handler: Option<String>,

    #[serde(default)]
    pub function_description: Option<String>,

    /// The function timeout, in seconds.
    #[serde(default)]
    pub lambda_timeout: Option<i32>,

    /// The function memory, in megabytes.
    #[serde(default)]
    pub memory_size: Option<i32>,

    /// Path to a local zip archive with the deployment package.
    #[serde(default)]
    pub zip_file: Option<PathBuf>,

    /// Bucket holding the deployment package, if not given as a local
    /// archive.
    #[serde(default)]
    pub s3_bucket: Option<String>,

    #[serde(default)]
    pub s3_key: Option<String>,

    #[serde(default)]
    pub s3_object_version: Option<String>,

    /// Comma-separated subnet IDs for VPC placement.
    #[serde(default)]
    pub vpc_subnet_ids: Option<Vec<String>>,

    /// Comma-separated security group IDs for VPC placement.
    #[serde(default)]
    pub vpc_security_group_ids: Option<Vec<String>>,

    /// Environment variables for the function, as a JSON object.
    #[serde(default, deserialize_with = "json_map")]
    pub environment: Option<BTreeMap<String, String>>,

    /// The complete set of tags for the function, as a JSON
    /// object. Omitting it leaves tags untouched.
    #[serde(default, deserialize_with = "json_map")]
    pub tags: Option<Tags>,

    /// Comma-separated layer ARNs.
    #[serde(default)]
    pub layers: Option<Vec<String>>,

    #[serde(default)]
    pub publish: Option<bool>,

    #[serde(default)]
    pub alias: Option<String>,
}

impl Settings {
    /// Build the function spec these settings describe.
    pub fn function_spec(&self) -> FunctionSpec {
        let s3_object = if self.s3_bucket.is_some() || self.s3_key.is_some() {
            Some(S3Object {
                bucket: self.s3_bucket.clone().unwrap_or_default(),
                key: self.s3_key.clone().unwrap_or_default(),
                object_version: self.s3_object_version.clone(),
            })
        } else {
            None
        };
        let vpc_config =
            if self.vpc_subnet_ids.is_some() || self.vpc_security_group_ids.is_some() {
                Some(VpcConfig {
                    subnet_ids: self.vpc_subnet_ids.clone().unwrap_or_default(),
                    security_group_ids: self.vpc_security_group_ids.clone().unwrap_or_default(),
                })
            } else {
                None
            };
        FunctionSpec {
            name: self.function_name.clone(),
            role: self.role.clone(),
            runtime: self.runtime.clone(),
            handler: self.handler.clone(),
            description: self.function_description.clone(),
            timeout_seconds: self.lambda_timeout,
            memory_size_mb: self.memory_size,
            zip_file: self.zip_file.clone(),
            s3_object,
            vpc_config,
            environment: self.environment.clone(),
            tags: self.tags.clone(),
            layers: self.layers.clone(),
            publish: self.publish,
            alias: self.alias.clone(),
        }
    }
}

/// Prefix of the environment variables holding client settings. The
/// plain `AWS_*` variables are still read by the default provider
/// chain; these take precedence over them.
pub const CLIENT_SETTINGS_PREFIX: &str = "LAMBDA_MIGRATE_";

/// The AWS client configuration, given as environment variables
/// prefixed with [`CLIENT_SETTINGS_PREFIX`].
#[derive(Debug, Default, Deserialize)]
pub struct ClientSettings {
    /// Overrides the region resolved by the default provider chain.
    #[serde(default)]
    pub region: Option<String>,

    /// Named profile from the shared AWS configuration files.
    #[serde(default)]
    pub profile: Option<String>,

    /// Overrides the service endpoint, e.g. for a local emulator. A
    /// bare host gets an `https://` scheme.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Maximum attempts per request, retries included. Non-positive
    /// values keep the SDK default.
    #[serde(default)]
    pub max_attempts: Option<i32>,
}

/// Add a scheme to an endpoint given as a bare host.
fn endpoint_with_scheme(endpoint_url: &str) -> String {
    if endpoint_url.starts_with("http://") || endpoint_url.starts_with("https://") {
        endpoint_url.to_string()
    } else {
        format!("https://{}", endpoint_url)
    }
}

/// Load the AWS configuration described by the client settings.
pub async fn aws_service_config(settings: &ClientSettings) -> SdkConfig {
    let mut loader = aws_config::from_env();
    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint_url) = &settings.endpoint_url {
        loader = loader.endpoint_url(endpoint_with_scheme(endpoint_url));
    }
    if let Some(max_attempts) = settings.max_attempts.filter(|n| *n > 0) {
        loader = loader.retry_config(RetryConfig::standard().with_max_attempts(max_attempts as u32));
    }
    loader.load().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_minimal_settings() {
        let settings = settings(&[("FUNCTION_NAME", "f"), ("ZIP_FILE", "build/f.zip")]);
        let spec = settings.function_spec();
        assert_eq!(spec.name, "f");
        assert_eq!(spec.zip_file, Some(PathBuf::from("build/f.zip")));
        assert_eq!(spec.s3_object, None);
        assert_eq!(spec.vpc_config, None);
        assert_eq!(spec.tags, None);
        assert_eq!(spec.environment, None);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_full_settings() {
        let settings = settings(&[
            ("FUNCTION_NAME", "f"),
            ("ROLE", "arn:aws:iam::123456789012:role/f"),
            ("RUNTIME", "provided.al2"),
            ("LAMBDA_TIMEOUT", "30"),
            ("MEMORY_SIZE", "256"),
            ("S3_BUCKET", "artifacts"),
            ("S3_KEY", "f.zip"),
            ("VPC_SUBNET_IDS", "subnet-1,subnet-2"),
            ("ENVIRONMENT", r#"{"LOG_LEVEL":"debug"}"#),
            ("TAGS", "{}"),
            ("LAYERS", "arn:layer:1"),
            ("PUBLISH", "true"),
            ("ALIAS", "live"),
        ]);
        let spec = settings.function_spec();
        assert_eq!(spec.timeout_seconds, Some(30));
        assert_eq!(spec.memory_size_mb, Some(256));
        assert_eq!(
            spec.s3_object,
            Some(S3Object {
                bucket: "artifacts".to_string(),
                key: "f.zip".to_string(),
                object_version: None,
            })
        );
        assert_eq!(
            spec.vpc_config,
            Some(VpcConfig {
                subnet_ids: vec!["subnet-1".to_string(), "subnet-2".to_string()],
                security_group_ids: Vec::new(),
            })
        );
        assert_eq!(
            spec.environment.unwrap().get("LOG_LEVEL").map(String::as_str),
            Some("debug")
        );
        assert_eq!(spec.tags, Some(Tags::new()));
        assert_eq!(spec.layers, Some(vec!["arn:layer:1".to_string()]));
        assert_eq!(spec.publish, Some(true));
        assert_eq!(spec.alias.as_deref(), Some("live"));
    }

    #[test]
    fn test_half_s3_reference_is_kept_for_validation() {
        let settings = settings(&[("FUNCTION_NAME", "f"), ("S3_KEY", "f.zip")]);
        assert!(settings.function_spec().validate().is_err());
    }

    #[test]
    fn test_client_settings() {
        let settings: ClientSettings = envy::from_iter(vec![
            ("AWS_REGION".to_string(), "eu-west-1".to_string()),
            ("AWS_MAX_ATTEMPTS".to_string(), "5".to_string()),
        ])
        .unwrap();
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.max_attempts, Some(5));
        assert_eq!(settings.endpoint_url, None);
    }

    #[test]
    fn test_endpoint_scheme() {
        assert_eq!(endpoint_with_scheme("localhost:4566"), "https://localhost:4566");
        assert_eq!(endpoint_with_scheme("http://localhost:4566"), "http://localhost:4566");
    }
}
