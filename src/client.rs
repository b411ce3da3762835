//! Implements the function service on top of the AWS Lambda API, and
//! defines the global client.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    Environment, FunctionCode as LambdaFunctionCode, FunctionConfiguration, Runtime,
    VpcConfig as LambdaVpcConfig,
};
use aws_sdk_lambda::Client;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;

use crate::conf::{aws_service_config, ClientSettings, CLIENT_SETTINGS_PREFIX};
use crate::service::{
    AliasTarget, CodeUpdate, ConfigurationUpdate, FunctionCode, FunctionService, NewFunction,
    PublishedFunction, RemoteFunctionConfig, ServiceError, Tags,
};
use crate::spec::VpcConfig;

/// Version reported by the service for unpublished code.
const LATEST_VERSION: &str = "$LATEST";

/// Wrap an SDK failure, keeping it as the error source.
fn remote<E>(err: E, context: String) -> ServiceError
where
    E: StdError + Send + Sync + 'static,
{
    ServiceError::Remote(anyhow::Error::new(err).context(context))
}

fn to_hash_map(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn to_tags(map: Option<&HashMap<String, String>>) -> Tags {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn lambda_vpc_config(vpc: &VpcConfig) -> LambdaVpcConfig {
    LambdaVpcConfig::builder()
        .set_subnet_ids(Some(vpc.subnet_ids.clone()))
        .set_security_group_ids(Some(vpc.security_group_ids.clone()))
        .build()
}

fn lambda_environment(variables: &BTreeMap<String, String>) -> Environment {
    Environment::builder()
        .set_variables(Some(to_hash_map(variables)))
        .build()
}

fn published(arn: Option<&str>, version: Option<&str>) -> PublishedFunction {
    PublishedFunction {
        arn: arn.unwrap_or_default().to_string(),
        version: version.unwrap_or(LATEST_VERSION).to_string(),
    }
}

/// Read the remote state out of a fetched configuration. The ARN is
/// required, since tags are addressed by it.
fn remote_config(
    name: &str,
    config: &FunctionConfiguration,
) -> Result<RemoteFunctionConfig, ServiceError> {
    let arn = config.function_arn().ok_or_else(|| {
        ServiceError::Remote(anyhow!("Function {:?} was returned without an ARN", name))
    })?;
    Ok(RemoteFunctionConfig {
        name: config.function_name().unwrap_or(name).to_string(),
        arn: arn.to_string(),
        role: config.role().map(String::from),
        runtime: config.runtime().map(|r| r.as_str().to_string()),
        handler: config.handler().map(String::from),
        description: config.description().map(String::from),
        timeout: config.timeout(),
        memory_size: config.memory_size(),
        environment: config
            .environment()
            .and_then(|env| env.variables())
            .map(|vars| vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
    })
}

/// The AWS Lambda API as a function service.
#[derive(Clone, Debug)]
pub struct LambdaService {
    client: Client,
}

impl LambdaService {
    pub fn new(client: Client) -> Self {
        LambdaService { client }
    }
}

#[async_trait]
impl FunctionService for LambdaService {
    async fn get_function(&self, name: &str) -> Result<RemoteFunctionConfig, ServiceError> {
        let response = match self.client.get_function().function_name(name).send().await {
            Ok(response) => response,
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map_or(false, |e| e.is_resource_not_found_exception());
                return Err(if not_found {
                    ServiceError::NotFound(format!("Function not found: {}", name))
                } else {
                    remote(err, format!("Failed to fetch function {:?}", name))
                });
            }
        };
        match response.configuration() {
            Some(config) => remote_config(name, config),
            None => Err(ServiceError::Remote(anyhow!(
                "Function {:?} was returned without a configuration",
                name
            ))),
        }
    }

    async fn create_function(
        &self,
        function: &NewFunction,
    ) -> Result<PublishedFunction, ServiceError> {
        let code = match &function.code {
            FunctionCode::ZipFile { bytes, .. } => LambdaFunctionCode::builder()
                .zip_file(Blob::new(bytes.clone()))
                .build(),
            FunctionCode::S3 {
                bucket,
                key,
                object_version,
            } => LambdaFunctionCode::builder()
                .s3_bucket(bucket)
                .s3_key(key)
                .set_s3_object_version(object_version.clone())
                .build(),
        };
        let response = self
            .client
            .create_function()
            .function_name(&function.name)
            .set_role(function.role.clone())
            .set_runtime(function.runtime.as_deref().map(Runtime::from))
            .set_handler(function.handler.clone())
            .set_description(function.description.clone())
            .set_timeout(function.timeout)
            .set_memory_size(function.memory_size)
            .set_publish(function.publish)
            .set_vpc_config(function.vpc_config.as_ref().map(lambda_vpc_config))
            .set_environment(function.environment.as_ref().map(lambda_environment))
            .set_tags(function.tags.as_ref().map(to_hash_map))
            .set_layers(function.layers.clone())
            .code(code)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_resource_conflict_exception())
                {
                    ServiceError::AlreadyExists(format!("Function {}", function.name))
                } else {
                    remote(err, format!("Failed to create function {:?}", function.name))
                }
            })?;
        Ok(published(response.function_arn(), response.version()))
    }

    async fn update_function_code(
        &self,
        update: &CodeUpdate,
    ) -> Result<PublishedFunction, ServiceError> {
        let mut request = self
            .client
            .update_function_code()
            .function_name(&update.name)
            .set_publish(update.publish);
        request = match &update.code {
            FunctionCode::ZipFile { bytes, .. } => request.zip_file(Blob::new(bytes.clone())),
            FunctionCode::S3 {
                bucket,
                key,
                object_version,
            } => request
                .s3_bucket(bucket)
                .s3_key(key)
                .set_s3_object_version(object_version.clone()),
        };
        let response = request.send().await.map_err(|err| {
            remote(
                err,
                format!("Failed to update code of function {:?}", update.name),
            )
        })?;
        Ok(published(response.function_arn(), response.version()))
    }

    async fn update_function_configuration(
        &self,
        update: &ConfigurationUpdate,
    ) -> Result<String, ServiceError> {
        let response = self
            .client
            .update_function_configuration()
            .function_name(&update.name)
            .set_role(update.role.clone())
            .set_runtime(update.runtime.as_deref().map(Runtime::from))
            .set_handler(update.handler.clone())
            .set_description(update.description.clone())
            .set_timeout(update.timeout)
            .set_memory_size(update.memory_size)
            .set_vpc_config(update.vpc_config.as_ref().map(lambda_vpc_config))
            .environment(lambda_environment(&update.environment))
            .set_layers(update.layers.clone())
            .send()
            .await
            .map_err(|err| {
                remote(
                    err,
                    format!(
                        "Failed to update configuration of function {:?}",
                        update.name
                    ),
                )
            })?;
        Ok(response.function_arn().unwrap_or_default().to_string())
    }

    async fn list_tags(&self, arn: &str) -> Result<Tags, ServiceError> {
        let response = self
            .client
            .list_tags()
            .resource(arn)
            .send()
            .await
            .map_err(|err| remote(err, format!("Failed to list tags of {:?}", arn)))?;
        Ok(to_tags(response.tags()))
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<(), ServiceError> {
        self.client
            .tag_resource()
            .resource(arn)
            .set_tags(Some(to_hash_map(tags)))
            .send()
            .await
            .map_err(|err| remote(err, format!("Failed to tag {:?}", arn)))?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<(), ServiceError> {
        self.client
            .untag_resource()
            .resource(arn)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(|err| remote(err, format!("Failed to untag {:?}", arn)))?;
        Ok(())
    }

    async fn create_alias(&self, alias: &AliasTarget) -> Result<String, ServiceError> {
        let response = self
            .client
            .create_alias()
            .function_name(&alias.function_name)
            .function_version(&alias.version)
            .name(&alias.name)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_resource_conflict_exception())
                {
                    ServiceError::AlreadyExists(format!("Alias {}", alias.name))
                } else {
                    remote(
                        err,
                        format!(
                            "Failed to create alias {:?} of function {:?}",
                            alias.name, alias.function_name
                        ),
                    )
                }
            })?;
        Ok(response.alias_arn().unwrap_or_default().to_string())
    }

    async fn update_alias(&self, alias: &AliasTarget) -> Result<String, ServiceError> {
        let response = self
            .client
            .update_alias()
            .function_name(&alias.function_name)
            .function_version(&alias.version)
            .name(&alias.name)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_resource_not_found_exception())
                {
                    ServiceError::NotFound(format!("Alias not found: {}", alias.name))
                } else {
                    remote(
                        err,
                        format!(
                            "Failed to update alias {:?} of function {:?}",
                            alias.name, alias.function_name
                        ),
                    )
                }
            })?;
        Ok(response.alias_arn().unwrap_or_default().to_string())
    }
}

/// Global Lambda service instance.
static CURRENT: OnceCell<LambdaService> = OnceCell::new();

/// Initialize the global Lambda service.
pub async fn init() -> anyhow::Result<()> {
    let settings: ClientSettings = envy::prefixed(CLIENT_SETTINGS_PREFIX)
        .from_env()
        .context("Failed to read AWS client settings from the environment")?;
    let config = aws_service_config(&settings).await;
    let service = LambdaService::new(Client::new(&config));
    CURRENT
        .set(service)
        .map_err(|_| anyhow!("client::CURRENT was already initialized"))
}

/// Get the current Lambda service instance, or panic if it hasn't
/// been initialized.
pub fn current() -> &'static LambdaService {
    CURRENT.get().expect("client is not initialized")
}
