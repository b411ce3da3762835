//! Brings a remote function in line with a [`FunctionSpec`]: creates
//! it when missing, otherwise updates configuration and then code,
//! and finally points the requested alias at the resulting version.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::SyncError;
use crate::service::{
    AliasTarget, CodeUpdate, ConfigurationUpdate, FunctionService, NewFunction,
    PublishedFunction, RemoteFunctionConfig, ServiceError,
};
use crate::spec::{CodeSource, FunctionSpec};
use crate::tags::reconcile_tags;

/// Outcome of a synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub function_arn: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_arn: Option<String>,
}

/// Merge the desired values over the remote configuration. Scalars
/// set in `spec` win; its environment variables are overlaid on the
/// remote ones, so remote-only variables survive.
pub fn reconcile_configuration(
    spec: &FunctionSpec,
    remote: &RemoteFunctionConfig,
) -> ConfigurationUpdate {
    let mut environment = remote.environment.clone();
    if let Some(overlay) = &spec.environment {
        environment.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    ConfigurationUpdate {
        name: spec.name.clone(),
        role: spec.role.clone().or_else(|| remote.role.clone()),
        runtime: spec.runtime.clone().or_else(|| remote.runtime.clone()),
        handler: spec.handler.clone().or_else(|| remote.handler.clone()),
        description: spec
            .description
            .clone()
            .or_else(|| remote.description.clone()),
        timeout: spec.timeout_seconds.or(remote.timeout),
        memory_size: spec.memory_size_mb.or(remote.memory_size),
        vpc_config: spec.vpc_config.clone(),
        environment,
        layers: spec.layers.clone(),
    }
}

/// Drives a single synchronization against a function service. Holds
/// no state between calls.
pub struct FunctionSynchronizer<'a, S: FunctionService + ?Sized> {
    service: &'a S,
}

impl<'a, S: FunctionService + ?Sized> FunctionSynchronizer<'a, S> {
    pub fn new(service: &'a S) -> Self {
        FunctionSynchronizer { service }
    }

    /// Create or update the function described by `spec`.
    #[instrument(skip_all, fields(function = %spec.name))]
    pub async fn sync(&self, spec: &FunctionSpec) -> Result<SyncResult, SyncError> {
        let source = spec.validate()?;
        match self.service.get_function(&spec.name).await {
            Ok(remote) => self.update(spec, &source, &remote).await,
            Err(ServiceError::NotFound(msg)) => {
                warn!("{}", msg);
                warn!("Creating function... {}", spec.name);
                self.create(spec, &source).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create(
        &self,
        spec: &FunctionSpec,
        source: &CodeSource,
    ) -> Result<SyncResult, SyncError> {
        let code = source.load().await?;
        let created = self
            .service
            .create_function(&NewFunction {
                name: spec.name.clone(),
                role: spec.role.clone(),
                runtime: spec.runtime.clone(),
                handler: spec.handler.clone(),
                description: spec.description.clone(),
                timeout: spec.timeout_seconds,
                memory_size: spec.memory_size_mb,
                publish: spec.publish,
                vpc_config: spec.vpc_config.clone(),
                environment: spec.environment.clone(),
                tags: spec.tags.clone(),
                layers: spec.layers.clone(),
                code,
            })
            .await?;
        info!("Create Lambda function requested: {}", created.arn);
        self.finish(spec, created).await
    }

    async fn update(
        &self,
        spec: &FunctionSpec,
        source: &CodeSource,
        remote: &RemoteFunctionConfig,
    ) -> Result<SyncResult, SyncError> {
        // A bad local archive must not leave a half-updated function
        let code = source.load().await?;

        // Configuration goes first, so a published version captures it
        let update = reconcile_configuration(spec, remote);
        let arn = self.service.update_function_configuration(&update).await?;
        info!("Update Lambda function configuration requested: {}", arn);
        reconcile_tags(self.service, &remote.arn, spec.tags.as_ref()).await?;

        let updated = self
            .service
            .update_function_code(&CodeUpdate {
                name: spec.name.clone(),
                code,
                publish: spec.publish,
            })
            .await?;
        info!("Update Lambda function requested: {}", updated.arn);
        self.finish(spec, updated).await
    }

    async fn finish(
        &self,
        spec: &FunctionSpec,
        function: PublishedFunction,
    ) -> Result<SyncResult, SyncError> {
        let alias_arn = match &spec.alias {
            Some(alias) => Some(
                self.upsert_alias(&AliasTarget {
                    name: alias.clone(),
                    function_name: spec.name.clone(),
                    version: function.version.clone(),
                })
                .await?,
            ),
            None => None,
        };
        Ok(SyncResult {
            function_arn: function.arn,
            version: function.version,
            alias_arn,
        })
    }

    /// Point an alias at a version, creating the alias if it doesn't
    /// exist yet.
    async fn upsert_alias(&self, alias: &AliasTarget) -> Result<String, SyncError> {
        info!("Create or Update alias {} for {}", alias.name, alias.version);
        let arn = match self.service.update_alias(alias).await {
            Ok(arn) => {
                info!("Update Lambda alias requested: {}", arn);
                arn
            }
            Err(e) if e.is_not_found() => {
                let arn = self.service.create_alias(alias).await?;
                info!("Create Lambda alias requested: {}", arn);
                arn
            }
            Err(e) => return Err(e.into()),
        };
        Ok(arn)
    }
}

/// Synchronize `spec` against `service`.
pub async fn sync<S>(service: &S, spec: &FunctionSpec) -> Result<SyncResult, SyncError>
where
    S: FunctionService + ?Sized,
{
    FunctionSynchronizer::new(service).sync(spec).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn remote() -> RemoteFunctionConfig {
        RemoteFunctionConfig {
            name: "f".to_string(),
            arn: "arn:aws:lambda:us-east-1:123456789012:function:f".to_string(),
            role: Some("arn:aws:iam::123456789012:role/old".to_string()),
            runtime: Some("python3.11".to_string()),
            handler: Some("app.handler".to_string()),
            description: Some("old".to_string()),
            timeout: Some(3),
            memory_size: Some(128),
            environment: env(&[("X", "1"), ("Y", "2")]),
        }
    }

    #[test]
    fn test_environment_is_overlaid() {
        let spec = FunctionSpec {
            name: "f".to_string(),
            environment: Some(env(&[("Y", "3"), ("Z", "4")])),
            ..FunctionSpec::default()
        };
        let update = reconcile_configuration(&spec, &remote());
        assert_eq!(update.environment, env(&[("X", "1"), ("Y", "3"), ("Z", "4")]));
    }

    #[test]
    fn test_remote_values_fill_unset_fields() {
        let spec = FunctionSpec {
            name: "f".to_string(),
            handler: Some("app.main".to_string()),
            memory_size_mb: Some(512),
            ..FunctionSpec::default()
        };
        let update = reconcile_configuration(&spec, &remote());
        assert_eq!(update.name, "f");
        assert_eq!(update.role.as_deref(), Some("arn:aws:iam::123456789012:role/old"));
        assert_eq!(update.runtime.as_deref(), Some("python3.11"));
        assert_eq!(update.handler.as_deref(), Some("app.main"));
        assert_eq!(update.description.as_deref(), Some("old"));
        assert_eq!(update.timeout, Some(3));
        assert_eq!(update.memory_size, Some(512));
        assert_eq!(update.environment, env(&[("X", "1"), ("Y", "2")]));
        assert_eq!(update.layers, None);
    }
}
