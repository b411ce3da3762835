//! Defines the read-only application state, derived once from the
//! environment.

use crate::conf::Settings;
use crate::error::SyncError;
use crate::service::FunctionService;
use crate::spec::FunctionSpec;
use crate::sync::{sync, SyncResult};
use anyhow::{anyhow, Context, Result};
use envy::from_env;
use once_cell::sync::OnceCell;
use tracing::instrument;

/// An App is an initialized application state, derived from
/// settings.
#[derive(Debug)]
pub struct App {
    /// The original settings.
    pub settings: Settings,

    /// The function to synchronize.
    pub spec: FunctionSpec,
}

impl App {
    /// Initialize an App instance given a settings struct. Consumes
    /// the settings struct. Fails early if the described function
    /// could never be synchronized.
    pub fn new(settings: Settings) -> Result<Self> {
        let spec = settings.function_spec();
        spec.validate()
            .with_context(|| format!("Invalid settings for function {:?}", spec.name))?;
        Ok(App { settings, spec })
    }

    /// Synchronize the configured function.
    #[instrument(skip_all, fields(function = %self.spec.name))]
    pub async fn handle<S>(&self, service: &S) -> Result<SyncResult, SyncError>
    where
        S: FunctionService + ?Sized,
    {
        sync(service, &self.spec).await
    }
}

/// Global App instance.
static CURRENT: OnceCell<App> = OnceCell::new();

/// Initialize the global App instance.
pub fn init() -> Result<()> {
    let settings = from_env().context("Failed to read settings from the environment")?;
    let app = App::new(settings)?;
    CURRENT
        .set(app)
        .map_err(|_| anyhow!("app::CURRENT was already initialized"))
}

/// Get the current App instance, or panic if it hasn't been
/// initialized.
pub fn current() -> &'static App {
    CURRENT.get().expect("app is not initialized")
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
    fn test_app_rejects_invalid_settings() {
        let result = App::new(settings(&[("FUNCTION_NAME", "f")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_app_keeps_spec() {
        let app = App::new(settings(&[
            ("FUNCTION_NAME", "f"),
            ("S3_BUCKET", "artifacts"),
            ("S3_KEY", "f.zip"),
        ]))
        .unwrap();
        assert_eq!(app.spec.name, "f");
        assert_eq!(app.settings.s3_bucket.as_deref(), Some("artifacts"));
    }
}
