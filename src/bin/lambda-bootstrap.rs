use anyhow::{anyhow, Context, Result};
use lambda_migrate::{client, sync, FunctionSpec, SyncResult};
use lambda_runtime::{run, service_fn, LambdaEvent};

/// Synchronize the function described by the event payload.
async fn function_handler(event: LambdaEvent<FunctionSpec>) -> Result<SyncResult> {
    let spec = event.payload;
    sync(client::current(), &spec)
        .await
        .with_context(|| format!("Failed to synchronize function {:?}", spec.name))
}

/// Run an AWS Lambda function that receives function specs as events
/// and creates or updates each described function, returning the
/// resulting ARN, version and alias.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    client::init().await?;

    run(service_fn(function_handler))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
