use anyhow::{Context, Result};
use lambda_migrate::{app, client};

/// Create or update the function described by the environment, and
/// print the outcome as JSON.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
    app::init()?;
    client::init().await?;

    let result = app::current()
        .handle(client::current())
        .await
        .with_context(|| {
            format!(
                "Failed to synchronize function {:?}",
                app::current().spec.name
            )
        })?;

    println!(
        "{}",
        serde_json::to_string(&result).context("Failed to serialize the result")?
    );
    Ok(())
}
