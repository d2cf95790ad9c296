use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = taskdeck::Config::from_env()?;
    tracing::info!(
        "Starting taskdeck (db: {}, dev_mode: {})",
        config.database_path.display(),
        config.dev_mode
    );

    taskdeck::api::serve(config).await
}
