use anyhow::Context;

use stockledger_api::app;
use stockledger_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();
    stockledger_observability::init();

    let config = AppConfig::from_env()?;
    let services = app::services::build_services(&config)
        .await
        .context("failed to initialise the store")?;
    let backend = services.backend;

    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        store = backend.as_str(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
