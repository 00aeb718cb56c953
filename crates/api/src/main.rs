use anyhow::Context;

use goldline_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    goldline_observability::init(config.log_format);

    let services = goldline_api::app::services::AppServices::from_config(&config)
        .await
        .context("failed to initialise services")?;
    let app = goldline_api::app::build_app(std::sync::Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")
}
