//! Vitals server
//!
//! Runs the reading → prediction → recording pipeline and serves the query
//! API over its shared store.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vitals_pipeline::{
    health::{components, HealthRegistry},
    predictor::{FileModelLoader, ModelLoader},
    Credentials, LineChartRenderer, PipelineBuilder, StateStore, StructuredLogger, Telemetry,
    TokenService,
};
use vitals_server::{api, config::ServerConfig};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting vitals-server");

    let config = ServerConfig::load()?;
    info!(
        api_port = config.api_port,
        interval_secs = config.generator_interval_secs,
        model_path = %config.model_path.display(),
        "Server configured"
    );
    if config.uses_development_secret() {
        warn!("No JWT secret configured, using the development key; set VITALS_JWT_SECRET");
    }

    let health_registry = HealthRegistry::new();
    for component in [
        components::GENERATOR,
        components::PREDICTOR,
        components::RECORDER,
        components::API,
    ] {
        health_registry.register(component).await;
    }

    let logger = StructuredLogger::new(format!("vitals-server:{}", config.api_port));
    let store = StateStore::new(config.buffer_capacity);

    // Bind before spawning agents so a taken port fails fast
    let listener = api::bind(config.api_port).await?;

    let loader: Arc<dyn ModelLoader> =
        Arc::new(FileModelLoader::new(Some(config.model_path.clone())));
    let runtime = PipelineBuilder::new(
        store.clone(),
        loader,
        Telemetry::new(health_registry.clone(), logger.clone()),
    )
    .interval(config.generator_interval())
    .seed(config.generator_seed)
    .readings_log(config.readings_log_path.clone())
    .mailbox_capacity(config.mailbox_capacity)
    .spawn()?;

    let agents: Vec<String> = runtime.addresses().iter().map(ToString::to_string).collect();
    logger.log_startup(SERVER_VERSION, &agents);

    let state = Arc::new(api::AppState::new(
        store,
        TokenService::new(&config.jwt_secret, config.token_ttl_secs),
        Credentials::new(&config.auth_username, &config.auth_password),
        Arc::new(LineChartRenderer::default()),
        health_registry.clone(),
    ));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut api_handle = tokio::spawn(api::serve(listener, state, async move {
        let _ = stop_rx.await;
    }));

    health_registry.set_ready(true).await;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        result = &mut api_handle => {
            health_registry.set_unhealthy(components::API, "API server exited").await;
            logger.log_shutdown("API server exited");
            runtime.shutdown().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(e.into()),
            };
        }
    }

    health_registry.set_ready(false).await;
    runtime.shutdown().await;
    let _ = stop_tx.send(());

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server failed during shutdown"),
        Err(e) => error!(error = %e, "API server task panicked"),
    }

    info!("Shutdown complete");
    Ok(())
}
