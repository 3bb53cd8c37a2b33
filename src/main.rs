mod business_logic;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::business_logic::config::{ScannerConfig, ServerConfig};
use crate::routes::ApiDoc;
use crate::services::binance::BinanceClient;
use crate::services::clock::SystemClock;
use crate::services::presenter::BroadcastPresenter;
use crate::services::scanner::Scanner;
use crate::state::AppState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_config = ServerConfig::from_env();
    let _log_guard = init_tracing(server_config.log_dir.as_deref());

    let scanner_config = ScannerConfig::from_env();
    let client = BinanceClient::new(&scanner_config)?;

    let (broadcaster, _receiver) = tokio::sync::broadcast::channel(64);
    let presenter = Arc::new(BroadcastPresenter::new(broadcaster));

    let autostart = scanner_config.autostart;
    let scanner = Scanner::new(
        scanner_config,
        Arc::new(client),
        Arc::new(SystemClock),
        presenter.clone(),
    );

    if autostart {
        tracing::info!("Autostart enabled, beginning scan");
        scanner.start();
    }

    let state = AppState {
        scanner: scanner.clone(),
        presenter,
    };
    let app = routes::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let addr = server_config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server running on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scanner.stop();
    if tokio::time::timeout(SHUTDOWN_GRACE, scanner.join()).await.is_err() {
        tracing::warn!("Sweep still in progress after {:?}, exiting anyway", SHUTDOWN_GRACE);
    }

    Ok(())
}

/// Stdout always; a daily rolling file as well when a log directory is configured.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "reversal-scanner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reversal_scanner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
