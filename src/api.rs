use axum::{Router, extract::DefaultBodyLimit};
use image_bus::{BatchOrchestrator, Converter, TargetFormat};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use crate::config::ConvertConfig;

pub(crate) fn app_router(config: &ConvertConfig) -> Router {
    let orchestrator =
        BatchOrchestrator::new(Converter::new(TargetFormat::Jpeg, config.quality()));

    let router = Router::new()
        .merge(crate::handler::convert::convert_router(orchestrator))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()));

    if config.static_dir().is_dir() {
        router.fallback_service(ServeDir::new(config.static_dir()))
    } else {
        log::warn!(
            "static dir {} not found, UI assets disabled",
            config.static_dir().display()
        );
        router
    }
}

pub(crate) fn start_api_server(
    config: &'static ConvertConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app = app_router(config);

        let listener = match TcpListener::bind(config.listen_addr()).await {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("Error binding {}: {}", config.listen_addr(), e);
                cancel.cancel();
                return;
            }
        };
        log::info!("Server is running at http://localhost:{}", config.port());
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
        {
            log::error!("Error starting API server: {}", e);
        }
    })
}

/// Waits for the server task to end. `false` if it panicked or was aborted.
pub(crate) async fn wait_for_server(server: JoinHandle<()>) -> bool {
    match server.await {
        Ok(()) => true,
        Err(e) => {
            log::error!("API server task failed: {}", e);
            false
        }
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {
            log::info!("Shutting down API server...");
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;
