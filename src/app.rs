use crate::config::Config;
use crate::hn::HnApi;
use crate::resilience::ResiliencePipeline;
use crate::state::AppState;
use crate::stories::{BestStoriesService, ResilientClient};
use crate::utils::fmt_duration;
use crate::web::create_router;
use crate::web::middleware::rate_limit::{RateLimitState, SharedRateLimitState};
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    rate_limit: SharedRateLimitState,
    shutdown: CancellationToken,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let api = HnApi::new(&config.upstream_base_url, config.upstream_timeout)
            .context("Failed to create upstream client")?;
        info!(
            base_url = %api.base_url(),
            timeout = fmt_duration(config.upstream_timeout),
            "upstream client configured"
        );

        let pipeline = Arc::new(ResiliencePipeline::new(
            config.retry_policy(),
            config.breaker(),
            config.upstream_timeout,
        ));
        let client = ResilientClient::new(Arc::new(api), pipeline);
        let stories = Arc::new(BestStoriesService::new(client, config.aggregator()));

        let shutdown = CancellationToken::new();
        stories.spawn_cache_sweeper(config.cache_sweep_interval, shutdown.child_token());

        let rate_limit = Arc::new(RateLimitState::new(config.rate_limit()));

        Ok(App {
            app_state: AppState::new(stories),
            rate_limit,
            shutdown,
            config,
        })
    }

    /// Serve until Ctrl-C/SIGTERM, then drain in-flight requests within the shutdown timeout.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = ?e, %addr, "Failed to bind listener");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "web server listening");

        let router = create_router(
            self.app_state.clone(),
            self.rate_limit.clone(),
            self.config.request_timeout,
        );

        let graceful = self.shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
        });

        tokio::select! {
            _ = shutdown_signal() => {}
            result = &mut server => {
                error!(result = ?result, "web server exited unexpectedly");
                self.shutdown.cancel();
                return ExitCode::FAILURE;
            }
        }

        info!(
            timeout = fmt_duration(self.config.shutdown_timeout),
            "shutdown signal received, draining requests"
        );
        self.shutdown.cancel();

        match tokio::time::timeout(self.config.shutdown_timeout, server).await {
            Ok(Ok(Ok(()))) => {
                info!("web server stopped gracefully");
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = ?e, "web server failed during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = ?e, "web server task panicked");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!("graceful shutdown timed out, exiting with requests in flight");
                ExitCode::FAILURE
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "received shutdown signal"),
        _ = terminate => info!(signal = "SIGTERM", "received shutdown signal"),
    }
}
