use crate::config::Config;
use crate::config_validator::ConfigValidator;
use crate::error::AdmissionResult;
use crate::handlers::{api_status, health_check, index, metrics, not_found, AppState};
use crate::middleware::{admission_middleware, logging_middleware};
use crate::rate_limiter::RateLimiter;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the router: `/api` is guarded by the API policy, everything else by the app policy
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new().route("/status", get(api_status));

    Router::new()
        .nest("/api", api_routes)
        .route("/", get(index))
        .route("/health-check", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        // Group selection is by path prefix so `/api/` and unknown `/api` routes
        // count against the API policy whichever route matched.
        .layer(middleware::from_fn_with_state(
            state.route_groups(),
            admission_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.keys.clone(),
                    logging_middleware,
                )),
        )
        .with_state(state)
}

/// Periodically drop counters whose window has elapsed
pub fn spawn_sweeper(limiters: Vec<RateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            for limiter in &limiters {
                match limiter.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::debug!(policy = %limiter.name(), removed, "Swept idle counters")
                    }
                    Err(e) => {
                        tracing::warn!(policy = %limiter.name(), error = %e, "Counter sweep failed")
                    }
                }
            }
        }
    })
}

pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    pub async fn new(config: Config) -> AdmissionResult<Self> {
        ConfigValidator::validate_config(&config)?;
        let state = AppState::from_config(&config).await?;

        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> AdmissionResult<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("Admission filter listening on {}", listener.local_addr()?);
        tracing::info!(
            api_max = self.state.api.policy().max_requests,
            app_max = self.state.app.policy().max_requests,
            store = self.state.api.store().backend(),
            "Policies loaded"
        );
        tracing::info!("Health check available at /health-check");

        let sweeper = spawn_sweeper(self.state.limiters(), self.config.cleanup_interval());
        let app = create_app(self.state);

        // Run server with graceful shutdown
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        sweeper.abort();
        result?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
