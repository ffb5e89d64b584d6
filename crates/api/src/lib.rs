//! HTTP gateway for ticket purchases.
//!
//! Exposes the purchase saga over REST, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{Collaborators, PendingCreditQueue, PurchaseCoordinator, Reconciler, ReconcilerConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use routes::purchase::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/buyTicket", post(routes::purchase::buy_ticket))
        .route("/pending", get(routes::pending::list))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the coordinator and the reconciliation worker around one pending queue.
///
/// The returned [`Reconciler`] has not been started; call [`Reconciler::spawn`]
/// exactly once.
pub fn create_state(
    services: Collaborators,
    reconciler_config: ReconcilerConfig,
) -> (AppState, Reconciler) {
    let pending = PendingCreditQueue::new();
    let reconciler = Reconciler::new(pending.clone(), services.loyalty.clone(), reconciler_config);
    let coordinator = PurchaseCoordinator::new(services, pending);
    (AppState::new(coordinator), reconciler)
}
