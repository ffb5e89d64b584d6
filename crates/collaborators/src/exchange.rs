//! Currency exchange desk.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use common::HealthResponse;
use rand::Rng;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::faults::FaultConfig;

/// Lower bound of the quoted rate.
pub const RATE_MIN: f64 = 5.0;
/// Exclusive upper bound of the quoted rate.
pub const RATE_MAX: f64 = 6.0;

/// Quotes a fresh rate in `[RATE_MIN, RATE_MAX)` on each request.
#[derive(Debug, Clone)]
pub struct ExchangeDesk {
    faults: FaultConfig,
    /// Fixed rate as `f64` bits, `0` when unset.
    pinned: Arc<AtomicU64>,
    served: Arc<AtomicU64>,
}

impl ExchangeDesk {
    pub fn new(faults: FaultConfig) -> Self {
        Self {
            faults,
            pinned: Arc::new(AtomicU64::new(0)),
            served: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Always quotes `rate`.
    pub fn pinned(rate: f64, faults: FaultConfig) -> Self {
        let desk = Self::new(faults);
        desk.pinned.store(rate.to_bits(), Ordering::SeqCst);
        desk
    }

    pub fn quote(&self) -> f64 {
        self.served.fetch_add(1, Ordering::SeqCst);
        match self.pinned.load(Ordering::SeqCst) {
            0 => rand::thread_rng().gen_range(RATE_MIN..RATE_MAX),
            bits => f64::from_bits(bits),
        }
    }

    pub fn quotes_served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }
}

impl Default for ExchangeDesk {
    fn default() -> Self {
        Self::new(FaultConfig::none())
    }
}

/// Builds the exchange router.
pub fn router(desk: ExchangeDesk) -> Router {
    Router::new()
        .route("/exchange", get(exchange))
        .route("/health", get(health))
        .with_state(desk)
        .layer(TraceLayer::new_for_http())
}

/// GET /exchange - the rate as a bare JSON number.
async fn exchange(State(desk): State<ExchangeDesk>) -> Result<Json<f64>, ServiceError> {
    desk.faults.maybe_delay().await;
    if desk.faults.should_fail() {
        return Err(ServiceError::Unavailable(
            "Exchange service temporarily unavailable".to_string(),
        ));
    }

    let rate = desk.quote();
    tracing::info!(rate, "exchange rate quoted");
    Ok(Json(rate))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
