//! Loyalty points ledger.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use common::{BonusAck, BonusRecord, BonusRequest, HealthResponse, PointsSummary};
use serde::Deserialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::faults::FaultConfig;

/// Per-user bonus history. Totals are derived from the records.
#[derive(Debug, Clone, Default)]
pub struct PointsLedger {
    records: Arc<RwLock<HashMap<String, Vec<BonusRecord>>>>,
    faults: FaultConfig,
}

impl PointsLedger {
    pub fn new(faults: FaultConfig) -> Self {
        Self {
            records: Arc::default(),
            faults,
        }
    }

    /// Appends a credit and returns the user's new total.
    pub async fn credit(&self, user: &str, bonus: i64) -> i64 {
        let mut records = self.records.write().await;
        let history = records.entry(user.to_string()).or_default();
        history.push(BonusRecord {
            bonus,
            timestamp: Utc::now(),
        });
        history.iter().map(|r| r.bonus).sum()
    }

    pub async fn summary(&self, user: &str) -> PointsSummary {
        let records = self.records.read().await;
        let history = records.get(user).cloned().unwrap_or_default();
        PointsSummary {
            user: user.to_string(),
            total_points: history.iter().map(|r| r.bonus).sum(),
            records: history,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PointsQuery {
    #[serde(default)]
    pub user: String,
}

/// Builds the fidelity router.
pub fn router(ledger: PointsLedger) -> Router {
    Router::new()
        .route("/bonus", post(bonus))
        .route("/points", get(points))
        .route("/health", get(health))
        .with_state(ledger)
        .layer(TraceLayer::new_for_http())
}

/// POST /bonus - credit points to a user.
#[tracing::instrument(skip(ledger, request))]
async fn bonus(
    State(ledger): State<PointsLedger>,
    request: Result<Json<BonusRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<BonusAck>, ServiceError> {
    let Json(request) =
        request.map_err(|_| ServiceError::BadRequest("Invalid request body".to_string()))?;

    if request.user.is_empty() || request.bonus <= 0 {
        return Err(ServiceError::BadRequest(
            "Invalid request: user and a positive bonus are required".to_string(),
        ));
    }

    if ledger.faults.should_fail() {
        return Err(ServiceError::Unavailable(
            "Fidelity service temporarily unavailable".to_string(),
        ));
    }

    let total_points = ledger.credit(&request.user, request.bonus).await;
    tracing::info!(user = %request.user, bonus = request.bonus, total_points, "bonus credited");

    Ok(Json(BonusAck {
        success: true,
        user: request.user,
        bonus_added: request.bonus,
        total_points,
    }))
}

/// GET /points?user=.. - a user's balance and history.
async fn points(
    State(ledger): State<PointsLedger>,
    Query(query): Query<PointsQuery>,
) -> Result<Json<PointsSummary>, ServiceError> {
    if query.user.is_empty() {
        return Err(ServiceError::BadRequest(
            "Missing required parameter: user".to_string(),
        ));
    }
    Ok(Json(ledger.summary(&query.user).await))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
