//! Ticket purchase endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use saga::{BonusStatus, PendingCreditQueue, PurchaseCoordinator, PurchaseReceipt, PurchaseRequest};
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub coordinator: PurchaseCoordinator,
}

impl AppState {
    pub fn new(coordinator: PurchaseCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn pending(&self) -> &PendingCreditQueue {
        self.coordinator.pending()
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,
    pub flight: String,
    pub day: String,
    pub value_usd: f64,
    pub value_brl: f64,
    pub exchange_rate: f64,
    pub bonus_points: u32,
    pub bonus_status: BonusStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_key: Option<String>,
}

impl From<PurchaseReceipt> for PurchaseResponse {
    fn from(receipt: PurchaseReceipt) -> Self {
        Self {
            success: true,
            message: "Ticket purchased successfully".to_string(),
            transaction_id: receipt.transaction_id.to_string(),
            flight: receipt.flight_id,
            day: receipt.date,
            value_usd: receipt.price,
            value_brl: receipt.local_value,
            exchange_rate: receipt.exchange_rate,
            bonus_points: receipt.bonus_points,
            bonus_status: receipt.bonus_status,
            pending_key: receipt.pending_key.map(|key| key.as_str().to_string()),
        }
    }
}

// -- Handlers --

/// POST /buyTicket - run the purchase saga.
#[tracing::instrument(skip(state, request))]
pub async fn buy_ticket(
    State(state): State<AppState>,
    request: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let Json(request) = request.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected purchase body");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    let receipt = state.coordinator.purchase(request).await?;
    Ok(Json(PurchaseResponse::from(receipt)))
}
