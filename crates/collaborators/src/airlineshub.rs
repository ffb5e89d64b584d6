//! Flight catalog and sale ledger.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::{FlightQuote, HealthResponse, SellRequest, SellResponse, TransactionId};
use serde::Deserialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;

/// Flights offered by default: `(flight, day, price)`.
pub const SEED_FLIGHTS: &[(&str, &str, f64)] = &[
    ("AA123", "2025-11-15", 500.00),
    ("AA123", "2025-11-20", 550.00),
    ("BA456", "2025-11-15", 750.00),
    ("BA456", "2025-12-01", 800.00),
    ("LA789", "2025-11-25", 450.00),
    ("LA789", "2025-12-10", 480.00),
    ("UA999", "2025-11-30", 920.00),
    ("DL555", "2025-12-05", 680.00),
];

/// A recorded sale.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub flight_id: String,
    pub date: String,
    pub sold_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CatalogState {
    flights: HashMap<(String, String), f64>,
    transactions: HashMap<TransactionId, Transaction>,
}

/// Flight prices plus the ledger of sold tickets.
#[derive(Debug, Clone, Default)]
pub struct FlightCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl FlightCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding [`SEED_FLIGHTS`].
    pub fn seeded() -> Self {
        let flights = SEED_FLIGHTS
            .iter()
            .map(|(flight, day, price)| ((flight.to_string(), day.to_string()), *price))
            .collect();
        Self {
            state: Arc::new(RwLock::new(CatalogState {
                flights,
                transactions: HashMap::new(),
            })),
        }
    }

    pub async fn add_flight(&self, flight_id: &str, date: &str, price: f64) {
        self.state
            .write()
            .await
            .flights
            .insert((flight_id.to_string(), date.to_string()), price);
    }

    pub async fn quote(&self, flight_id: &str, date: &str) -> Option<FlightQuote> {
        let state = self.state.read().await;
        state
            .flights
            .get(&(flight_id.to_string(), date.to_string()))
            .map(|price| FlightQuote {
                flight_id: flight_id.to_string(),
                date: date.to_string(),
                price: *price,
            })
    }

    /// Records a sale of an existing flight. Every call mints a new transaction.
    pub async fn sell(&self, flight_id: &str, date: &str) -> Option<Transaction> {
        let mut state = self.state.write().await;
        if !state
            .flights
            .contains_key(&(flight_id.to_string(), date.to_string()))
        {
            return None;
        }

        let transaction = Transaction {
            id: TransactionId::new(uuid::Uuid::new_v4().to_string()),
            flight_id: flight_id.to_string(),
            date: date.to_string(),
            sold_at: Utc::now(),
        };
        state
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Some(transaction)
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    pub async fn transaction(&self, id: &TransactionId) -> Option<Transaction> {
        self.state.read().await.transactions.get(id).cloned()
    }
}

#[derive(Debug, Deserialize)]
pub struct FlightQuery {
    #[serde(default)]
    pub flight: String,
    #[serde(default)]
    pub day: String,
}

/// Builds the airlineshub router.
pub fn router(catalog: FlightCatalog) -> Router {
    Router::new()
        .route("/flight", get(get_flight))
        .route("/sell", post(sell))
        .route("/health", get(health))
        .with_state(catalog)
        .layer(TraceLayer::new_for_http())
}

/// GET /flight?flight=..&day=.. - price a flight.
#[tracing::instrument(skip(catalog))]
async fn get_flight(
    State(catalog): State<FlightCatalog>,
    Query(query): Query<FlightQuery>,
) -> Result<Json<FlightQuote>, ServiceError> {
    if query.flight.is_empty() || query.day.is_empty() {
        return Err(ServiceError::BadRequest(
            "Missing required parameters: flight and day".to_string(),
        ));
    }

    let quote = catalog
        .quote(&query.flight, &query.day)
        .await
        .ok_or_else(|| ServiceError::NotFound("Flight not found".to_string()))?;

    tracing::info!(flight = %quote.flight_id, day = %quote.date, price = quote.price, "flight query");
    Ok(Json(quote))
}

/// POST /sell - record a ticket sale.
#[tracing::instrument(skip(catalog, request))]
async fn sell(
    State(catalog): State<FlightCatalog>,
    request: Result<Json<SellRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<(StatusCode, Json<SellResponse>), ServiceError> {
    let Json(request) =
        request.map_err(|_| ServiceError::BadRequest("Invalid request body".to_string()))?;

    if request.flight_id.is_empty() || request.date.is_empty() {
        return Err(ServiceError::BadRequest(
            "Missing required fields: flight and day".to_string(),
        ));
    }

    let transaction = catalog
        .sell(&request.flight_id, &request.date)
        .await
        .ok_or_else(|| ServiceError::NotFound("Flight not found".to_string()))?;

    tracing::info!(
        transaction_id = %transaction.id,
        flight = %transaction.flight_id,
        day = %transaction.date,
        "ticket sold"
    );
    Ok((
        StatusCode::CREATED,
        Json(SellResponse {
            transaction_id: transaction.id,
        }),
    ))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
