use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a recorded ticket sale.
///
/// Minted by the sale ledger. Callers carry it around as a receipt and never
/// inspect its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps an identifier returned by the sale ledger.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Price of a flight on a given day, in the catalog's reference currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuote {
    #[serde(rename = "flight")]
    pub flight_id: String,
    #[serde(rename = "day")]
    pub date: String,
    #[serde(rename = "value")]
    pub price: f64,
}

/// Body of `POST /sell`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellRequest {
    #[serde(rename = "flight")]
    pub flight_id: String,
    #[serde(rename = "day")]
    pub date: String,
}

/// Response of `POST /sell`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellResponse {
    #[serde(rename = "id")]
    pub transaction_id: TransactionId,
}

/// Body of `POST /bonus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRequest {
    pub user: String,
    pub bonus: i64,
}

/// Acknowledgement returned by `POST /bonus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusAck {
    pub success: bool,
    pub user: String,
    pub bonus_added: i64,
    pub total_points: i64,
}

/// A single credited bonus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRecord {
    pub bonus: i64,
    pub timestamp: DateTime<Utc>,
}

/// Response of `GET /points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSummary {
    pub user: String,
    pub total_points: i64,
    pub records: Vec<BonusRecord>,
}

/// Static liveness indicator served at `/health` by every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}
