//! Ticket purchase request, steps and receipt.

use common::TransactionId;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::pending::PendingKey;

/// The saga type identifier for ticket purchases.
pub const SAGA_TYPE: &str = "TicketPurchase";

/// A request to buy a ticket and credit the buyer's loyalty account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(rename = "flight", default)]
    pub flight_id: String,
    #[serde(rename = "day", default)]
    pub date: String,
    #[serde(rename = "user", default)]
    pub user_id: String,
    #[serde(rename = "ft", default)]
    pub fault_tolerant: bool,
}

impl PurchaseRequest {
    pub fn new(
        flight_id: impl Into<String>,
        date: impl Into<String>,
        user_id: impl Into<String>,
        fault_tolerant: bool,
    ) -> Self {
        Self {
            flight_id: flight_id.into(),
            date: date.into(),
            user_id: user_id.into(),
            fault_tolerant,
        }
    }

    /// Rejects requests with empty fields.
    pub fn validate(&self) -> Result<(), SagaError> {
        let missing: Vec<&str> = [
            ("flight", &self.flight_id),
            ("day", &self.date),
            ("user", &self.user_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SagaError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn mode(&self) -> PurchaseMode {
        if self.fault_tolerant {
            PurchaseMode::Tolerant
        } else {
            PurchaseMode::Strict
        }
    }
}

/// How the purchase reacts to downstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseMode {
    /// Any failure aborts the purchase.
    Strict,
    /// The quote lookup is retried and an unconfirmed bonus is deferred.
    Tolerant,
}

impl std::fmt::Display for PurchaseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseMode::Strict => f.write_str("strict"),
            PurchaseMode::Tolerant => f.write_str("tolerant"),
        }
    }
}

/// One downstream call of the purchase saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStep {
    Quote,
    Rate,
    Sale,
    Bonus,
}

impl PurchaseStep {
    /// Returns the step name used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStep::Quote => "fetch_quote",
            PurchaseStep::Rate => "fetch_rate",
            PurchaseStep::Sale => "record_sale",
            PurchaseStep::Bonus => "credit_bonus",
        }
    }

    /// Describes the step for failure messages ("Failed to ...").
    pub fn action(&self) -> &'static str {
        match self {
            PurchaseStep::Quote => "get flight info",
            PurchaseStep::Rate => "get exchange rate",
            PurchaseStep::Sale => "sell ticket",
            PurchaseStep::Bonus => "register bonus",
        }
    }
}

impl std::fmt::Display for PurchaseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the loyalty credit was confirmed during the purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusStatus {
    Processed,
    Pending,
}

impl BonusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusStatus::Processed => "processed",
            BonusStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for BonusStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything captured by a completed purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseReceipt {
    pub transaction_id: TransactionId,
    pub flight_id: String,
    pub date: String,
    /// Price in the catalog's reference currency.
    pub price: f64,
    pub exchange_rate: f64,
    /// `price * exchange_rate`, unrounded.
    pub local_value: f64,
    pub bonus_points: u32,
    pub bonus_status: BonusStatus,
    /// Queue entry holding the deferred credit when `bonus_status` is pending.
    pub pending_key: Option<PendingKey>,
}

/// Loyalty points earned for a price: the price rounded half away from zero.
///
/// Negative prices never reach this point (the catalog adapter rejects them),
/// but they clamp to zero rather than wrap.
pub fn compute_bonus_points(price: f64) -> u32 {
    price.round().max(0.0) as u32
}

/// Price converted to the local currency.
pub fn compute_local_value(price: f64, rate: f64) -> f64 {
    price * rate
}
