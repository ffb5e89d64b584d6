//! Sale ledger: durably records a sold ticket.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use common::{SellRequest, SellResponse, TransactionId};
use reqwest::Client;
use tokio::sync::RwLock;

use super::FaultSwitch;
use super::http::{DEFAULT_TIMEOUT, HttpTransport};
use crate::error::DownstreamError;

/// Result of a successful sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub transaction_id: TransactionId,
    pub flight_id: String,
    pub date: String,
}

/// Trait for recording ticket sales.
///
/// No idempotency key is sent: calling `sell` twice for the same flight and
/// day records two sales.
#[async_trait]
pub trait SaleLedgerService: Send + Sync {
    async fn sell(&self, flight_id: &str, date: &str) -> Result<SaleRecord, DownstreamError>;
}

/// Sale ledger client speaking to `POST /sell`.
#[derive(Debug, Clone)]
pub struct HttpSaleLedgerClient {
    transport: HttpTransport,
}

impl HttpSaleLedgerClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            transport: HttpTransport::new(client, base_url, DEFAULT_TIMEOUT),
        }
    }

    pub fn with_transport(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SaleLedgerService for HttpSaleLedgerClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.transport.base_url()))]
    async fn sell(&self, flight_id: &str, date: &str) -> Result<SaleRecord, DownstreamError> {
        let body = SellRequest {
            flight_id: flight_id.to_string(),
            date: date.to_string(),
        };
        let response = self
            .transport
            .send(self.transport.post("/sell").json(&body))
            .await?;
        let response = self.transport.ensure_success(response).await?;
        let sold: SellResponse = self.transport.decode(response).await?;

        Ok(SaleRecord {
            transaction_id: sold.transaction_id,
            flight_id: body.flight_id,
            date: body.date,
        })
    }
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    sales: HashMap<TransactionId, (String, String)>,
    next_id: u32,
}

/// In-memory sale ledger for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySaleLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
    faults: Arc<FaultSwitch>,
    calls: Arc<AtomicU32>,
}

impl InMemorySaleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every sale fail until turned off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.set_always(unavailable);
    }

    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next(count);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of recorded sales.
    pub async fn sale_count(&self) -> usize {
        self.state.read().await.sales.len()
    }

    pub async fn has_sale(&self, transaction_id: &TransactionId) -> bool {
        self.state.read().await.sales.contains_key(transaction_id)
    }
}

#[async_trait]
impl SaleLedgerService for InMemorySaleLedger {
    async fn sell(&self, flight_id: &str, date: &str) -> Result<SaleRecord, DownstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.trip() {
            return Err(DownstreamError::UnexpectedStatus {
                status: 503,
                body: "ledger unavailable".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.next_id += 1;
        let transaction_id = TransactionId::new(format!("TX-{:04}", state.next_id));
        state.sales.insert(
            transaction_id.clone(),
            (flight_id.to_string(), date.to_string()),
        );

        Ok(SaleRecord {
            transaction_id,
            flight_id: flight_id.to_string(),
            date: date.to_string(),
        })
    }
}
