//! Downstream collaborator traits, HTTP clients and in-memory implementations.
//!
//! No client retries internally; retry policy belongs to the coordinator and
//! the reconciliation worker.

pub mod catalog;
pub mod exchange;
pub mod http;
pub mod ledger;
pub mod loyalty;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use reqwest::Client;

pub use catalog::{CatalogService, HttpCatalogClient, InMemoryCatalogService};
pub use exchange::{ExchangeService, HttpExchangeClient, InMemoryExchangeService};
pub use http::HttpTransport;
pub use ledger::{HttpSaleLedgerClient, InMemorySaleLedger, SaleLedgerService, SaleRecord};
pub use loyalty::{HttpLoyaltyClient, InMemoryLoyaltyService, LoyaltyService};

/// Base URLs of the collaborator services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Serves both the flight catalog and the sale ledger.
    pub airlineshub_url: String,
    pub exchange_url: String,
    pub fidelity_url: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            airlineshub_url: "http://localhost:8081".to_string(),
            exchange_url: "http://localhost:8082".to_string(),
            fidelity_url: "http://localhost:8083".to_string(),
        }
    }
}

/// The four downstream services a purchase talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogService>,
    pub exchange: Arc<dyn ExchangeService>,
    pub ledger: Arc<dyn SaleLedgerService>,
    pub loyalty: Arc<dyn LoyaltyService>,
}

impl Collaborators {
    /// HTTP clients sharing one connection pool.
    pub fn http(client: Client, endpoints: &ServiceEndpoints) -> Self {
        Self {
            catalog: Arc::new(HttpCatalogClient::new(
                client.clone(),
                endpoints.airlineshub_url.clone(),
            )),
            exchange: Arc::new(HttpExchangeClient::new(
                client.clone(),
                endpoints.exchange_url.clone(),
            )),
            ledger: Arc::new(HttpSaleLedgerClient::new(
                client.clone(),
                endpoints.airlineshub_url.clone(),
            )),
            loyalty: Arc::new(HttpLoyaltyClient::new(
                client,
                endpoints.fidelity_url.clone(),
            )),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Failure injection for the in-memory services.
#[derive(Debug, Default)]
struct FaultSwitch {
    always: AtomicBool,
    remaining: AtomicU32,
}

impl FaultSwitch {
    fn set_always(&self, fail: bool) {
        self.always.store(fail, Ordering::SeqCst);
    }

    fn fail_next(&self, count: u32) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Consumes one scheduled failure, if any.
    fn trip(&self) -> bool {
        if self.always.load(Ordering::SeqCst) {
            return true;
        }
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
