//! Ticket purchase saga.
//!
//! A purchase spans four independently owned services and runs these steps
//! in order:
//! 1. Price the flight (catalog)
//! 2. Fetch the exchange rate (conversion)
//! 3. Record the sale (sale ledger)
//! 4. Credit loyalty points (loyalty)
//!
//! In strict mode any failure aborts the purchase. In tolerant mode the quote
//! lookup is retried, and a bonus that cannot be confirmed is queued as a
//! pending credit that a background [`Reconciler`] keeps delivering. There is
//! no compensation: a recorded sale stays recorded.

pub mod coordinator;
pub mod error;
pub mod pending;
pub mod purchase;
pub mod reconciler;
pub mod retry;
pub mod services;
pub mod state;

pub use coordinator::{PurchaseCoordinator, SagaPolicies};
pub use error::{DownstreamError, ErrorKind, RetriesExhausted, SagaError, StepError};
pub use pending::{PendingCredit, PendingCreditQueue, PendingKey};
pub use purchase::{
    BonusStatus, PurchaseMode, PurchaseReceipt, PurchaseRequest, PurchaseStep,
    compute_bonus_points, compute_local_value,
};
pub use reconciler::{CycleReport, Reconciler, ReconcilerConfig, ReconcilerHandle};
pub use retry::{Backoff, RetryPolicy, execute_with_retry};
pub use services::{
    CatalogService, Collaborators, ExchangeService, HttpCatalogClient, HttpExchangeClient,
    HttpLoyaltyClient, HttpSaleLedgerClient, InMemoryCatalogService, InMemoryExchangeService,
    InMemoryLoyaltyService, InMemorySaleLedger, LoyaltyService, SaleLedgerService, SaleRecord,
    ServiceEndpoints,
};
pub use state::{PurchaseProgress, PurchaseState};
