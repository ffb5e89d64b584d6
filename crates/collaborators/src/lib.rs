//! Reference implementations of the services the purchase gateway talks to.
//!
//! - `airlineshub`: flight catalog and sale ledger
//! - `exchange`: reference-to-local currency rate
//! - `fidelity`: loyalty points
//!
//! Each store is an owned object behind a readers-writer lock, handed to its
//! router as shared state.

pub mod airlineshub;
pub mod error;
pub mod exchange;
pub mod faults;
pub mod fidelity;
pub mod server;

pub use airlineshub::FlightCatalog;
pub use error::ServiceError;
pub use exchange::ExchangeDesk;
pub use faults::FaultConfig;
pub use fidelity::PointsLedger;
