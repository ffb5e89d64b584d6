pub mod health;
pub mod metrics;
pub mod pending;
pub mod purchase;
