//! Flight catalog: prices a flight on a given day.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use common::FlightQuote;
use reqwest::Client;
use tokio::sync::RwLock;

use super::FaultSwitch;
use super::http::{DEFAULT_TIMEOUT, HttpTransport};
use crate::error::DownstreamError;

/// Trait for flight price lookups.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns the price of `flight_id` on `date` in the reference currency.
    async fn quote(&self, flight_id: &str, date: &str) -> Result<FlightQuote, DownstreamError>;
}

/// Catalog client speaking to `GET /flight?flight=..&day=..`.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    transport: HttpTransport,
}

impl HttpCatalogClient {
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
impl CatalogService for HttpCatalogClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.transport.base_url()))]
    async fn quote(&self, flight_id: &str, date: &str) -> Result<FlightQuote, DownstreamError> {
        let request = self
            .transport
            .get("/flight")
            .query(&[("flight", flight_id), ("day", date)]);
        let response = self.transport.send(request).await?;
        let response = self.transport.ensure_success(response).await?;
        let quote: FlightQuote = self.transport.decode(response).await?;
        validate_price(quote)
    }
}

fn validate_price(quote: FlightQuote) -> Result<FlightQuote, DownstreamError> {
    if quote.price.is_finite() && quote.price >= 0.0 {
        Ok(quote)
    } else {
        Err(DownstreamError::DecodeFailure(format!(
            "invalid price {} for flight {}",
            quote.price, quote.flight_id
        )))
    }
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    flights: Arc<RwLock<HashMap<(String, String), f64>>>,
    faults: Arc<FaultSwitch>,
    calls: Arc<AtomicU32>,
}

impl InMemoryCatalogService {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given `(flight, day, price)` entries.
    pub fn with_flights<'a>(flights: impl IntoIterator<Item = (&'a str, &'a str, f64)>) -> Self {
        let map = flights
            .into_iter()
            .map(|(flight, day, price)| ((flight.to_string(), day.to_string()), price))
            .collect();
        Self {
            flights: Arc::new(RwLock::new(map)),
            ..Self::default()
        }
    }

    /// Adds or replaces a flight.
    pub async fn add_flight(&self, flight_id: &str, date: &str, price: f64) {
        self.flights
            .write()
            .await
            .insert((flight_id.to_string(), date.to_string()), price);
    }

    /// Makes every lookup fail until turned off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.set_always(unavailable);
    }

    /// Makes the next `count` lookups fail.
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next(count);
    }

    /// Number of lookups received, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn quote(&self, flight_id: &str, date: &str) -> Result<FlightQuote, DownstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.faults.trip() {
            return Err(DownstreamError::ConnectionFailure(
                "catalog unavailable".to_string(),
            ));
        }

        let flights = self.flights.read().await;
        match flights.get(&(flight_id.to_string(), date.to_string())) {
            Some(price) => Ok(FlightQuote {
                flight_id: flight_id.to_string(),
                date: date.to_string(),
                price: *price,
            }),
            None => Err(DownstreamError::UnexpectedStatus {
                status: 404,
                body: r#"{"error":"Flight not found"}"#.to_string(),
            }),
        }
    }
}
