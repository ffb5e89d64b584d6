//! Currency conversion: reference currency to local currency multiplier.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;

use super::FaultSwitch;
use super::http::{EXCHANGE_TIMEOUT, HttpTransport};
use crate::error::DownstreamError;

/// Trait for exchange-rate lookups.
#[async_trait]
pub trait ExchangeService: Send + Sync {
    /// Returns a positive multiplier, valid for the current request only.
    async fn rate(&self) -> Result<f64, DownstreamError>;
}

/// Exchange client speaking to `GET /exchange`.
///
/// The transport timeout and the response deadline are the same duration, but
/// the deadline is also checked against the measured elapsed time once the
/// response arrives: a late answer is a timeout even if the transport let it
/// through.
#[derive(Debug, Clone)]
pub struct HttpExchangeClient {
    transport: HttpTransport,
}

impl HttpExchangeClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            transport: HttpTransport::new(client, base_url, EXCHANGE_TIMEOUT),
        }
    }

    pub fn with_transport(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ExchangeService for HttpExchangeClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.transport.base_url()))]
    async fn rate(&self) -> Result<f64, DownstreamError> {
        let start = Instant::now();
        let response = self.transport.send(self.transport.get("/exchange")).await?;
        check_deadline(start.elapsed(), self.transport.timeout())?;

        let response = self.transport.ensure_success(response).await?;
        let rate: f64 = self.transport.decode(response).await?;
        validate_rate(rate)
    }
}

/// Converts an overrun of `deadline` into a timeout.
pub fn check_deadline(elapsed: Duration, deadline: Duration) -> Result<(), DownstreamError> {
    if elapsed > deadline {
        tracing::warn!(?elapsed, ?deadline, "exchange response arrived after deadline");
        return Err(DownstreamError::Timeout(deadline));
    }
    Ok(())
}

fn validate_rate(rate: f64) -> Result<f64, DownstreamError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(DownstreamError::DecodeFailure(format!(
            "invalid exchange rate {rate}"
        )))
    }
}

/// In-memory exchange service for testing. Always quotes the same rate.
#[derive(Debug, Clone)]
pub struct InMemoryExchangeService {
    rate_bits: Arc<AtomicU64>,
    faults: Arc<FaultSwitch>,
    calls: Arc<AtomicU32>,
}

impl InMemoryExchangeService {
    pub fn new(rate: f64) -> Self {
        Self {
            rate_bits: Arc::new(AtomicU64::new(rate.to_bits())),
            faults: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn set_rate(&self, rate: f64) {
        self.rate_bits.store(rate.to_bits(), Ordering::SeqCst);
    }

    /// Makes every lookup time out until turned off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.set_always(unavailable);
    }

    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next(count);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryExchangeService {
    fn default() -> Self {
        Self::new(5.5)
    }
}

#[async_trait]
impl ExchangeService for InMemoryExchangeService {
    async fn rate(&self) -> Result<f64, DownstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.trip() {
            return Err(DownstreamError::Timeout(EXCHANGE_TIMEOUT));
        }
        Ok(f64::from_bits(self.rate_bits.load(Ordering::SeqCst)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_deadline_overrun_is_timeout() {
        let deadline = Duration::from_secs(1);
        assert!(check_deadline(Duration::from_millis(999), deadline).is_ok());
        assert!(check_deadline(deadline, deadline).is_ok());
        assert_eq!(
            check_deadline(Duration::from_millis(1001), deadline),
            Err(DownstreamError::Timeout(deadline))
        );
    }

    #[tokio::test]
    async fn test_http_rate_is_bare_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_string("5.4321\n"))
            .mount(&server)
            .await;

        let client = HttpExchangeClient::new(Client::new(), server.uri());
        assert_eq!(client.rate().await.unwrap(), 5.4321);
    }

    #[tokio::test]
    async fn test_http_rate_rejects_non_positive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0"))
            .mount(&server)
            .await;

        let client = HttpExchangeClient::new(Client::new(), server.uri());
        assert!(matches!(
            client.rate().await,
            Err(DownstreamError::DecodeFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_http_rate_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exchange"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("5.5")
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(Client::new(), server.uri(), Duration::from_millis(100));
        let client = HttpExchangeClient::with_transport(transport);
        assert_eq!(
            client.rate().await,
            Err(DownstreamError::Timeout(Duration::from_millis(100)))
        );
    }

    #[tokio::test]
    async fn test_http_rate_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exchange"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = HttpExchangeClient::new(Client::new(), server.uri());
        assert_eq!(
            client.rate().await,
            Err(DownstreamError::UnexpectedStatus {
                status: 500,
                body: "boom".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_in_memory_rate() {
        let exchange = InMemoryExchangeService::new(5.5);
        assert_eq!(exchange.rate().await.unwrap(), 5.5);
        exchange.set_unavailable(true);
        assert!(matches!(
            exchange.rate().await,
            Err(DownstreamError::Timeout(_))
        ));
        assert_eq!(exchange.call_count(), 2);
    }
}
