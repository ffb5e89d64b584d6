//! Loyalty program: accumulates bonus points per user.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use common::BonusRequest;
use reqwest::Client;
use tokio::sync::RwLock;

use super::FaultSwitch;
use super::http::{DEFAULT_TIMEOUT, HttpTransport};
use crate::error::DownstreamError;

/// Trait for crediting bonus points.
#[async_trait]
pub trait LoyaltyService: Send + Sync {
    async fn credit(&self, user: &str, points: u32) -> Result<(), DownstreamError>;
}

/// Loyalty client speaking to `POST /bonus`.
#[derive(Debug, Clone)]
pub struct HttpLoyaltyClient {
    transport: HttpTransport,
}

impl HttpLoyaltyClient {
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
impl LoyaltyService for HttpLoyaltyClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.transport.base_url()))]
    async fn credit(&self, user: &str, points: u32) -> Result<(), DownstreamError> {
        let body = BonusRequest {
            user: user.to_string(),
            bonus: i64::from(points),
        };
        let response = self
            .transport
            .send(self.transport.post("/bonus").json(&body))
            .await?;
        self.transport.ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryLoyaltyState {
    points: HashMap<String, u64>,
    deliveries: Vec<(String, u32)>,
}

/// In-memory loyalty service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoyaltyService {
    state: Arc<RwLock<InMemoryLoyaltyState>>,
    faults: Arc<FaultSwitch>,
    calls: Arc<AtomicU32>,
}

impl InMemoryLoyaltyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every credit fail until turned off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.set_always(unavailable);
    }

    /// Makes the next `count` credits fail.
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next(count);
    }

    /// Number of credit calls received, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total points credited to `user`.
    pub async fn points(&self, user: &str) -> u64 {
        self.state
            .read()
            .await
            .points
            .get(user)
            .copied()
            .unwrap_or(0)
    }

    /// Successful credits, in order.
    pub async fn deliveries(&self) -> Vec<(String, u32)> {
        self.state.read().await.deliveries.clone()
    }
}

#[async_trait]
impl LoyaltyService for InMemoryLoyaltyService {
    async fn credit(&self, user: &str, points: u32) -> Result<(), DownstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.trip() {
            return Err(DownstreamError::ConnectionFailure(
                "loyalty service unavailable".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        *state.points.entry(user.to_string()).or_default() += u64::from(points);
        state.deliveries.push((user.to_string(), points));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_credit_posts_user_and_bonus() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bonus"))
            .and(body_json(serde_json::json!({"user": "bob", "bonus": 500})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "user": "bob",
                "bonus_added": 500,
                "total_points": 500
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpLoyaltyClient::new(Client::new(), server.uri());
        client.credit("bob", 500).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_credit_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bonus"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = HttpLoyaltyClient::new(Client::new(), server.uri());
        assert_eq!(
            client.credit("bob", 500).await,
            Err(DownstreamError::UnexpectedStatus {
                status: 503,
                body: "down".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_in_memory_accumulates_points() {
        let loyalty = InMemoryLoyaltyService::new();
        loyalty.credit("bob", 500).await.unwrap();
        loyalty.credit("bob", 250).await.unwrap();
        loyalty.credit("alice", 10).await.unwrap();

        assert_eq!(loyalty.points("bob").await, 750);
        assert_eq!(loyalty.points("carol").await, 0);
        assert_eq!(loyalty.deliveries().await.len(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_scheduled_failures() {
        let loyalty = InMemoryLoyaltyService::new();
        loyalty.fail_next(2);
        assert!(loyalty.credit("bob", 1).await.is_err());
        assert!(loyalty.credit("bob", 1).await.is_err());
        assert!(loyalty.credit("bob", 1).await.is_ok());
        assert_eq!(loyalty.call_count(), 3);
        assert_eq!(loyalty.points("bob").await, 1);
    }
}
