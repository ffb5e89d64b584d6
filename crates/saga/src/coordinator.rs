//! Purchase coordinator: drives the ticket purchase saga.

use std::sync::Arc;
use std::time::Instant;

use common::FlightQuote;

use crate::error::{Result, SagaError};
use crate::pending::{PendingCreditQueue, PendingKey};
use crate::purchase::{
    BonusStatus, PurchaseMode, PurchaseReceipt, PurchaseRequest, PurchaseStep, SAGA_TYPE,
    compute_bonus_points, compute_local_value,
};
use crate::retry::{RetryPolicy, execute_with_retry};
use crate::services::{Collaborators, LoyaltyService};
use crate::state::PurchaseProgress;

/// Retry policies applied by the coordinator in tolerant mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaPolicies {
    pub quote_retry: RetryPolicy,
    pub bonus_retry: RetryPolicy,
}

impl Default for SagaPolicies {
    fn default() -> Self {
        Self {
            quote_retry: RetryPolicy::quote_lookup(),
            bonus_retry: RetryPolicy::bonus_credit(),
        }
    }
}

/// Orchestrates ticket purchases.
///
/// Steps run strictly in order: quote, rate, sale, bonus. Strict mode aborts on
/// the first failure. Tolerant mode retries the quote lookup and, when the
/// bonus cannot be confirmed, queues it for the reconciler and still reports
/// success. A recorded sale is never rolled back.
#[derive(Debug, Clone)]
pub struct PurchaseCoordinator {
    services: Collaborators,
    pending: PendingCreditQueue,
    policies: SagaPolicies,
}

impl PurchaseCoordinator {
    pub fn new(services: Collaborators, pending: PendingCreditQueue) -> Self {
        Self {
            services,
            pending,
            policies: SagaPolicies::default(),
        }
    }

    pub fn with_policies(mut self, policies: SagaPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn pending(&self) -> &PendingCreditQueue {
        &self.pending
    }

    /// The loyalty client, shared with the reconciler.
    pub fn loyalty(&self) -> Arc<dyn LoyaltyService> {
        self.services.loyalty.clone()
    }

    /// Executes a purchase.
    #[tracing::instrument(
        skip(self, request),
        fields(
            saga_type = SAGA_TYPE,
            flight = %request.flight_id,
            day = %request.date,
            user = %request.user_id,
            mode = %request.mode(),
        )
    )]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        request.validate()?;

        let mode = request.mode();
        metrics::counter!("purchases_total", "mode" => mode.to_string()).increment(1);
        let started = Instant::now();

        let mut progress = PurchaseProgress::new();
        let result = self.run_steps(&request, mode, &mut progress).await;
        metrics::histogram!("purchase_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => {
                metrics::counter!("purchases_completed", "bonus_status" => receipt.bonus_status.as_str())
                    .increment(1);
                tracing::info!(
                    transaction_id = %receipt.transaction_id,
                    bonus_status = %receipt.bonus_status,
                    "purchase completed"
                );
            }
            Err(err) => {
                let reached = progress.state();
                progress.fail();
                let step = err.failed_step().map_or("none", |step| step.as_str());
                metrics::counter!("purchases_failed", "step" => step).increment(1);
                tracing::warn!(%reached, step, error = %err, "purchase failed");
            }
        }

        result
    }

    async fn run_steps(
        &self,
        request: &PurchaseRequest,
        mode: PurchaseMode,
        progress: &mut PurchaseProgress,
    ) -> Result<PurchaseReceipt> {
        // 1. Quote
        let quote = self.fetch_quote(request, mode).await?;
        progress.advance();

        // 2. Rate: never retried, whatever the mode
        tracing::info!(step = PurchaseStep::Rate.as_str(), "saga step started");
        let rate = self
            .services
            .exchange
            .rate()
            .await
            .map_err(|err| SagaError::step(PurchaseStep::Rate, err))?;
        progress.advance();
        let local_value = compute_local_value(quote.price, rate);

        // 3. Sale
        tracing::info!(step = PurchaseStep::Sale.as_str(), "saga step started");
        let sale = self
            .services
            .ledger
            .sell(&request.flight_id, &request.date)
            .await
            .map_err(|err| SagaError::step(PurchaseStep::Sale, err))?;
        progress.advance();

        // 4. Bonus, computed once from the captured quote
        let bonus_points = compute_bonus_points(quote.price);
        let (bonus_status, pending_key) = self
            .resolve_bonus(&request.user_id, bonus_points, mode)
            .await?;
        progress.advance();
        progress.advance();

        Ok(PurchaseReceipt {
            transaction_id: sale.transaction_id,
            flight_id: request.flight_id.clone(),
            date: request.date.clone(),
            price: quote.price,
            exchange_rate: rate,
            local_value,
            bonus_points,
            bonus_status,
            pending_key,
        })
    }

    async fn fetch_quote(&self, request: &PurchaseRequest, mode: PurchaseMode) -> Result<FlightQuote> {
        tracing::info!(step = PurchaseStep::Quote.as_str(), "saga step started");
        let catalog = &self.services.catalog;

        match mode {
            PurchaseMode::Strict => catalog
                .quote(&request.flight_id, &request.date)
                .await
                .map_err(|err| SagaError::step(PurchaseStep::Quote, err)),
            PurchaseMode::Tolerant => execute_with_retry(
                &self.policies.quote_retry,
                PurchaseStep::Quote.as_str(),
                || catalog.quote(&request.flight_id, &request.date),
            )
            .await
            .map_err(|err| SagaError::step(PurchaseStep::Quote, err)),
        }
    }

    async fn resolve_bonus(
        &self,
        user: &str,
        points: u32,
        mode: PurchaseMode,
    ) -> Result<(BonusStatus, Option<PendingKey>)> {
        tracing::info!(step = PurchaseStep::Bonus.as_str(), points, "saga step started");
        // The loyalty service only accepts positive credits.
        if points == 0 {
            tracing::info!(user, "no bonus points earned, skipping credit");
            return Ok((BonusStatus::Processed, None));
        }
        let loyalty = &self.services.loyalty;

        match mode {
            PurchaseMode::Strict => {
                loyalty
                    .credit(user, points)
                    .await
                    .map_err(|err| SagaError::step(PurchaseStep::Bonus, err))?;
                Ok((BonusStatus::Processed, None))
            }
            PurchaseMode::Tolerant => {
                let delivered = execute_with_retry(
                    &self.policies.bonus_retry,
                    PurchaseStep::Bonus.as_str(),
                    || loyalty.credit(user, points),
                )
                .await;

                match delivered {
                    Ok(()) => Ok((BonusStatus::Processed, None)),
                    Err(exhausted) => {
                        tracing::warn!(
                            error = %exhausted,
                            "bonus not confirmed, deferring to pending queue"
                        );
                        let key = self.pending.enqueue(user, points).await;
                        Ok((BonusStatus::Pending, Some(key)))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StepError};
    use crate::services::{
        InMemoryCatalogService, InMemoryExchangeService, InMemoryLoyaltyService,
        InMemorySaleLedger,
    };

    struct Harness {
        coordinator: PurchaseCoordinator,
        catalog: InMemoryCatalogService,
        exchange: InMemoryExchangeService,
        ledger: InMemorySaleLedger,
        loyalty: InMemoryLoyaltyService,
        pending: PendingCreditQueue,
    }

    fn setup() -> Harness {
        let catalog = InMemoryCatalogService::with_flights([("AA123", "2025-11-15", 500.0)]);
        let exchange = InMemoryExchangeService::new(5.5);
        let ledger = InMemorySaleLedger::new();
        let loyalty = InMemoryLoyaltyService::new();
        let pending = PendingCreditQueue::new();

        let coordinator = PurchaseCoordinator::new(
            Collaborators {
                catalog: Arc::new(catalog.clone()),
                exchange: Arc::new(exchange.clone()),
                ledger: Arc::new(ledger.clone()),
                loyalty: Arc::new(loyalty.clone()),
            },
            pending.clone(),
        );

        Harness {
            coordinator,
            catalog,
            exchange,
            ledger,
            loyalty,
            pending,
        }
    }

    fn request(fault_tolerant: bool) -> PurchaseRequest {
        PurchaseRequest::new("AA123", "2025-11-15", "bob", fault_tolerant)
    }

    #[tokio::test]
    async fn test_happy_path_strict() {
        let h = setup();
        let receipt = h.coordinator.purchase(request(false)).await.unwrap();

        assert_eq!(receipt.price, 500.0);
        assert_eq!(receipt.exchange_rate, 5.5);
        assert_eq!(receipt.local_value, 2750.0);
        assert_eq!(receipt.bonus_points, 500);
        assert_eq!(receipt.bonus_status, BonusStatus::Processed);
        assert!(receipt.pending_key.is_none());
        assert!(h.ledger.has_sale(&receipt.transaction_id).await);
        assert_eq!(h.loyalty.points("bob").await, 500);
    }

    #[tokio::test]
    async fn test_zero_point_bonus_skips_loyalty() {
        let h = setup();
        h.catalog.add_flight("ZZ001", "2025-11-15", 0.4).await;

        for fault_tolerant in [false, true] {
            let receipt = h
                .coordinator
                .purchase(PurchaseRequest::new("ZZ001", "2025-11-15", "bob", fault_tolerant))
                .await
                .unwrap();
            assert_eq!(receipt.bonus_points, 0);
            assert_eq!(receipt.bonus_status, BonusStatus::Processed);
            assert!(receipt.pending_key.is_none());
        }

        assert_eq!(h.ledger.sale_count().await, 2);
        assert_eq!(h.loyalty.call_count(), 0);
        assert!(h.pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_validation_makes_no_calls() {
        let h = setup();
        let err = h
            .coordinator
            .purchase(PurchaseRequest::new("AA123", "", "bob", false))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.catalog.call_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_quote_failure_is_single_attempt() {
        let h = setup();
        h.catalog.set_unavailable(true);

        let err = h.coordinator.purchase(request(false)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(PurchaseStep::Quote));
        assert_eq!(h.catalog.call_count(), 1);
        assert_eq!(h.exchange.call_count(), 0);
        assert_eq!(h.ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_rate_failure_never_sells() {
        let h = setup();
        h.exchange.set_unavailable(true);

        let err = h.coordinator.purchase(request(false)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(PurchaseStep::Rate));
        assert_eq!(h.ledger.call_count(), 0);
        assert_eq!(h.loyalty.call_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_sale_failure_skips_bonus() {
        let h = setup();
        h.ledger.set_unavailable(true);

        let err = h.coordinator.purchase(request(false)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(PurchaseStep::Sale));
        assert_eq!(err.kind(), ErrorKind::DownstreamRejected);
        assert_eq!(h.loyalty.call_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_bonus_failure_keeps_sale() {
        let h = setup();
        h.loyalty.set_unavailable(true);

        let err = h.coordinator.purchase(request(false)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(PurchaseStep::Bonus));
        assert_eq!(h.loyalty.call_count(), 1);
        // No compensation: the sale stays recorded.
        assert_eq!(h.ledger.sale_count().await, 1);
        assert!(h.pending.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerant_quote_recovers_within_retries() {
        let h = setup();
        h.catalog.fail_next(3);

        let receipt = h.coordinator.purchase(request(true)).await.unwrap();
        assert_eq!(receipt.price, 500.0);
        assert_eq!(h.catalog.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerant_quote_exhaustion_fails_purchase() {
        let h = setup();
        h.catalog.set_unavailable(true);

        let err = h.coordinator.purchase(request(true)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(PurchaseStep::Quote));
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        assert_eq!(h.catalog.call_count(), 4);
        assert_eq!(h.exchange.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerant_retries_not_found_too() {
        let h = setup();
        let err = h
            .coordinator
            .purchase(PurchaseRequest::new("ZZ000", "2025-11-15", "bob", true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SagaError::StepFailed {
                step: PurchaseStep::Quote,
                source: StepError::RetriesExhausted(_)
            }
        ));
        assert_eq!(h.catalog.call_count(), 4);
    }

    #[tokio::test]
    async fn test_tolerant_rate_failure_still_fails() {
        let h = setup();
        h.exchange.set_unavailable(true);

        let err = h.coordinator.purchase(request(true)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(PurchaseStep::Rate));
        assert_eq!(h.exchange.call_count(), 1);
        assert_eq!(h.ledger.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerant_bonus_recovers_synchronously() {
        let h = setup();
        h.loyalty.fail_next(2);

        let receipt = h.coordinator.purchase(request(true)).await.unwrap();
        assert_eq!(receipt.bonus_status, BonusStatus::Processed);
        assert_eq!(h.loyalty.call_count(), 3);
        assert!(h.pending.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerant_bonus_failure_defers_credit() {
        let h = setup();
        h.loyalty.set_unavailable(true);

        let receipt = h.coordinator.purchase(request(true)).await.unwrap();
        assert_eq!(receipt.bonus_status, BonusStatus::Pending);
        assert_eq!(h.loyalty.call_count(), 3);

        let key = receipt.pending_key.unwrap();
        let credit = h.pending.get(&key).await.unwrap();
        assert_eq!(credit.user, "bob");
        assert_eq!(credit.points, 500);
        assert_eq!(credit.attempts, 0);
    }

    #[tokio::test]
    async fn test_bonus_points_from_captured_price() {
        let h = setup();
        h.catalog.add_flight("BA456", "2025-12-01", 799.5).await;

        let receipt = h
            .coordinator
            .purchase(PurchaseRequest::new("BA456", "2025-12-01", "alice", false))
            .await
            .unwrap();
        assert_eq!(receipt.bonus_points, 800);
        assert_eq!(h.loyalty.deliveries().await, vec![("alice".to_string(), 800)]);
    }

    #[tokio::test]
    async fn test_concurrent_purchases_are_independent() {
        let h = setup();
        let coordinator = Arc::new(h.coordinator);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator
                        .purchase(PurchaseRequest::new(
                            "AA123",
                            "2025-11-15",
                            format!("user-{i}"),
                            false,
                        ))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(h.ledger.sale_count().await, 10);
    }
}
