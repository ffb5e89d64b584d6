//! Gateway against the real collaborator services on ephemeral ports.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use collaborators::{
    ExchangeDesk, FaultConfig, FlightCatalog, PointsLedger, airlineshub, exchange, fidelity,
};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{Collaborators, ReconcilerConfig, ServiceEndpoints};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn spawn_service(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

struct Deployment {
    gateway: Router,
    catalog: FlightCatalog,
    ledger: PointsLedger,
    reconciler: saga::Reconciler,
}

async fn deploy(fidelity_faults: FaultConfig) -> Deployment {
    let catalog = FlightCatalog::seeded();
    let ledger = PointsLedger::new(fidelity_faults);

    let endpoints = ServiceEndpoints {
        airlineshub_url: spawn_service(airlineshub::router(catalog.clone())).await,
        exchange_url: spawn_service(exchange::router(ExchangeDesk::pinned(
            5.5,
            FaultConfig::none(),
        )))
        .await,
        fidelity_url: spawn_service(fidelity::router(ledger.clone())).await,
    };

    let services = Collaborators::http(reqwest::Client::new(), &endpoints);
    let (state, reconciler) = api::create_state(services, ReconcilerConfig::default());
    Deployment {
        gateway: api::create_app(state, get_metrics_handle()),
        catalog,
        ledger,
        reconciler,
    }
}

fn buy_ticket(flight: &str, day: &str, user: &str, ft: bool) -> Request<Body> {
    let body = serde_json::json!({ "flight": flight, "day": day, "user": user, "ft": ft });
    Request::builder()
        .method("POST")
        .uri("/buyTicket")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_purchase_through_real_services() {
    let d = deploy(FaultConfig::none()).await;

    let response = d
        .gateway
        .oneshot(buy_ticket("BA456", "2025-12-01", "alice", false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["value_usd"], 800.0);
    assert_eq!(json["exchange_rate"], 5.5);
    assert_eq!(json["value_brl"], 4400.0);
    assert_eq!(json["bonus_points"], 800);
    assert_eq!(json["bonus_status"], "processed");

    let transaction_id = json["transaction_id"].as_str().unwrap();
    let id = common::TransactionId::new(transaction_id.to_string());
    assert!(d.catalog.transaction(&id).await.is_some());
    assert_eq!(d.ledger.summary("alice").await.total_points, 800);
}

#[tokio::test]
async fn test_unknown_flight_surfaces_collaborator_message() {
    let d = deploy(FaultConfig::none()).await;

    let response = d
        .gateway
        .oneshot(buy_ticket("ZZ000", "2025-12-01", "alice", false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to get flight info"));
    assert!(error.contains("Flight not found"));
    assert_eq!(d.catalog.transaction_count().await, 0);
}

#[tokio::test]
async fn test_sub_point_flight_completes_without_credit() {
    let d = deploy(FaultConfig::none()).await;
    d.catalog.add_flight("ZZ001", "2025-12-01", 0.4).await;

    let response = d
        .gateway
        .oneshot(buy_ticket("ZZ001", "2025-12-01", "dave", false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["bonus_points"], 0);
    assert_eq!(json["bonus_status"], "processed");
    assert_eq!(d.catalog.transaction_count().await, 1);
    assert!(d.ledger.summary("dave").await.records.is_empty());
}

#[tokio::test]
async fn test_failing_fidelity_leaves_credit_pending() {
    let d = deploy(FaultConfig {
        failure_rate: 1.0,
        ..FaultConfig::none()
    })
    .await;

    let response = d
        .gateway
        .clone()
        .oneshot(buy_ticket("AA123", "2025-11-20", "carol", true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["bonus_status"], "pending");
    assert_eq!(json["bonus_points"], 550);
    assert_eq!(d.catalog.transaction_count().await, 1);

    let report = d.reconciler.run_cycle().await;
    assert_eq!(report.failed, 1);
    assert_eq!(d.ledger.summary("carol").await.total_points, 0);

    // Strict mode surfaces the same rejection as a gateway error.
    let response = d
        .gateway
        .oneshot(buy_ticket("AA123", "2025-11-20", "carol", false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to register bonus: service returned status 503")
    );
}
