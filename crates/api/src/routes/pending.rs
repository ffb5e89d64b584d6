//! Pending loyalty credit introspection.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::purchase::AppState;

#[derive(Debug, Serialize)]
pub struct PendingCreditResponse {
    pub key: String,
    pub user: String,
    pub points: u32,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub count: usize,
    pub credits: Vec<PendingCreditResponse>,
}

/// GET /pending - credits awaiting delivery, oldest first.
pub async fn list(State(state): State<AppState>) -> Json<PendingListResponse> {
    let credits: Vec<PendingCreditResponse> = state
        .pending()
        .snapshot()
        .await
        .into_iter()
        .map(|(key, credit)| PendingCreditResponse {
            key: key.as_str().to_string(),
            user: credit.user,
            points: credit.points,
            attempts: credit.attempts,
            created_at: credit.created_at,
            last_attempt_at: credit.last_attempt_at,
        })
        .collect();

    Json(PendingListResponse {
        count: credits.len(),
        credits,
    })
}
