//! Saga error types.

use std::time::Duration;

use thiserror::Error;

use crate::purchase::PurchaseStep;

/// Failure of a single call to a downstream collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DownstreamError {
    /// The call did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator could not be reached.
    #[error("request failed: {0}")]
    ConnectionFailure(String),

    /// The collaborator answered with a non-success status.
    #[error("service returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("failed to decode response: {0}")]
    DecodeFailure(String),
}

impl DownstreamError {
    /// Returns true if the collaborator answered but refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DownstreamError::UnexpectedStatus { .. } | DownstreamError::DecodeFailure(_)
        )
    }
}

/// Every attempt allowed by a retry policy failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("all {attempts} retry attempts failed: {last_error}")]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Why a purchase step failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error(transparent)]
    Downstream(#[from] DownstreamError),

    #[error(transparent)]
    RetriesExhausted(#[from] RetriesExhausted<DownstreamError>),
}

impl StepError {
    /// The downstream error that ended the step.
    pub fn last_error(&self) -> &DownstreamError {
        match self {
            StepError::Downstream(err) => err,
            StepError::RetriesExhausted(exhausted) => &exhausted.last_error,
        }
    }
}

/// Classification of purchase failures as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input. Never retried.
    Validation,
    /// Connection failure or timeout.
    DownstreamUnavailable,
    /// A collaborator answered with an error status or an unreadable body.
    DownstreamRejected,
    /// A retried step used up its attempts.
    RetriesExhausted,
}

/// Errors that end a purchase.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SagaError {
    /// The purchase request is incomplete.
    #[error("{0}")]
    Validation(String),

    /// A saga step failed and the purchase was aborted.
    #[error("Failed to {}: {source}", .step.action())]
    StepFailed {
        step: PurchaseStep,
        #[source]
        source: StepError,
    },
}

impl SagaError {
    pub(crate) fn step(step: PurchaseStep, source: impl Into<StepError>) -> Self {
        SagaError::StepFailed {
            step,
            source: source.into(),
        }
    }

    /// Returns the step that failed, if any.
    pub fn failed_step(&self) -> Option<PurchaseStep> {
        match self {
            SagaError::Validation(_) => None,
            SagaError::StepFailed { step, .. } => Some(*step),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Validation(_) => ErrorKind::Validation,
            SagaError::StepFailed {
                source: StepError::RetriesExhausted(_),
                ..
            } => ErrorKind::RetriesExhausted,
            SagaError::StepFailed {
                source: StepError::Downstream(err),
                ..
            } if err.is_rejection() => ErrorKind::DownstreamRejected,
            SagaError::StepFailed { .. } => ErrorKind::DownstreamUnavailable,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_includes_status_and_body() {
        let err = SagaError::step(
            PurchaseStep::Quote,
            DownstreamError::UnexpectedStatus {
                status: 404,
                body: r#"{"error":"Flight not found"}"#.to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            r#"Failed to get flight info: service returned status 404: {"error":"Flight not found"}"#
        );
        assert_eq!(err.kind(), ErrorKind::DownstreamRejected);
        assert_eq!(err.failed_step(), Some(PurchaseStep::Quote));
    }

    #[test]
    fn test_exhausted_retries_wrap_last_error() {
        let err = SagaError::step(
            PurchaseStep::Bonus,
            RetriesExhausted {
                attempts: 3,
                last_error: DownstreamError::ConnectionFailure("connection refused".to_string()),
            },
        );
        assert_eq!(
            err.to_string(),
            "Failed to register bonus: all 3 retry attempts failed: request failed: connection refused"
        );
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
    }

    #[test]
    fn test_timeouts_are_unavailability() {
        let err = SagaError::step(
            PurchaseStep::Rate,
            DownstreamError::Timeout(Duration::from_secs(1)),
        );
        assert_eq!(err.kind(), ErrorKind::DownstreamUnavailable);
        assert!(err.to_string().starts_with("Failed to get exchange rate:"));
    }

    #[test]
    fn test_validation_has_no_step() {
        let err = SagaError::Validation("Missing required fields: user".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.failed_step(), None);
    }
}
