//! Purchase saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a purchase in its lifecycle.
///
/// State transitions:
/// ```text
/// Start ──► QuoteFetched ──► RateFetched ──► SaleRecorded ──► BonusResolved ──► Completed
///   │            │                │               │                 │
///   └────────────┴────────────────┴───────────────┴─────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchaseState {
    /// No downstream call has been made.
    #[default]
    Start,

    /// The catalog priced the flight.
    QuoteFetched,

    /// The exchange rate is known.
    RateFetched,

    /// The sale ledger recorded the ticket.
    SaleRecorded,

    /// The bonus was either credited or deferred to the pending queue.
    BonusResolved,

    /// The purchase succeeded (terminal state).
    Completed,

    /// A step failed and the purchase was aborted (terminal state).
    Failed,
}

impl PurchaseState {
    /// Returns the state that follows this one on success, if any.
    pub fn successor(&self) -> Option<PurchaseState> {
        match self {
            PurchaseState::Start => Some(PurchaseState::QuoteFetched),
            PurchaseState::QuoteFetched => Some(PurchaseState::RateFetched),
            PurchaseState::RateFetched => Some(PurchaseState::SaleRecorded),
            PurchaseState::SaleRecorded => Some(PurchaseState::BonusResolved),
            PurchaseState::BonusResolved => Some(PurchaseState::Completed),
            PurchaseState::Completed | PurchaseState::Failed => None,
        }
    }

    /// Returns true if `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: PurchaseState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == PurchaseState::Failed || self.successor() == Some(next)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchaseState::Completed | PurchaseState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseState::Start => "Start",
            PurchaseState::QuoteFetched => "QuoteFetched",
            PurchaseState::RateFetched => "RateFetched",
            PurchaseState::SaleRecorded => "SaleRecorded",
            PurchaseState::BonusResolved => "BonusResolved",
            PurchaseState::Completed => "Completed",
            PurchaseState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks a single purchase through its states.
///
/// Owned by the task serving the purchase; never shared.
#[derive(Debug, Default)]
pub struct PurchaseProgress {
    state: PurchaseState,
    history: Vec<PurchaseState>,
}

impl PurchaseProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PurchaseState {
        self.state
    }

    /// States visited so far, starting with `Start`.
    pub fn history(&self) -> &[PurchaseState] {
        &self.history
    }

    /// Moves to the next state on the success path.
    pub fn advance(&mut self) -> PurchaseState {
        if let Some(next) = self.state.successor() {
            self.transition(next);
        }
        self.state
    }

    /// Moves to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.transition(PurchaseState::Failed);
        }
    }

    fn transition(&mut self, next: PurchaseState) {
        debug_assert!(self.state.can_transition_to(next));
        if self.history.is_empty() {
            self.history.push(self.state);
        }
        tracing::debug!(from = %self.state, to = %next, "purchase state transition");
        self.state = next;
        self.history.push(next);
    }
}
