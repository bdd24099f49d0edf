//! Confirmation state machine.
//!
//! One value per page instance. Phases only move forward:
//! `Idle -> Dispatching -> Polling -> {Success, Error}`, with shortcuts from
//! `Idle` and `Dispatching` straight to a terminal phase. `reset` is the only
//! way back to `Idle`.

use crate::identity::OrderIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Where the flow currently is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Dispatching,
    Polling,
    Success,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Success | Phase::Error)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_advance_to(&self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (*self, next),
            (Idle, Dispatching)
                | (Idle, Success)
                | (Idle, Error)
                | (Dispatching, Polling)
                | (Dispatching, Success)
                | (Dispatching, Error)
                | (Polling, Success)
        )
    }

    /// User-facing confirmation status
    pub fn status(&self) -> ConfirmationStatus {
        match self {
            Phase::Idle | Phase::Dispatching | Phase::Polling => ConfirmationStatus::Pending,
            Phase::Success => ConfirmationStatus::Success,
            Phase::Error => ConfirmationStatus::Error,
        }
    }
}

/// Confirmation status as shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Pending,
    Success,
    Error,
}

/// How a successful run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Redirect did not carry a successful payment
    NothingToConfirm,
    /// Apartment bookings have no confirmation endpoint yet
    BookingAccepted,
    /// Backend accepted the manual trigger
    Confirmed,
    /// Order observed as paid while polling
    Paid,
    /// Polling budget ran out before the order was paid
    StatusPending,
}

/// Outcome of a timeline entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Success,
    Error,
}

/// One line of the webhook attempt record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub description: String,
    pub outcome: AttemptOutcome,
}

/// State of one confirmation flow
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconciliationState {
    phase: Phase,
    identity: Option<OrderIdentity>,
    resolution: Option<Resolution>,
    order_status: Option<String>,
    error_message: Option<String>,
    timeline: Vec<TimelineEntry>,
    request: Option<Value>,
    response: Option<Value>,
    duration: Option<Duration>,
    poll_attempts: u32,
}

impl ReconciliationState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> ConfirmationStatus {
        self.phase.status()
    }

    pub fn identity(&self) -> Option<OrderIdentity> {
        self.identity
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Last order status observed from the backend
    pub fn order_status(&self) -> Option<&str> {
        self.order_status.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    /// Raw confirmation request body
    pub fn request(&self) -> Option<&Value> {
        self.request.as_ref()
    }

    /// Raw confirmation response (or error) body
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    /// Wall-clock time the confirmation call took
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    /// Payment accepted but the order never reached `paid`
    pub fn status_unsettled(&self) -> bool {
        self.resolution == Some(Resolution::StatusPending)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    pub(crate) fn begin_dispatch(&mut self, identity: OrderIdentity) {
        self.advance(Phase::Dispatching);
        self.identity = Some(identity);
    }

    pub(crate) fn begin_polling(&mut self) {
        self.advance(Phase::Polling);
    }

    pub(crate) fn succeed(&mut self, resolution: Resolution) {
        self.advance(Phase::Success);
        self.resolution = Some(resolution);
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.advance(Phase::Error);
        self.error_message = Some(message.into());
    }

    pub(crate) fn record(&mut self, description: impl Into<String>, outcome: AttemptOutcome) {
        self.timeline.push(TimelineEntry {
            at: Utc::now(),
            description: description.into(),
            outcome,
        });
    }

    pub(crate) fn set_request(&mut self, request: Value) {
        self.request = Some(request);
    }

    pub(crate) fn set_response(&mut self, response: Value, duration: Duration) {
        self.response = Some(response);
        self.duration = Some(duration);
    }

    pub(crate) fn observe_poll(&mut self, attempt: u32, order_status: Option<String>) {
        self.poll_attempts = attempt;
        if order_status.is_some() {
            self.order_status = order_status;
        }
    }
}
