//! What the landing page shows for a confirmation state.

use crate::identity::{OrderIdentity, OrderType};
use crate::reconcile::{ConfirmationStatus, Phase, ReconciliationState, Resolution, TimelineEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status icon on the landing page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    Spinner,
    Check,
    Alert,
}

/// Raw request/response and attempt log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub request: Option<Value>,
    pub response: Option<Value>,
    pub duration_ms: Option<u64>,
    pub poll_attempts: u32,
    pub timeline: Vec<TimelineEntry>,
}

/// Rendered confirmation page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationView {
    pub status: ConfirmationStatus,
    pub phase: Phase,
    pub icon: StatusIcon,
    pub title: String,
    pub message: String,
    /// Set when payment went through but the order has not caught up
    pub warning: Option<String>,
    pub order: Option<OrderIdentity>,
    pub order_status: Option<String>,
    /// Retry is offered only once an attempt has finished
    pub can_retry: bool,
    pub diagnostics: Option<Diagnostics>,
}

impl ConfirmationView {
    /// Render a state. Diagnostics always show in the error state.
    pub fn render(state: &ReconciliationState, show_diagnostics: bool) -> Self {
        let status = state.status();
        let (icon, title, message) = match status {
            ConfirmationStatus::Pending => (
                StatusIcon::Spinner,
                "Confirming your payment".to_string(),
                "Please wait while we confirm your payment with the store.".to_string(),
            ),
            ConfirmationStatus::Success => {
                (StatusIcon::Check, success_title(state), success_message(state))
            }
            ConfirmationStatus::Error => (
                StatusIcon::Alert,
                "Payment confirmation failed".to_string(),
                state
                    .error_message()
                    .unwrap_or("Something went wrong while confirming your payment.")
                    .to_string(),
            ),
        };

        let warning = state.status_unsettled().then(|| {
            format!(
                "Payment received, but the order status is still '{}'. \
                 It will update once the payment provider notifies the store.",
                state.order_status().unwrap_or("unknown")
            )
        });

        let diagnostics = (show_diagnostics || status == ConfirmationStatus::Error).then(|| {
            Diagnostics {
                request: state.request().cloned(),
                response: state.response().cloned(),
                duration_ms: state
                    .duration()
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                poll_attempts: state.poll_attempts(),
                timeline: state.timeline().to_vec(),
            }
        });

        Self {
            status,
            phase: state.phase(),
            icon,
            title,
            message,
            warning,
            order: state.identity(),
            order_status: state.order_status().map(str::to_string),
            can_retry: status == ConfirmationStatus::Error || state.status_unsettled(),
            diagnostics,
        }
    }
}

fn success_title(state: &ReconciliationState) -> String {
    match state.resolution() {
        Some(Resolution::NothingToConfirm) => "Payment complete",
        Some(Resolution::BookingAccepted) | Some(Resolution::StatusPending) => "Payment received",
        _ => "Payment confirmed",
    }
    .to_string()
}

fn success_message(state: &ReconciliationState) -> String {
    let subject = match state.identity() {
        Some(OrderIdentity {
            order_type: OrderType::ApartmentBooking,
            order_id,
        }) => format!("booking #{order_id}"),
        Some(identity) => identity.to_string(),
        None => "your order".to_string(),
    };

    match state.resolution() {
        Some(Resolution::NothingToConfirm) | None => {
            "There was no pending payment to confirm.".to_string()
        }
        Some(Resolution::BookingAccepted) => format!("Your payment for {subject} was received."),
        Some(Resolution::Confirmed) => format!("Your payment for {subject} has been confirmed."),
        Some(Resolution::Paid) => {
            format!("Your payment for {subject} has been confirmed and the order is paid.")
        }
        Some(Resolution::StatusPending) => {
            format!("Your payment for {subject} was received and is being processed.")
        }
    }
}
