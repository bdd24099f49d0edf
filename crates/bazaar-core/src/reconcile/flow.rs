//! The confirmation flow driver.
//!
//! Resolves the order from the redirect, fires the manual confirmation
//! trigger, then polls e-commerce orders until they read `paid` or the
//! attempt budget runs out. Every failure ends up in the state; `run` itself
//! never fails.

use crate::api::{ApiError, MarketplaceApi};
use crate::identity::{resolve_identity, OrderIdentity, OrderType};
use crate::payload::ConfirmationPayload;
use crate::reconcile::state::{AttemptOutcome, Phase, ReconciliationState, Resolution};
use crate::redirect::RedirectContext;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Bounded polling budget with a fixed delay between attempts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_millis(2000),
        }
    }
}

/// Drives one page's confirmation flow.
///
/// `run` and `retry` take `&mut self`, so at most one attempt per
/// reconciler is ever in flight. Subscribers see a snapshot of the state
/// after every step.
pub struct Reconciler {
    api: Arc<dyn MarketplaceApi>,
    policy: PollPolicy,
    state: ReconciliationState,
    progress: Option<watch::Sender<ReconciliationState>>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn MarketplaceApi>) -> Self {
        Self::with_policy(api, PollPolicy::default())
    }

    pub fn with_policy(api: Arc<dyn MarketplaceApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            state: ReconciliationState::default(),
            progress: None,
        }
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    /// Watch state snapshots as the flow advances
    pub fn subscribe(&mut self) -> watch::Receiver<ReconciliationState> {
        match &self.progress {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(self.state.clone());
                self.progress = Some(tx);
                rx
            }
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.progress {
            tx.send_replace(self.state.clone());
        }
    }

    /// Run the flow for a redirect
    pub async fn run(&mut self, ctx: &RedirectContext) -> &ReconciliationState {
        if self.state.phase() != Phase::Idle {
            self.state.reset();
            self.publish();
        }
        self.execute(ctx).await;
        self.publish();
        &self.state
    }

    /// User-initiated retry: drop everything observed so far and start over
    pub async fn retry(&mut self, ctx: &RedirectContext) -> &ReconciliationState {
        info!(tx_ref = ?ctx.tx_ref, "retrying payment confirmation");
        self.state.reset();
        self.publish();
        self.execute(ctx).await;
        self.publish();
        &self.state
    }

    async fn execute(&mut self, ctx: &RedirectContext) {
        let reference = match ctx.reference() {
            Some(r) if ctx.needs_confirmation() => r,
            _ => {
                info!(status = ?ctx.status, "redirect carries nothing to confirm");
                self.state.succeed(Resolution::NothingToConfirm);
                return;
            }
        };

        let identity = match resolve_identity(reference, ctx.hint()) {
            (order_type, Some(order_id)) => OrderIdentity { order_type, order_id },
            (_, None) => {
                error!(tx_ref = reference, "no order id in transaction reference");
                self.state.fail(format!(
                    "Could not determine the order from transaction reference '{reference}'"
                ));
                return;
            }
        };

        info!(%identity, tx_ref = reference, "confirming payment");
        self.state.begin_dispatch(identity);
        self.publish();

        if identity.order_type == OrderType::ApartmentBooking {
            info!(%identity, "booking confirmation has no endpoint, accepting redirect");
            self.state.succeed(Resolution::BookingAccepted);
            return;
        }

        let payload = ConfirmationPayload::from_redirect(identity, ctx);
        if !self.dispatch(identity, &payload).await {
            return;
        }

        if identity.order_type == OrderType::EcommerceOrder {
            self.poll_until_paid(identity.order_id).await;
        } else {
            self.state.succeed(Resolution::Confirmed);
        }
    }

    /// Send the manual trigger. Returns whether the backend accepted it.
    async fn dispatch(&mut self, identity: OrderIdentity, payload: &ConfirmationPayload) -> bool {
        self.state
            .set_request(serde_json::to_value(payload).unwrap_or(Value::Null));
        self.state.record(
            format!("Manual confirmation sent for {identity}"),
            AttemptOutcome::Pending,
        );
        self.publish();

        let started = Instant::now();
        let result = self
            .api
            .confirm_payment(identity.order_type, payload)
            .await
            .and_then(|ack| {
                if ack.is_accepted() {
                    Ok(ack)
                } else {
                    Err(ApiError::InvalidResponse(
                        "unexpected confirmation response".to_string(),
                    ))
                }
            });
        let elapsed = started.elapsed();

        match result {
            Ok(ack) => {
                self.state.set_response(
                    serde_json::to_value(&ack).unwrap_or(Value::Null),
                    elapsed,
                );
                self.state.record(
                    format!("Confirmation accepted in {} ms", elapsed.as_millis()),
                    AttemptOutcome::Success,
                );
                true
            }
            Err(e) => {
                let message = e.to_string();
                error!(%identity, error = %message, "manual confirmation failed");
                self.state.set_response(error_body(&e), elapsed);
                self.state.record(
                    format!(
                        "Confirmation failed after {} ms: {message}",
                        elapsed.as_millis()
                    ),
                    AttemptOutcome::Error,
                );
                self.state.fail(message);
                false
            }
        }
    }

    async fn poll_until_paid(&mut self, order_id: u64) {
        self.state.begin_polling();
        self.publish();
        let api = Arc::clone(&self.api);

        for attempt in 1..=self.policy.max_attempts {
            match api.order_status(order_id).await {
                Ok(snapshot) => {
                    let paid = snapshot.is_paid();
                    self.state.observe_poll(attempt, Some(snapshot.status));
                    if paid {
                        info!(order_id, attempt, "order is paid");
                        self.state.succeed(Resolution::Paid);
                        return;
                    }
                }
                Err(e) => {
                    warn!(order_id, attempt, error = %e, "order status check failed");
                    self.state.observe_poll(attempt, None);
                }
            }

            self.publish();

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        warn!(
            order_id,
            last_status = ?self.state.order_status(),
            "order not paid after {} checks",
            self.policy.max_attempts
        );
        self.state.succeed(Resolution::StatusPending);
    }
}

fn error_body(error: &ApiError) -> Value {
    match error {
        ApiError::Status { code, message } => json!({"error": message, "status_code": code}),
        other => json!({"error": other.to_string()}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ConfirmationAck, MockMarketplaceApi};
    use crate::reconcile::state::ConfirmationStatus;

    fn reconciler(api: &MockMarketplaceApi) -> Reconciler {
        Reconciler::new(Arc::new(api.clone()))
    }

    /// Paused-clock timers fire on millisecond ticks
    fn assert_about(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(5),
            "expected about {expected:?}, got {actual:?}"
        );
    }

    fn redirect(tx_ref: &str) -> RedirectContext {
        RedirectContext::from_query(&format!(
            "status=successful&tx_ref={tx_ref}&transaction_id=4410"
        ))
    }

    #[tokio::test]
    async fn test_unresolvable_reference_fails_without_network() {
        let api = MockMarketplaceApi::new();
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("flw-abc")).await;

        assert_eq!(state.status(), ConfirmationStatus::Error);
        assert!(state.error_message().unwrap().contains("flw-abc"));
        assert!(state.timeline().is_empty());
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_order_id_fails_without_network() {
        let api = MockMarketplaceApi::new();
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("order_0")).await;

        assert_eq!(state.status(), ConfirmationStatus::Error);
        assert!(state.error_message().unwrap().contains("order_0"));
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_final_state() {
        let api = MockMarketplaceApi::new();
        api.script_statuses(["pending", "paid"]);
        let mut reconciler = reconciler(&api);
        let progress = reconciler.subscribe();
        assert_eq!(progress.borrow().phase(), Phase::Idle);

        reconciler.run(&redirect("ecommerce_order_42")).await;

        assert_eq!(*progress.borrow(), *reconciler.state());
        assert_eq!(progress.borrow().resolution(), Some(Resolution::Paid));
    }

    #[tokio::test]
    async fn test_dispatch_error_is_terminal() {
        let api = MockMarketplaceApi::new();
        api.fail_confirmations(ApiError::Network("timeout".to_string()));
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("ecommerce_order_42")).await;

        assert_eq!(state.status(), ConfirmationStatus::Error);
        assert_eq!(state.error_message(), Some("timeout"));
        let outcomes: Vec<_> = state.timeline().iter().map(|e| e.outcome).collect();
        assert_eq!(outcomes, vec![AttemptOutcome::Pending, AttemptOutcome::Error]);
        assert_eq!(state.response().unwrap()["error"], "timeout");
        assert!(state.duration().is_some());
        assert_eq!(api.confirm_calls(), 1);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_paid() {
        let api = MockMarketplaceApi::new();
        api.script_statuses(["pending", "pending", "paid"]);
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("ecommerce_order_42")).await;

        assert_eq!(state.status(), ConfirmationStatus::Success);
        assert_eq!(state.resolution(), Some(Resolution::Paid));
        assert_eq!(state.order_status(), Some("paid"));
        assert_eq!(state.poll_attempts(), 3);
        assert_eq!(api.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_exhaustion_is_soft() {
        let api = MockMarketplaceApi::new();
        api.script_statuses(["pending"]);
        let mut reconciler = reconciler(&api);

        let started = Instant::now();
        let state = reconciler.run(&redirect("ecommerce_order_42")).await;

        assert_eq!(api.status_calls(), 5);
        assert_eq!(state.status(), ConfirmationStatus::Success);
        assert!(state.status_unsettled());
        assert_eq!(state.order_status(), Some("pending"));
        assert!(state.error_message().is_none());
        assert_about(started.elapsed(), Duration::from_secs(8));

        let times = api.status_read_times();
        for pair in times.windows(2) {
            assert_about(pair[1] - pair[0], Duration::from_millis(2000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_swallowed() {
        let api = MockMarketplaceApi::new();
        api.script_status_error(ApiError::Network("connection reset".to_string()));
        api.script_statuses(["paid"]);
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("ecommerce_order_42")).await;

        assert_eq!(state.resolution(), Some(Resolution::Paid));
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_count_toward_budget() {
        let api = MockMarketplaceApi::new();
        api.script_status_error(ApiError::Network("connection reset".to_string()));
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("ecommerce_order_42")).await;

        assert_eq!(api.status_calls(), 5);
        assert_eq!(state.status(), ConfirmationStatus::Success);
        assert!(state.status_unsettled());
        assert_eq!(state.order_status(), None);
    }

    #[tokio::test]
    async fn test_service_order_confirms_without_polling() {
        let api = MockMarketplaceApi::new();
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("service_order_7")).await;

        assert_eq!(state.resolution(), Some(Resolution::Confirmed));
        assert_eq!(api.status_calls(), 0);
        let (order_type, payload) = &api.confirmations()[0];
        assert_eq!(*order_type, OrderType::ServiceOrder);
        assert_eq!(payload.data.meta.service_order_id, Some(7));
        assert_eq!(payload.data.transaction_id.as_deref(), Some("4410"));
        assert_eq!(state.request().unwrap()["data"]["tx_ref"], "service_order_7");
    }

    #[tokio::test]
    async fn test_apartment_booking_short_circuits() {
        let api = MockMarketplaceApi::new();
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("apartment_booking_12")).await;

        assert_eq!(state.status(), ConfirmationStatus::Success);
        assert_eq!(state.resolution(), Some(Resolution::BookingAccepted));
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_inactive_redirect_confirms_nothing() {
        let api = MockMarketplaceApi::new();
        let mut reconciler = reconciler(&api);

        let ctx = RedirectContext::from_query("status=cancelled&tx_ref=ecommerce_order_42");
        let state = reconciler.run(&ctx).await;

        assert_eq!(state.resolution(), Some(Resolution::NothingToConfirm));
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unaccepted_ack_is_an_error() {
        let api = MockMarketplaceApi::new();
        api.set_confirmation_ack(ConfirmationAck::default());
        let mut reconciler = reconciler(&api);

        let state = reconciler.run(&redirect("service_order_7")).await;

        assert_eq!(state.error_message(), Some("unexpected confirmation response"));
    }

    #[tokio::test]
    async fn test_retry_clears_previous_attempt() {
        let api = MockMarketplaceApi::new();
        api.fail_confirmations(ApiError::Network("timeout".to_string()));
        let mut reconciler = reconciler(&api);

        reconciler.run(&redirect("service_order_7")).await;
        assert_eq!(reconciler.state().timeline().len(), 2);

        let state = reconciler.retry(&redirect("no-digits")).await;

        assert_eq!(state.phase(), Phase::Error);
        assert!(state.timeline().is_empty());
        assert!(state.request().is_none());
        assert!(state.response().is_none());
        assert!(state.duration().is_none());
        assert!(state.identity().is_none());
        assert_eq!(api.confirm_calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure_succeeds() {
        let api = MockMarketplaceApi::new();
        api.fail_confirmations(ApiError::Network("timeout".to_string()));
        let mut reconciler = reconciler(&api);
        reconciler.run(&redirect("service_order_7")).await;

        api.set_confirmation_ack(ConfirmationAck {
            status: None,
            message: Some("Payment confirmed".to_string()),
        });
        let state = reconciler.retry(&redirect("service_order_7")).await;

        assert_eq!(state.status(), ConfirmationStatus::Success);
        assert!(state.error_message().is_none());
        let outcomes: Vec<_> = state.timeline().iter().map(|e| e.outcome).collect();
        assert_eq!(outcomes, vec![AttemptOutcome::Pending, AttemptOutcome::Success]);
        assert_eq!(api.confirm_calls(), 2);
    }
}
