//! Mock marketplace backend for testing.

use super::traits::{ApiError, ConfirmationAck, MarketplaceApi, OrderSnapshot};
use crate::identity::OrderType;
use crate::payload::ConfirmationPayload;
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// In-memory scripted backend.
///
/// Status reads pop from a script; the last scripted answer repeats once
/// the script runs out. An empty script answers `pending`.
#[derive(Clone)]
pub struct MockMarketplaceApi {
    confirm_outcome: Arc<Mutex<Result<ConfirmationAck, ApiError>>>,
    status_script: Arc<Mutex<VecDeque<Result<String, ApiError>>>>,
    confirmations: Arc<Mutex<Vec<(OrderType, ConfirmationPayload)>>>,
    status_reads: Arc<Mutex<Vec<(u64, Instant)>>>,
}

impl MockMarketplaceApi {
    /// Backend that accepts every confirmation and reports `pending`
    pub fn new() -> Self {
        Self {
            confirm_outcome: Arc::new(Mutex::new(Ok(ConfirmationAck {
                status: Some("success".to_string()),
                message: None,
            }))),
            status_script: Arc::new(Mutex::new(VecDeque::new())),
            confirmations: Arc::new(Mutex::new(Vec::new())),
            status_reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every confirmation fail with the given error
    pub fn fail_confirmations(&self, error: ApiError) {
        *self.confirm_outcome.lock().unwrap() = Err(error);
    }

    /// Answer confirmations with the given acknowledgement
    pub fn set_confirmation_ack(&self, ack: ConfirmationAck) {
        *self.confirm_outcome.lock().unwrap() = Ok(ack);
    }

    /// Append order statuses to the read script
    pub fn script_statuses<I, S>(&self, statuses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = self.status_script.lock().unwrap();
        script.extend(statuses.into_iter().map(|s| Ok(s.into())));
    }

    /// Append a failing status read to the script
    pub fn script_status_error(&self, error: ApiError) {
        self.status_script.lock().unwrap().push_back(Err(error));
    }

    /// Confirmations received so far
    pub fn confirmations(&self) -> Vec<(OrderType, ConfirmationPayload)> {
        self.confirmations.lock().unwrap().clone()
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirmations.lock().unwrap().len()
    }

    pub fn status_calls(&self) -> usize {
        self.status_reads.lock().unwrap().len()
    }

    /// When each status read arrived, on the tokio clock
    pub fn status_read_times(&self) -> Vec<Instant> {
        self.status_reads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    /// Total backend calls of any kind
    pub fn total_calls(&self) -> usize {
        self.confirm_calls() + self.status_calls()
    }

    fn next_status(&self) -> Result<String, ApiError> {
        let mut script = self.status_script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap_or_else(|| Ok("pending".to_string()))
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Ok("pending".to_string()))
        }
    }
}

impl Default for MockMarketplaceApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketplaceApi for MockMarketplaceApi {
    async fn confirm_payment(
        &self,
        order_type: OrderType,
        payload: &ConfirmationPayload,
    ) -> Result<ConfirmationAck, ApiError> {
        if order_type == OrderType::ApartmentBooking {
            return Err(ApiError::Unsupported(order_type));
        }
        self.confirmations
            .lock()
            .unwrap()
            .push((order_type, payload.clone()));
        self.confirm_outcome.lock().unwrap().clone()
    }

    async fn order_status(&self, order_id: u64) -> Result<OrderSnapshot, ApiError> {
        self.status_reads
            .lock()
            .unwrap()
            .push((order_id, Instant::now()));
        let status = self.next_status()?;
        OrderSnapshot::from_value(json!({"id": order_id, "status": status}))
    }
}
