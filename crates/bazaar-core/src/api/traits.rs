//! Marketplace client trait definition.

use crate::identity::OrderType;
use crate::payload::ConfirmationPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from marketplace backend calls.
///
/// Display is the bare underlying message; it is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    Status { code: u16, message: String },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("no confirmation endpoint for {0}")]
    Unsupported(OrderType),
}

/// Acknowledgement from a manual-trigger endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ConfirmationAck {
    /// The backend accepted the trigger if it answered with either field
    pub fn is_accepted(&self) -> bool {
        self.status.is_some() || self.message.is_some()
    }
}

/// Order as seen by the status read endpoint
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderSnapshot {
    pub status: String,
    /// Full response body, kept for diagnostics
    pub raw: Value,
}

impl OrderSnapshot {
    /// Status reported as settled by the backend
    pub const PAID: &'static str = "paid";

    /// Read the status from `{status}` or `{data: {status}}`
    pub fn from_value(raw: Value) -> Result<Self, ApiError> {
        let status = raw
            .get("status")
            .or_else(|| raw.get("data").and_then(|d| d.get("status")))
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::InvalidResponse("order response has no status".to_string()))?
            .to_string();
        Ok(Self { status, raw })
    }

    pub fn is_paid(&self) -> bool {
        self.status == Self::PAID
    }
}

/// Operations the reconciliation flow needs from the marketplace backend
///
/// Implementations:
/// - HttpMarketplaceClient for a real backend
/// - MockMarketplaceApi for tests
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Submit a manual payment confirmation for the given order type
    async fn confirm_payment(
        &self,
        order_type: OrderType,
        payload: &ConfirmationPayload,
    ) -> Result<ConfirmationAck, ApiError>;

    /// Read the current status of an e-commerce order
    async fn order_status(&self, order_id: u64) -> Result<OrderSnapshot, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display_is_bare_message() {
        assert_eq!(ApiError::Network("timeout".to_string()).to_string(), "timeout");
        let err = ApiError::Status {
            code: 502,
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[test]
    fn test_ack_acceptance() {
        let ack: ConfirmationAck = serde_json::from_value(json!({"message": "queued"})).unwrap();
        assert!(ack.is_accepted());
        let ack: ConfirmationAck = serde_json::from_value(json!({"ok": true})).unwrap();
        assert!(!ack.is_accepted());
    }

    #[test]
    fn test_snapshot_status_locations() {
        let top = OrderSnapshot::from_value(json!({"id": 4, "status": "paid"})).unwrap();
        assert!(top.is_paid());
        let nested = OrderSnapshot::from_value(json!({"data": {"status": "pending"}})).unwrap();
        assert_eq!(nested.status, "pending");
        assert!(matches!(
            OrderSnapshot::from_value(json!({"id": 4})),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
