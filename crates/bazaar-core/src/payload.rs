//! Normalized confirmation payload sent to the manual-trigger endpoints.

use crate::identity::{OrderIdentity, OrderType};
use crate::redirect::{RedirectContext, SUCCESSFUL};
use serde::{Deserialize, Serialize};

/// Request body: `{"data": {...}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPayload {
    pub data: ConfirmationData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationData {
    pub status: String,
    pub tx_ref: String,
    pub transaction_id: Option<String>,
    pub meta: ConfirmationMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationMeta {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub order_id: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_order_id: Option<u64>,
}

impl ConfirmationPayload {
    /// Build the payload for a resolved order
    pub fn new(identity: OrderIdentity, tx_ref: &str, transaction_id: Option<&str>) -> Self {
        let service_order_id = match identity.order_type {
            OrderType::ServiceOrder => Some(identity.order_id),
            _ => None,
        };
        Self {
            data: ConfirmationData {
                status: SUCCESSFUL.to_string(),
                tx_ref: tx_ref.to_string(),
                transaction_id: transaction_id.map(str::to_string),
                meta: ConfirmationMeta {
                    order_type: identity.order_type,
                    order_id: identity.order_id,
                    service_order_id,
                },
            },
        }
    }

    pub fn from_redirect(identity: OrderIdentity, ctx: &RedirectContext) -> Self {
        Self::new(
            identity,
            ctx.reference().unwrap_or_default(),
            ctx.transaction_id.as_deref(),
        )
    }
}
