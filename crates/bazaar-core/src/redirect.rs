//! Redirect context captured from the payment provider's return URL.

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

/// Status token the provider sends for a completed payment
pub const SUCCESSFUL: &str = "successful";

/// Query parameters of the provider redirect, read once at page load
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectContext {
    /// Opaque transaction reference
    pub tx_ref: Option<String>,
    /// Payment status token
    pub status: Option<String>,
    /// Provider transaction identifier
    pub transaction_id: Option<String>,
    /// Explicit order type hint ("ecommerce", "service", "apartment")
    #[serde(rename = "type")]
    pub type_hint: Option<String>,
}

impl RedirectContext {
    /// Parse from a raw query string (with or without a leading `?`)
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut ctx = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "tx_ref" => ctx.tx_ref = value,
                "status" => ctx.status = value,
                "transaction_id" => ctx.transaction_id = value,
                "type" => ctx.type_hint = value,
                _ => {}
            }
        }
        ctx
    }

    /// Parse from the full redirect URL
    pub fn from_url(url: &Url) -> Self {
        url.query().map(Self::from_query).unwrap_or_default()
    }

    /// Transaction reference, if present and non-empty
    pub fn reference(&self) -> Option<&str> {
        self.tx_ref.as_deref().filter(|r| !r.is_empty())
    }

    pub fn hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }

    /// Whether this redirect carries a payment that needs confirming
    pub fn needs_confirmation(&self) -> bool {
        self.status.as_deref() == Some(SUCCESSFUL) && self.reference().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query() {
        let ctx = RedirectContext::from_query(
            "?status=successful&tx_ref=ecommerce_order_42&transaction_id=8812&type=ecommerce",
        );
        assert_eq!(ctx.reference(), Some("ecommerce_order_42"));
        assert_eq!(ctx.transaction_id.as_deref(), Some("8812"));
        assert_eq!(ctx.hint(), Some("ecommerce"));
        assert!(ctx.needs_confirmation());
    }

    #[test]
    fn test_from_url_decodes_values() {
        let url = Url::parse("https://shop.example/payment/callback?status=successful&tx_ref=flw%5F99")
            .unwrap();
        let ctx = RedirectContext::from_url(&url);
        assert_eq!(ctx.reference(), Some("flw_99"));
    }

    #[test]
    fn test_inactive_redirects() {
        assert!(!RedirectContext::from_query("status=cancelled&tx_ref=flw_1").needs_confirmation());
        assert!(!RedirectContext::from_query("status=successful").needs_confirmation());
        assert!(!RedirectContext::from_query("status=successful&tx_ref=").needs_confirmation());
        assert!(!RedirectContext::default().needs_confirmation());
    }

    #[test]
    fn test_deserialize_type_field() {
        let ctx: RedirectContext =
            serde_json::from_str(r#"{"tx_ref":"booking_3","type":"apartment"}"#).unwrap();
        assert_eq!(ctx.hint(), Some("apartment"));
        assert_eq!(ctx.status, None);
    }
}
