//! HTTP client for the marketplace backend.
//!
//! Speaks the manual-trigger confirmation endpoints and the order read
//! endpoint over JSON.

use crate::api::traits::{ApiError, ConfirmationAck, MarketplaceApi, OrderSnapshot};
use crate::identity::OrderType;
use crate::payload::ConfirmationPayload;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use url::Url;

/// Backend paths, relative to the base URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub ecommerce_confirm: String,
    pub service_confirm: String,
    /// Order reads go to `{orders}/{id}`
    pub orders: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            ecommerce_confirm: "/api/flutterwave/manual-trigger".to_string(),
            service_confirm: "/api/service-orders/flutterwave/manual-trigger".to_string(),
            orders: "/api/orders".to_string(),
        }
    }
}

impl ApiEndpoints {
    fn confirm_path(&self, order_type: OrderType) -> Option<&str> {
        match order_type {
            OrderType::EcommerceOrder => Some(self.ecommerce_confirm.as_str()),
            OrderType::ServiceOrder => Some(self.service_confirm.as_str()),
            OrderType::ApartmentBooking => None,
        }
    }
}

/// reqwest-backed `MarketplaceApi`
#[derive(Clone, Debug)]
pub struct HttpMarketplaceClient {
    client: Client,
    base_url: Url,
    endpoints: ApiEndpoints,
}

impl HttpMarketplaceClient {
    /// Create a client with the default endpoint paths
    pub fn new(base_url: Url) -> Self {
        Self::with_endpoints(base_url, ApiEndpoints::default())
    }

    pub fn with_endpoints(base_url: Url, endpoints: ApiEndpoints) -> Self {
        Self {
            client: Client::new(),
            base_url,
            endpoints,
        }
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse(format!("invalid endpoint {path}: {e}")))
    }

    /// Decode a JSON body, turning non-2xx answers into `ApiError::Status`
    async fn read_json(response: Response) -> Result<Value, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| format!("request failed with status {status}")),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Pull `message` or `error` out of an error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceClient {
    async fn confirm_payment(
        &self,
        order_type: OrderType,
        payload: &ConfirmationPayload,
    ) -> Result<ConfirmationAck, ApiError> {
        let path = self
            .endpoints
            .confirm_path(order_type)
            .ok_or(ApiError::Unsupported(order_type))?;
        let url = self.url(path)?;

        tracing::debug!(%url, tx_ref = %payload.data.tx_ref, "sending manual confirmation");

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let body = Self::read_json(response).await?;

        tracing::debug!(response = %body, "manual confirmation answered");

        serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn order_status(&self, order_id: u64) -> Result<OrderSnapshot, ApiError> {
        let path = format!("{}/{}", self.endpoints.orders.trim_end_matches('/'), order_id);
        let url = self.url(&path)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let body = Self::read_json(response).await?;

        OrderSnapshot::from_value(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::OrderIdentity;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::net::SocketAddr;

    async fn spawn_backend() -> Url {
        let app = Router::new()
            .route(
                "/api/flutterwave/manual-trigger",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({"status": "success", "echo": body["data"]["meta"]["order_id"]}))
                }),
            )
            .route(
                "/api/service-orders/flutterwave/manual-trigger",
                post(|| async {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(json!({"message": "Service order already paid"})),
                    )
                }),
            )
            .route(
                "/api/orders/:id",
                get(|Path(id): Path<u64>| async move {
                    Json(json!({"data": {"id": id, "status": "paid"}}))
                }),
            );

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    fn payload(order_type: OrderType, order_id: u64) -> ConfirmationPayload {
        ConfirmationPayload::new(
            OrderIdentity { order_type, order_id },
            "ref",
            Some("1"),
        )
    }

    #[tokio::test]
    async fn test_confirm_ecommerce() {
        let client = HttpMarketplaceClient::new(spawn_backend().await);
        let ack = client
            .confirm_payment(OrderType::EcommerceOrder, &payload(OrderType::EcommerceOrder, 42))
            .await
            .unwrap();
        assert_eq!(ack.status.as_deref(), Some("success"));
    }

    #[tokio::test]
    async fn test_non_success_status_carries_backend_message() {
        let client = HttpMarketplaceClient::new(spawn_backend().await);
        let err = client
            .confirm_payment(OrderType::ServiceOrder, &payload(OrderType::ServiceOrder, 7))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                code: 422,
                message: "Service order already paid".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_apartment_has_no_endpoint() {
        let client = HttpMarketplaceClient::new(Url::parse("http://127.0.0.1:9").unwrap());
        let err = client
            .confirm_payment(
                OrderType::ApartmentBooking,
                &payload(OrderType::ApartmentBooking, 3),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Unsupported(OrderType::ApartmentBooking));
    }

    #[tokio::test]
    async fn test_order_status() {
        let client = HttpMarketplaceClient::new(spawn_backend().await);
        let snapshot = client.order_status(42).await.unwrap();
        assert!(snapshot.is_paid());
        assert_eq!(snapshot.raw["data"]["id"], 42);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let client = HttpMarketplaceClient::new(Url::parse("http://127.0.0.1:9").unwrap());
        assert!(matches!(
            client.order_status(1).await,
            Err(ApiError::Network(_))
        ));
    }
}
