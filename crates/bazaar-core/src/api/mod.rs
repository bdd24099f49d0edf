//! Marketplace backend client abstraction.

mod http;
mod mock;
mod traits;

pub use http::{ApiEndpoints, HttpMarketplaceClient};
pub use mock::MockMarketplaceApi;
pub use traits::{ApiError, ConfirmationAck, MarketplaceApi, OrderSnapshot};
