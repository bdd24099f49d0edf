//! Bazaar Core Library
//!
//! Reconciles a payment provider redirect with backend order state:
//! - Redirect context parsing and order identity extraction
//! - MarketplaceApi trait, HTTP client and MockMarketplaceApi
//! - The confirmation state machine and its rendered view

pub mod api;
pub mod identity;
pub mod payload;
pub mod reconcile;
pub mod redirect;
pub mod view;

pub use api::{
    ApiEndpoints, ApiError, ConfirmationAck, HttpMarketplaceClient, MarketplaceApi,
    MockMarketplaceApi, OrderSnapshot,
};
pub use identity::{resolve_identity, OrderIdentity, OrderType};
pub use payload::ConfirmationPayload;
pub use reconcile::{
    AttemptOutcome, ConfirmationStatus, Phase, PollPolicy, ReconciliationState, Reconciler, Resolution,
    TimelineEntry,
};
pub use redirect::RedirectContext;
pub use view::{ConfirmationView, Diagnostics, StatusIcon};
