//! Payment confirmation reconciliation.

mod flow;
mod state;

pub use flow::{PollPolicy, Reconciler};
pub use state::{
    AttemptOutcome, ConfirmationStatus, Phase, ReconciliationState, Resolution, TimelineEntry,
};
