//! Confirmation sessions held by the landing service.

use bazaar_core::{
    ConfirmationView, MarketplaceApi, PollPolicy, ReconciliationState, Reconciler, RedirectContext,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinError;
use tokio::time::Instant;
use uuid::Uuid;

/// How long a finished session stays readable
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Session identifier handed back to the browser
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("a confirmation attempt is already in progress")]
    InProgress,

    #[error("confirmation attempt aborted: {0}")]
    Aborted(#[from] JoinError),
}

/// One landing page visit: its redirect and its flow.
///
/// Attempts run on their own task, so they reach a terminal phase even when
/// the request that started them is dropped.
pub struct Session {
    pub redirect: RedirectContext,
    created_at: Instant,
    reconciler: Arc<Mutex<Reconciler>>,
    progress: watch::Receiver<ReconciliationState>,
}

impl Session {
    fn new(redirect: RedirectContext, mut reconciler: Reconciler) -> Self {
        let progress = reconciler.subscribe();
        Self {
            redirect,
            created_at: Instant::now(),
            reconciler: Arc::new(Mutex::new(reconciler)),
            progress,
        }
    }

    /// Latest view, including the phase of an attempt still running
    pub fn view(&self, show_diagnostics: bool) -> ConfirmationView {
        ConfirmationView::render(&self.progress.borrow(), show_diagnostics)
    }

    pub fn in_flight(&self) -> bool {
        self.reconciler.try_lock().is_err()
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl && !self.in_flight()
    }

    /// Run the flow once, as on page load
    pub async fn run(
        self: Arc<Self>,
        show_diagnostics: bool,
    ) -> Result<ConfirmationView, AttemptError> {
        let session = Arc::clone(&self);
        tokio::spawn(async move {
            let mut reconciler = session.reconciler.lock().await;
            reconciler.run(&session.redirect).await;
        })
        .await?;
        Ok(self.view(show_diagnostics))
    }

    /// Retry unless an attempt is already in flight
    pub async fn retry(
        self: Arc<Self>,
        show_diagnostics: bool,
    ) -> Result<ConfirmationView, AttemptError> {
        let mut reconciler = Arc::clone(&self.reconciler)
            .try_lock_owned()
            .map_err(|_| AttemptError::InProgress)?;
        let session = Arc::clone(&self);
        tokio::spawn(async move {
            reconciler.retry(&session.redirect).await;
        })
        .await?;
        Ok(self.view(show_diagnostics))
    }

    #[cfg(test)]
    pub(crate) fn reconciler(&self) -> &Mutex<Reconciler> {
        &self.reconciler
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    api: Arc<dyn MarketplaceApi>,
    policy: PollPolicy,
    session_ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl AppState {
    pub fn new(api: Arc<dyn MarketplaceApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            session_ttl: DEFAULT_SESSION_TTL,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Register a new session, dropping finished ones past their TTL
    pub fn open_session(&self, redirect: RedirectContext) -> (SessionId, Arc<Session>) {
        let id = SessionId::new();
        let reconciler = Reconciler::with_policy(Arc::clone(&self.api), self.policy);
        let session = Arc::new(Session::new(redirect, reconciler));

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| !s.expired(self.session_ttl));
        if sessions.len() < before {
            tracing::debug!(evicted = before - sessions.len(), "expired sessions dropped");
        }
        sessions.insert(id, Arc::clone(&session));

        (id, session)
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .filter(|s| !s.expired(self.session_ttl))
            .cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
