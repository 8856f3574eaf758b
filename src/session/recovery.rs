use crate::flow::engine::StepEngine;
use crate::flow::types::Route;
use crate::session::model::*;
use crate::session::persistence::SessionStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Why the flow starts over at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshReason {
    NoSession,
    Expired,
    Completed,
    Corrupt,
}

/// Outcome of entering the flow
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeDecision {
    Fresh { reason: FreshReason },
    Resume { session: Session, route: Route },
}

impl ResumeDecision {
    pub fn route(&self) -> Route {
        match self {
            ResumeDecision::Fresh { .. } => Route::Registration,
            ResumeDecision::Resume { route, .. } => route.clone(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            ResumeDecision::Fresh { .. } => None,
            ResumeDecision::Resume { session, .. } => Some(session),
        }
    }
}

/// Decides on flow entry whether a stored session is resumed or discarded
pub struct ResumeGuard {
    store: Arc<dyn SessionStore>,
    engine: StepEngine,
    ttl: Duration,
}

impl ResumeGuard {
    pub fn new(store: Arc<dyn SessionStore>, engine: StepEngine, ttl: Duration) -> Self {
        Self { store, engine, ttl }
    }

    pub fn with_default_ttl(store: Arc<dyn SessionStore>, engine: StepEngine) -> Self {
        Self::new(store, engine, Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    /// Load the stored record and resume it, or clear it and start fresh.
    ///
    /// Always reads the store; in-memory state from before a reload is
    /// never trusted.
    pub async fn enter(&self, now: DateTime<Utc>) -> Result<ResumeDecision> {
        let Some(mut session) = self.store.load().await? else {
            info!("No stored session, starting at registration");
            return Ok(ResumeDecision::Fresh {
                reason: FreshReason::NoSession,
            });
        };

        if session.is_expired_with_ttl(now, self.ttl) {
            return self
                .discard(&session, FreshReason::Expired, "session expired")
                .await;
        }

        if session.status == SessionStatus::Completed {
            return self
                .discard(&session, FreshReason::Completed, "session already completed")
                .await;
        }

        if !(1..=STEP_COMPLETED).contains(&session.current_step) {
            return self
                .discard(&session, FreshReason::Corrupt, "step out of range")
                .await;
        }

        if session.status == SessionStatus::Approved {
            session.status = SessionStatus::Active;
            self.store.save(&session).await?;
            info!(
                "Normalized transient approved status for session {}",
                session.session_id
            );
        }

        let issues = session.consistency_issues(self.engine.max_attempts());
        if !issues.is_empty() {
            warn!(
                "Stored session {} is inconsistent: {}",
                session.session_id,
                issues.join("; ")
            );
            return self
                .discard(&session, FreshReason::Corrupt, "inconsistent state")
                .await;
        }

        let route = self.engine.route_for(&session);
        info!(
            "Resuming session {} at step {} ({})",
            session.session_id, session.current_step, route
        );
        Ok(ResumeDecision::Resume { session, route })
    }

    async fn discard(
        &self,
        session: &Session,
        reason: FreshReason,
        detail: &str,
    ) -> Result<ResumeDecision> {
        info!(
            "Discarding session {}: {}, starting at registration",
            session.session_id, detail
        );
        self.store.clear().await?;
        Ok(ResumeDecision::Fresh { reason })
    }
}
