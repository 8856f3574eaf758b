//! # Flow Controller
//!
//! Drives the step transition engine on behalf of a presentation layer.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                FlowController                 │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ │
//! │  │  Session   │ │    Step    │ │  Decision  │ │
//! │  │   Store    │ │   Engine   │ │   Source   │ │
//! │  └────────────┘ └────────────┘ └────────────┘ │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Inbound events (`register`, `answer`, `retry`, `rate`, `restart`) map to
//! engine transitions; the outbound projection is a [`FlowView`]. Every
//! mutation re-reads the store first, so a reload that happened in between
//! is always observed. At most one administrator decision is outstanding.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use quizflow::{FlowConfig, FlowController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut flow = FlowController::with_simulated_admin(FlowConfig::default())?;
//!     flow.enter().await?;
//!     flow.register("Ana", 29).await?;
//!     flow.answer(1, "París").await?;
//!     let route = flow.wait_for_decision(|w| eprintln!("{}", w)).await?;
//!     println!("next: {}", route);
//!     Ok(())
//! }
//! ```

use crate::flow::engine::StepEngine;
use crate::flow::types::{FlowError, PendingValidation, Route};
use crate::session::model::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_SESSION_TTL_HOURS, Session, SessionStatus, create_session,
};
use crate::session::persistence::{FileSessionStore, SessionStore, StorageConfig};
use crate::session::recovery::{FreshReason, ResumeDecision, ResumeGuard};
use crate::validation::{
    AdminDecision, DecisionConfig, DecisionError, DecisionRequest, DecisionSource, SimulatedAdmin,
    SimulationConfig, TimeoutWarning,
};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shortest advisory wait, so a zero timeout cannot spin
const MIN_DECISION_WAIT: Duration = Duration::from_millis(100);

/// Unified configuration for the flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub max_attempts: u32,
    pub session_ttl_hours: u32,
    pub decision: DecisionConfig,
    pub simulation: SimulationConfig,
    pub storage: StorageConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS as u32,
            decision: DecisionConfig::default(),
            simulation: SimulationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl FlowConfig {
    pub fn engine(&self) -> StepEngine {
        StepEngine::new(self.max_attempts)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session_ttl_hours))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse flow configuration")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize flow configuration")
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}

/// Result of waiting on the outstanding decision
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionPoll {
    /// A decision was applied; render this route
    Decided(Route),
    /// Nothing arrived in time. State is unchanged.
    StillWaiting(TimeoutWarning),
    /// The decision no longer matched the stored session and was dropped
    Discarded(Route),
}

/// Read-only projection handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowView {
    pub session: Option<Session>,
    pub route: Route,
    pub pending_validation: bool,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<FlowError>,
}

fn serialize_error<S: Serializer>(error: &Option<FlowError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

struct OutstandingDecision {
    request: DecisionRequest,
    future: BoxFuture<'static, Result<AdminDecision, DecisionError>>,
    started: Instant,
}

/// Engine-driving controller for one participant's flow
pub struct FlowController {
    store: Arc<dyn SessionStore>,
    source: Arc<dyn DecisionSource>,
    engine: StepEngine,
    guard: ResumeGuard,
    config: FlowConfig,
    session: Option<Session>,
    route: Route,
    outstanding: Option<OutstandingDecision>,
    last_error: Option<FlowError>,
}

impl FlowController {
    pub fn new(
        config: FlowConfig,
        store: Arc<dyn SessionStore>,
        source: Arc<dyn DecisionSource>,
    ) -> Self {
        let engine = config.engine();
        let guard = ResumeGuard::new(store.clone(), engine, config.session_ttl());

        Self {
            store,
            source,
            engine,
            guard,
            config,
            session: None,
            route: Route::Registration,
            outstanding: None,
            last_error: None,
        }
    }

    /// File-backed store with the timer-simulated administrator
    pub fn with_simulated_admin(config: FlowConfig) -> Result<Self> {
        let store = Arc::new(
            FileSessionStore::new(config.storage.clone())
                .context("Failed to open session store")?,
        );
        let source = Arc::new(SimulatedAdmin::from_config(&config.simulation));
        Ok(Self::new(config, store, source))
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn pending_validation(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn last_error(&self) -> Option<&FlowError> {
        self.last_error.as_ref()
    }

    pub fn view(&self) -> FlowView {
        FlowView {
            session: self.session.clone(),
            route: self.route.clone(),
            pending_validation: self.pending_validation(),
            last_error: self.last_error.clone(),
        }
    }

    /// Enter the flow: resume the stored session or start at registration
    pub async fn enter(&mut self) -> Result<Route, FlowError> {
        self.outstanding = None;
        let decision = self.guard.enter(Utc::now()).await?;

        match decision {
            ResumeDecision::Fresh { reason } => {
                self.session = None;
                self.route = Route::Registration;
                self.last_error = match reason {
                    FreshReason::Corrupt => Some(FlowError::StorageCorrupt(
                        "the stored session could not be resumed".to_string(),
                    )),
                    _ => None,
                };
            }
            ResumeDecision::Resume { session, route } => {
                if route == Route::AwaitingValidation {
                    self.rearm(&session);
                }
                self.session = Some(session);
                self.route = route;
                self.last_error = None;
            }
        }

        Ok(self.route.clone())
    }

    /// Register a participant and open question 1
    pub async fn register(&mut self, name: &str, age: i64) -> Result<Route, FlowError> {
        let result = self.register_inner(name, age).await;
        self.settle(result).await
    }

    async fn register_inner(&mut self, name: &str, age: i64) -> Result<Route, FlowError> {
        if let ResumeDecision::Resume { session, .. } = self.guard.enter(Utc::now()).await? {
            let message = format!(
                "session {} is already in progress; restart before registering again",
                session.session_id
            );
            self.session = Some(session);
            return Err(FlowError::InvalidState(message));
        }

        let session = create_session(name, age)?;
        self.store.save(&session).await?;
        info!(
            "Registered session {} for {}",
            session.session_id, session.participant.name
        );

        self.session = Some(session);
        self.route = Route::question(1);
        Ok(self.route.clone())
    }

    /// Submit an answer and start waiting for the administrator
    pub async fn answer(
        &mut self,
        question_id: u8,
        text: &str,
    ) -> Result<PendingValidation, FlowError> {
        let result = self.answer_inner(question_id, text).await;
        self.settle(result).await
    }

    async fn answer_inner(
        &mut self,
        question_id: u8,
        text: &str,
    ) -> Result<PendingValidation, FlowError> {
        if let Some(outstanding) = &self.outstanding {
            return Err(FlowError::invalid_state(format!(
                "question {} is still awaiting a decision",
                outstanding.request.question_id
            )));
        }

        let session = self.fresh_session().await?;
        let (next, pending) = self
            .engine
            .submit_answer(session, question_id, text, Utc::now())?;
        self.store.save(&next).await?;

        self.arm(DecisionRequest::new(&next, &pending));
        self.session = Some(next);
        self.route = Route::AwaitingValidation;
        Ok(pending)
    }

    /// Wait up to `wait` for the outstanding decision.
    ///
    /// Elapsing only produces a [`TimeoutWarning`]; no outcome is invented.
    pub async fn poll_decision(&mut self, wait: Duration) -> Result<DecisionPoll, FlowError> {
        let result = self.poll_inner(wait).await;
        self.settle(result).await
    }

    async fn poll_inner(&mut self, wait: Duration) -> Result<DecisionPoll, FlowError> {
        if self.outstanding.is_none() {
            let session = self.fresh_session().await?;
            if session.status != SessionStatus::AwaitingValidation {
                return Err(FlowError::invalid_state(format!(
                    "no decision is outstanding (session is {})",
                    session.status
                )));
            }
            self.rearm(&session);
        }

        let Some(mut outstanding) = self.outstanding.take() else {
            return Err(FlowError::invalid_state("no decision is outstanding"));
        };

        let outcome = tokio::time::timeout(wait, &mut outstanding.future).await;
        match outcome {
            Err(_) => {
                let warning = TimeoutWarning {
                    request_id: outstanding.request.request_id,
                    question_id: outstanding.request.question_id,
                    waited: outstanding.started.elapsed(),
                };
                warn!("{}", warning);
                self.outstanding = Some(outstanding);
                Ok(DecisionPoll::StillWaiting(warning))
            }
            Ok(Err(e)) => {
                error!(
                    "Decision source failed for question {}: {}",
                    outstanding.request.question_id, e
                );
                // The stored answer still awaits validation; ask again on the next poll
                self.arm(outstanding.request);
                Err(FlowError::Decision(e))
            }
            Ok(Ok(decision)) => self.apply_decision(outstanding.request, decision).await,
        }
    }

    /// Wait until a decision lands, reporting every advisory timeout
    pub async fn wait_for_decision<F>(&mut self, mut on_warning: F) -> Result<Route, FlowError>
    where
        F: FnMut(&TimeoutWarning),
    {
        let wait = self.config.decision.timeout().max(MIN_DECISION_WAIT);
        loop {
            match self.poll_decision(wait).await? {
                DecisionPoll::Decided(route) | DecisionPoll::Discarded(route) => return Ok(route),
                DecisionPoll::StillWaiting(warning) => on_warning(&warning),
            }
        }
    }

    async fn apply_decision(
        &mut self,
        request: DecisionRequest,
        decision: AdminDecision,
    ) -> Result<DecisionPoll, FlowError> {
        let session = self.fresh_session().await?;

        let attempts = session
            .answer_for(request.question_id)
            .map(|entry| entry.attempts);
        let matches = session.session_id == request.session_id
            && session.status == SessionStatus::AwaitingValidation
            && session.current_question() == Some(request.question_id)
            && attempts == Some(request.attempt);

        if !matches {
            warn!(
                "Dropping stale {} decision for session {} question {} attempt {}",
                decision.kind, request.session_id, request.question_id, request.attempt
            );
            self.route = self.engine.route_for(&session);
            if session.status == SessionStatus::AwaitingValidation {
                self.rearm(&session);
            }
            return Ok(DecisionPoll::Discarded(self.route.clone()));
        }

        let (next, route) = self
            .engine
            .apply_validation_outcome(session, decision, Utc::now())?;
        self.store.save(&next).await?;

        self.session = Some(next);
        self.route = route.clone();
        Ok(DecisionPoll::Decided(route))
    }

    /// Leave the retry screen and go back to the current question
    pub async fn retry(&mut self) -> Result<Route, FlowError> {
        let result = self.retry_inner().await;
        self.settle(result).await
    }

    async fn retry_inner(&mut self) -> Result<Route, FlowError> {
        match &self.route {
            Route::ErrorOrBlocked {
                allow_retry: true, ..
            }
            | Route::Question { .. } => {}
            other => {
                return Err(FlowError::invalid_state(format!(
                    "nothing to retry from {}",
                    other
                )));
            }
        }

        let session = self.fresh_session().await?;
        if session.status != SessionStatus::Active {
            return Err(FlowError::invalid_state(format!(
                "cannot retry while the session is {}",
                session.status
            )));
        }

        self.route = Route::question(session.current_step);
        debug!("Retrying question {}", session.current_step);
        Ok(self.route.clone())
    }

    /// Rate the experience and reach the completion screen
    pub async fn rate(&mut self, value: i64) -> Result<Route, FlowError> {
        let result = self.rate_inner(value).await;
        self.settle(result).await
    }

    async fn rate_inner(&mut self, value: i64) -> Result<Route, FlowError> {
        let session = self.fresh_session().await?;
        let next = self.engine.submit_rating(session, value, Utc::now())?;
        self.store.save(&next).await?;

        self.session = Some(next);
        self.route = Route::Completion;
        Ok(self.route.clone())
    }

    /// Participant saw the completion screen; drop the stored record
    pub async fn acknowledge_completion(&mut self) -> Result<(), FlowError> {
        let result = self.acknowledge_inner().await;
        self.settle(result).await
    }

    async fn acknowledge_inner(&mut self) -> Result<(), FlowError> {
        let completed = self
            .session
            .as_ref()
            .is_some_and(|s| s.status == SessionStatus::Completed);
        if !completed {
            return Err(FlowError::invalid_state("the session is not completed"));
        }

        // The in-memory session stays as is; only the stored record goes
        self.store.clear().await?;
        info!("Completion acknowledged, session record cleared");
        Ok(())
    }

    /// Abandon everything and return to registration
    pub async fn restart(&mut self) -> Result<Route, FlowError> {
        self.outstanding = None;
        self.store.clear().await?;
        if let Some(session) = self.session.take() {
            info!("Restarted flow, discarded session {}", session.session_id);
        }
        self.route = Route::Registration;
        self.last_error = None;
        Ok(self.route.clone())
    }

    /// Stored session, adopted as the in-memory copy
    async fn fresh_session(&mut self) -> Result<Session, FlowError> {
        let Some(stored) = self.store.load().await? else {
            self.session = None;
            self.outstanding = None;
            self.route = Route::Registration;
            return Err(FlowError::invalid_state("no session in progress"));
        };

        if stored.is_expired_with_ttl(Utc::now(), self.config.session_ttl()) {
            self.store.clear().await?;
            self.session = None;
            self.outstanding = None;
            self.route = Route::Registration;
            return Err(FlowError::invalid_state(format!(
                "session {} expired",
                stored.session_id
            )));
        }

        if let Some(current) = &self.session
            && current != &stored
        {
            debug!(
                "In-memory session {} replaced by stored record {}",
                current.session_id, stored.session_id
            );
        }

        self.session = Some(stored.clone());
        Ok(stored)
    }

    fn arm(&mut self, request: DecisionRequest) {
        let source = self.source.clone();
        let pending_request = request.clone();
        let future = async move { source.await_decision(&pending_request).await }.boxed();

        debug!(
            "Awaiting decision {} for question {} attempt {}",
            request.request_id, request.question_id, request.attempt
        );
        self.outstanding = Some(OutstandingDecision {
            request,
            future,
            started: Instant::now(),
        });
    }

    /// Re-request the decision for an answer persisted as awaiting validation
    fn rearm(&mut self, session: &Session) {
        let Some(question_id) = session.current_question() else {
            return;
        };
        let Some(entry) = session.answer_for(question_id) else {
            return;
        };

        let pending = PendingValidation {
            request_id: Uuid::new_v4(),
            question_id,
            attempt: entry.attempts,
        };
        self.arm(DecisionRequest::new(session, &pending));
    }

    /// Record the outcome of an inbound event; invalid states re-sync from the store
    async fn settle<T>(&mut self, result: Result<T, FlowError>) -> Result<T, FlowError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                if e.is_invalid_state() {
                    warn!("{}; re-syncing from stored session", e);
                    self.resync().await;
                }
                self.last_error = Some(e.clone());
            }
        }
        result
    }

    async fn resync(&mut self) {
        match self.store.load().await {
            Ok(Some(session)) => {
                self.route = self.engine.route_for(&session);
                if session.status == SessionStatus::AwaitingValidation {
                    if self.outstanding.is_none() {
                        self.rearm(&session);
                    }
                } else {
                    self.outstanding = None;
                }
                self.session = Some(session);
            }
            Ok(None) => {
                self.session = None;
                self.outstanding = None;
                self.route = Route::Registration;
            }
            Err(e) => error!("Failed to re-sync from session store: {:#}", e),
        }
    }
}
