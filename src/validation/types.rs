use crate::flow::types::PendingValidation;
use crate::session::model::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Kind of administrator decision on a submitted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approved,
    Rejected,
    Blocked,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionKind::Approved => write!(f, "approved"),
            DecisionKind::Rejected => write!(f, "rejected"),
            DecisionKind::Blocked => write!(f, "blocked"),
        }
    }
}

/// Decision payload as delivered by the administrator side.
///
/// Stored on the session as `adminResponse` and overwritten every round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDecision {
    #[serde(rename = "type")]
    pub kind: DecisionKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AdminDecision {
    pub fn new(kind: DecisionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            note: None,
            reason: None,
        }
    }

    pub fn approved(message: impl Into<String>) -> Self {
        Self::new(DecisionKind::Approved, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(DecisionKind::Rejected, message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(DecisionKind::Blocked, message)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Context handed to a decision source for one submitted answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub request_id: Uuid,
    pub session_id: String,
    pub question_id: u8,
    pub attempt: u32,
    pub answer: String,
    pub submitted_at: DateTime<Utc>,
}

impl DecisionRequest {
    pub fn new(session: &Session, pending: &PendingValidation) -> Self {
        let answer = session
            .answer_for(pending.question_id)
            .map(|a| a.answer.clone())
            .unwrap_or_default();

        Self {
            request_id: pending.request_id,
            session_id: session.session_id.clone(),
            question_id: pending.question_id,
            attempt: pending.attempt,
            answer,
            submitted_at: session.last_activity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("No scripted decision left")]
    Exhausted,

    #[error("Decision channel closed")]
    Closed,
}

/// Informational notice that a decision is taking longer than expected.
/// Never changes session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutWarning {
    pub request_id: Uuid,
    pub question_id: u8,
    pub waited: Duration,
}

impl std::fmt::Display for TimeoutWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Still waiting for a decision on question {} ({}s)",
            self.question_id,
            self.waited.as_secs()
        )
    }
}

/// Advisory timeout for outstanding decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub timeout_secs: u64,
}

impl DecisionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}
