use crate::flow::types::{FlowError, ValidationErrors};
use crate::validation::AdminDecision;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque session identifier, generated once at registration
pub type SessionId = String;

/// Number of questions in the flow; steps 1..=QUESTION_COUNT are questions
pub const QUESTION_COUNT: u8 = 3;
pub const STEP_VALIDATION: u8 = 4;
pub const STEP_RATING: u8 = 5;
pub const STEP_COMPLETED: u8 = 6;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 120;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Answering the current question
    Active,
    /// An answer was submitted and no decision has arrived yet
    AwaitingValidation,
    /// Accepted on load for records written mid-transition; the engine never rests here
    Approved,
    /// Terminal: attempts exhausted on a question
    Rejected,
    /// Terminal: an administrator blocked the session
    Blocked,
    AwaitingRating,
    Completed,
}

impl SessionStatus {
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, SessionStatus::Rejected | SessionStatus::Blocked)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::AwaitingValidation => "awaiting_validation",
            SessionStatus::Approved => "approved",
            SessionStatus::Rejected => "rejected",
            SessionStatus::Blocked => "blocked",
            SessionStatus::AwaitingRating => "awaiting_rating",
            SessionStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub age: u32,
}

/// One question's answer; updated in place while attempts accumulate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: u8,
    pub answer: String,
    pub is_correct: bool,
    pub attempts: u32,
}

impl AnswerEntry {
    /// Correct, or out of attempts. Either way the entry is frozen.
    pub fn is_resolved(&self, max_attempts: u32) -> bool {
        self.is_correct || self.attempts >= max_attempts
    }
}

/// One participant's run through the quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub participant: Participant,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub current_step: u8,
    pub completed_steps: BTreeSet<u8>,
    pub status: SessionStatus,
    pub answers: Vec<AnswerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_response: Option<AdminDecision>,
}

/// Validate and build a fresh session stamped with the current time
pub fn create_session(name: &str, age: i64) -> Result<Session, FlowError> {
    create_session_at(name, age, Utc::now())
}

/// Validate and build a fresh session stamped with `now`
pub fn create_session_at(name: &str, age: i64, now: DateTime<Utc>) -> Result<Session, FlowError> {
    validate_registration(name, age).into_result()?;

    Ok(Session {
        session_id: generate_session_id(now),
        participant: Participant {
            name: name.trim().to_string(),
            age: age as u32,
        },
        created_at: now,
        last_activity: now,
        current_step: 1,
        completed_steps: BTreeSet::new(),
        status: SessionStatus::Active,
        answers: Vec::new(),
        rating: None,
        admin_response: None,
    })
}

/// Collect per-field registration problems
pub fn validate_registration(name: &str, age: i64) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    let trimmed = name.trim();
    if trimmed.is_empty() {
        errors.push("name", "Name is required");
    } else if trimmed.chars().count() < MIN_NAME_LEN {
        errors.push(
            "name",
            format!("Name must have at least {} characters", MIN_NAME_LEN),
        );
    }

    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        errors.push(
            "age",
            format!("Age must be a whole number between {} and {}", MIN_AGE, MAX_AGE),
        );
    }

    errors
}

/// Millisecond timestamp plus a random suffix
pub fn generate_session_id(now: DateTime<Utc>) -> SessionId {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("qs-{:x}-{}", now.timestamp_millis(), suffix)
}

/// Step implied by a status and the completed set.
///
/// Returns `None` when the pair cannot occur, e.g. an active session with
/// every question already completed.
pub fn derive_step(status: SessionStatus, completed_steps: &BTreeSet<u8>) -> Option<u8> {
    match status {
        SessionStatus::AwaitingValidation => Some(STEP_VALIDATION),
        SessionStatus::AwaitingRating => Some(STEP_RATING),
        SessionStatus::Completed => Some(STEP_COMPLETED),
        SessionStatus::Active
        | SessionStatus::Approved
        | SessionStatus::Rejected
        | SessionStatus::Blocked => first_open_question(completed_steps),
    }
}

fn first_open_question(completed_steps: &BTreeSet<u8>) -> Option<u8> {
    (1..=QUESTION_COUNT).find(|q| !completed_steps.contains(q))
}

impl Session {
    /// Older than the default 24 hour window
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_expired_with_ttl(now, Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    pub fn is_expired_with_ttl(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }

    /// Question being answered or validated, if any
    pub fn current_question(&self) -> Option<u8> {
        match self.status {
            SessionStatus::AwaitingRating | SessionStatus::Completed => None,
            _ => first_open_question(&self.completed_steps),
        }
    }

    pub fn answer_for(&self, question_id: u8) -> Option<&AnswerEntry> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    pub fn answer_for_mut(&mut self, question_id: u8) -> Option<&mut AnswerEntry> {
        self.answers.iter_mut().find(|a| a.question_id == question_id)
    }

    /// Every question answered and approved
    pub fn all_answers_correct(&self) -> bool {
        (1..=QUESTION_COUNT).all(|q| self.answer_for(q).is_some_and(|a| a.is_correct))
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Every invariant violation found in this record
    pub fn consistency_issues(&self, max_attempts: u32) -> Vec<String> {
        let mut issues = Vec::new();

        if !(1..=STEP_COMPLETED).contains(&self.current_step) {
            issues.push(format!("currentStep {} is out of range", self.current_step));
        }

        match derive_step(self.status, &self.completed_steps) {
            Some(step) if step == self.current_step => {}
            Some(step) => issues.push(format!(
                "currentStep {} disagrees with status {} (expected {})",
                self.current_step, self.status, step
            )),
            None => issues.push(format!(
                "status {} is impossible with completed steps {:?}",
                self.status, self.completed_steps
            )),
        }

        if let Some(step) = self
            .completed_steps
            .iter()
            .find(|s| !(1..=STEP_COMPLETED).contains(*s))
        {
            issues.push(format!("completed step {} is out of range", step));
        }

        for (index, entry) in self.answers.iter().enumerate() {
            if entry.question_id as usize != index + 1 {
                issues.push(format!(
                    "answer #{} is for question {}",
                    index + 1,
                    entry.question_id
                ));
            }
            if entry.attempts < 1 || entry.attempts > max_attempts {
                issues.push(format!(
                    "question {} has {} attempts (allowed 1..={})",
                    entry.question_id, entry.attempts, max_attempts
                ));
            }
            if entry.is_correct != self.completed_steps.contains(&entry.question_id) {
                issues.push(format!(
                    "question {} correctness disagrees with completed steps",
                    entry.question_id
                ));
            }
        }

        for question in (1..=QUESTION_COUNT).filter(|q| self.completed_steps.contains(q)) {
            if self.answer_for(question).is_none() {
                issues.push(format!("question {} completed without an answer", question));
            }
        }

        if let Some(question) = self.current_question() {
            let entry = self.answer_for(question);
            match self.status {
                SessionStatus::Active | SessionStatus::Approved => {
                    if entry.is_some_and(|a| !a.is_correct && a.attempts >= max_attempts) {
                        issues.push(format!(
                            "question {} is exhausted but the session is still {}",
                            question, self.status
                        ));
                    }
                }
                SessionStatus::AwaitingValidation => {
                    if entry.is_none() {
                        issues.push(format!(
                            "question {} awaits validation without an answer",
                            question
                        ));
                    }
                }
                SessionStatus::Rejected => {
                    if !entry.is_some_and(|a| a.attempts >= max_attempts) {
                        issues.push(format!(
                            "question {} is rejected with attempts left",
                            question
                        ));
                    }
                }
                _ => {}
            }

            if let Some(ahead) = self.answers.iter().find(|a| a.question_id > question) {
                issues.push(format!(
                    "question {} answered ahead of open question {}",
                    ahead.question_id, question
                ));
            }
        }

        if self.rating.is_some() && !self.all_answers_correct() {
            issues.push("rating present without three correct answers".to_string());
        }
        if let Some(rating) = self.rating
            && !(MIN_RATING..=MAX_RATING).contains(&rating)
        {
            issues.push(format!("rating {} is out of range", rating));
        }

        issues
    }
}
