//! Step transition engine.
//!
//! Pure functions from `(session, event)` to the next session and the route
//! to render. Nothing here touches storage; the controller persists results.

use crate::flow::types::{FlowError, PendingValidation, Route, ValidationErrors};
use crate::session::model::*;
use crate::validation::{AdminDecision, DecisionKind};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Applies flow events to sessions under a fixed attempt cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEngine {
    max_attempts: u32,
}

impl Default for StepEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl StepEngine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record an answer for the current question and wait for a decision.
    ///
    /// Correctness is not judged here; it arrives later through
    /// [`StepEngine::apply_validation_outcome`].
    pub fn submit_answer(
        &self,
        mut session: Session,
        question_id: u8,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<(Session, PendingValidation), FlowError> {
        if session.status != SessionStatus::Active {
            return Err(FlowError::invalid_state(format!(
                "cannot answer while the session is {}",
                session.status
            )));
        }

        let current = session.current_step;
        if !(1..=QUESTION_COUNT).contains(&current) || question_id != current {
            return Err(FlowError::invalid_state(format!(
                "question {} is not the current question (step {})",
                question_id, current
            )));
        }

        let text = answer.trim();
        if text.is_empty() {
            return Err(FlowError::Validation(ValidationErrors::single(
                "answer",
                "Answer is required",
            )));
        }

        let max_attempts = self.max_attempts;
        let attempt = match session.answer_for_mut(question_id) {
            Some(entry) => {
                if entry.is_resolved(max_attempts) {
                    return Err(FlowError::invalid_state(format!(
                        "question {} is already resolved",
                        question_id
                    )));
                }
                entry.attempts = (entry.attempts + 1).min(max_attempts);
                entry.answer = text.to_string();
                entry.is_correct = false;
                entry.attempts
            }
            None => {
                session.answers.push(AnswerEntry {
                    question_id,
                    answer: text.to_string(),
                    is_correct: false,
                    attempts: 1,
                });
                1
            }
        };

        session.status = SessionStatus::AwaitingValidation;
        session.current_step = STEP_VALIDATION;
        session.touch(now);

        debug!(
            "Session {} submitted question {} (attempt {}/{})",
            session.session_id, question_id, attempt, max_attempts
        );

        let pending = PendingValidation {
            request_id: Uuid::new_v4(),
            question_id,
            attempt,
        };
        Ok((session, pending))
    }

    /// Apply an administrator decision to the answer awaiting validation
    pub fn apply_validation_outcome(
        &self,
        mut session: Session,
        decision: AdminDecision,
        now: DateTime<Utc>,
    ) -> Result<(Session, Route), FlowError> {
        if session.status != SessionStatus::AwaitingValidation {
            return Err(FlowError::invalid_state(format!(
                "no answer is awaiting validation (session is {})",
                session.status
            )));
        }

        let question = session
            .current_question()
            .ok_or_else(|| FlowError::invalid_state("no open question to validate"))?;
        let attempts = session
            .answer_for(question)
            .map(|entry| entry.attempts)
            .ok_or_else(|| {
                FlowError::invalid_state(format!("no answer recorded for question {}", question))
            })?;

        let route = match decision.kind {
            DecisionKind::Approved => {
                if let Some(entry) = session.answer_for_mut(question) {
                    entry.is_correct = true;
                }
                session.completed_steps.insert(question);

                if question < QUESTION_COUNT {
                    session.current_step = question + 1;
                    session.status = SessionStatus::Active;
                    Route::question(question + 1)
                } else {
                    session.current_step = STEP_RATING;
                    session.status = SessionStatus::AwaitingRating;
                    Route::Rating
                }
            }
            DecisionKind::Rejected if attempts < self.max_attempts => {
                session.current_step = question;
                session.status = SessionStatus::Active;
                Route::ErrorOrBlocked {
                    allow_retry: true,
                    message: decision.message.clone(),
                }
            }
            DecisionKind::Rejected => {
                warn!(
                    "Session {} exhausted {} attempts on question {}",
                    session.session_id, self.max_attempts, question
                );
                session.current_step = question;
                session.status = SessionStatus::Rejected;
                Route::ErrorOrBlocked {
                    allow_retry: false,
                    message: exhausted_message(question, self.max_attempts),
                }
            }
            DecisionKind::Blocked => {
                warn!("Session {} was blocked by the administrator", session.session_id);
                session.current_step = question;
                session.status = SessionStatus::Blocked;
                Route::ErrorOrBlocked {
                    allow_retry: false,
                    message: decision.message.clone(),
                }
            }
        };

        info!(
            "Session {} question {} {} -> {}",
            session.session_id, question, decision.kind, route
        );

        session.admin_response = Some(decision);
        session.touch(now);
        Ok((session, route))
    }

    /// Record the final rating. Only valid once every answer was approved.
    pub fn submit_rating(
        &self,
        mut session: Session,
        rating: i64,
        now: DateTime<Utc>,
    ) -> Result<Session, FlowError> {
        if session.status != SessionStatus::AwaitingRating {
            return Err(FlowError::invalid_state(format!(
                "cannot rate while the session is {}",
                session.status
            )));
        }
        if !session.all_answers_correct() {
            return Err(FlowError::invalid_state(
                "cannot rate before all three answers are approved",
            ));
        }
        if !(i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&rating) {
            return Err(FlowError::Validation(ValidationErrors::single(
                "rating",
                format!("Rating must be between {} and {}", MIN_RATING, MAX_RATING),
            )));
        }

        session.rating = Some(rating as u8);
        session.completed_steps.insert(STEP_RATING);
        session.current_step = STEP_COMPLETED;
        session.status = SessionStatus::Completed;
        session.touch(now);

        info!("Session {} completed with rating {}", session.session_id, rating);
        Ok(session)
    }

    /// Route implied by a stored session
    pub fn route_for(&self, session: &Session) -> Route {
        if session.status.is_terminal_failure() {
            let message = match (&session.admin_response, session.status) {
                (Some(response), SessionStatus::Blocked) => response.message.clone(),
                (_, SessionStatus::Rejected) => exhausted_message(
                    session.current_question().unwrap_or(session.current_step),
                    self.max_attempts,
                ),
                _ => "Your session was blocked by the administrator.".to_string(),
            };
            return Route::ErrorOrBlocked {
                allow_retry: false,
                message,
            };
        }

        match session.current_step {
            step @ 1..=QUESTION_COUNT => Route::question(step),
            STEP_VALIDATION => Route::AwaitingValidation,
            STEP_RATING => Route::Rating,
            STEP_COMPLETED => Route::Completion,
            _ => Route::Registration,
        }
    }
}

fn exhausted_message(question: u8, max_attempts: u32) -> String {
    format!(
        "All {} attempts for question {} were used. Please contact an administrator.",
        max_attempts, question
    )
}
