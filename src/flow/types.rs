use crate::validation::DecisionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Screen the presentation layer should render for the current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Registration,
    Question { question_id: u8 },
    AwaitingValidation,
    /// Retry screen after a rejection, or the terminal blocked screen
    ErrorOrBlocked {
        allow_retry: bool,
        message: String,
    },
    Rating,
    Completion,
}

impl Route {
    pub fn question(question_id: u8) -> Self {
        Route::Question { question_id }
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            Route::ErrorOrBlocked {
                allow_retry: false,
                ..
            }
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Registration => write!(f, "registration"),
            Route::Question { question_id } => write!(f, "question[{}]", question_id),
            Route::AwaitingValidation => write!(f, "awaiting-validation"),
            Route::ErrorOrBlocked { .. } => write!(f, "error-or-blocked"),
            Route::Rating => write!(f, "rating"),
            Route::Completion => write!(f, "completion"),
        }
    }
}

/// Handle for an answer that is waiting on an administrator decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingValidation {
    pub request_id: Uuid,
    pub question_id: u8,
    pub attempt: u32,
}

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Per-field input problems, shown inline by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), FlowError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors surfaced by the flow core. None of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stored session is corrupt: {0}")]
    StorageCorrupt(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Decision source failure: {0}")]
    Decision(#[from] DecisionError),
}

impl FlowError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        FlowError::InvalidState(message.into())
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, FlowError::InvalidState(_))
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(error: anyhow::Error) -> Self {
        FlowError::Storage(format!("{:#}", error))
    }
}
