//! # Quizflow
//!
//! Session lifecycle engine for an interactive, multi-step quiz. A participant
//! registers, answers three questions that are each validated by an
//! administrator, rates the experience and reaches a completion screen.
//!
//! ## Architecture Overview
//!
//! - **[`session`]**: Session model, atomic persistence and the resume/expiry guard
//! - **[`flow`]**: Step transition engine, routes and error taxonomy
//! - **[`validation`]**: Administrator decision sources (simulated, scripted, channel)
//! - **[`controller`]**: Engine-driving controller consumed by a presentation layer
//! - **[`cli`]**: Command-line presentation layer and configuration discovery
//!
//! ## Features
//!
//! ### 🔄 Step Lifecycle
//! - **Pure Transitions**: `(session, event) -> (session', route)` with no I/O
//! - **Attempt Capping**: Configurable attempts per question with a terminal-failed path
//! - **Administrator Outcomes**: Approve, reject with retry, or block the session
//!
//! ### 💾 Session Persistence
//! - **Atomic Writes**: Temp file, fsync and rename for every save
//! - **Fail-Open Loading**: Corrupt records are quarantined and treated as absent
//! - **Resume & Expiry**: Stored sessions resume at their step or expire after 24 hours
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizflow::flow::StepEngine;
//! use quizflow::session::create_session;
//! use quizflow::validation::AdminDecision;
//! use chrono::Utc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = StepEngine::default();
//!     let session = create_session("Ana", 29)?;
//!
//!     let (session, _pending) = engine.submit_answer(session, 1, "París", Utc::now())?;
//!     let (session, route) = engine.apply_validation_outcome(
//!         session,
//!         AdminDecision::approved("Correct"),
//!         Utc::now(),
//!     )?;
//!
//!     println!("step {} -> {}", session.current_step, route);
//!     Ok(())
//! }
//! ```

/// Session model, persistence and resume handling.
///
/// Provides the session data shape with its invariants, the atomic session
/// store and the guard that decides between resuming and starting over.
pub mod session;

/// Step transition engine and the routes it drives.
pub mod flow;

/// Administrator decision sources.
pub mod validation;

/// Flow orchestration for presentation layers.
pub mod controller;

/// Environment constants and path utilities.
///
/// Centralizes directory names, file names and storage keys used throughout
/// the application for easier maintenance and consistency.
pub mod env;

// CLI module for command-line interface
pub mod cli;

// Re-export main session types
pub use session::{
    FileSessionStore, MemorySessionStore, ResumeDecision, ResumeGuard, Session, SessionStatus,
    SessionStore,
};

// Re-export main flow types
pub use flow::{FlowError, PendingValidation, Route, StepEngine, ValidationErrors};

// Re-export decision source types
pub use validation::{AdminDecision, DecisionKind, DecisionSource, SimulatedAdmin};

// Re-export controller types
pub use controller::{DecisionPoll, FlowConfig, FlowController, FlowView};
