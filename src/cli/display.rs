//! Terminal rendering of the flow view
//!
//! Screen titles and per-step copy live here, keyed by [`Route`], so the
//! engine never carries presentation text.

use crate::controller::FlowView;
use crate::flow::{FlowError, Route, questions};
use crate::validation::TimeoutWarning;

/// Screen title for each route
pub fn screen_title(route: &Route) -> &'static str {
    match route {
        Route::Registration => "Registration",
        Route::Question { .. } => "Question",
        Route::AwaitingValidation => "Waiting for the administrator",
        Route::ErrorOrBlocked {
            allow_retry: true, ..
        } => "Answer not accepted",
        Route::ErrorOrBlocked { .. } => "Session closed",
        Route::Rating => "Rate your experience",
        Route::Completion => "All done",
    }
}

/// Short instruction telling the participant what to do next
pub fn next_action(route: &Route) -> String {
    match route {
        Route::Registration => "Register with: quizflow register --name <name> --age <age>".into(),
        Route::Question { question_id } => {
            format!("Answer with: quizflow answer {} <text>", question_id)
        }
        Route::AwaitingValidation => "Keep waiting with: quizflow wait".into(),
        Route::ErrorOrBlocked {
            allow_retry: true, ..
        } => "Try again with: quizflow retry".into(),
        Route::ErrorOrBlocked { .. } => "Start over with: quizflow restart".into(),
        Route::Rating => "Rate with: quizflow rate <1-5>".into(),
        Route::Completion => "Acknowledge with: quizflow finish".into(),
    }
}

/// Render the view for humans, or as pretty JSON
pub fn print_view(view: &FlowView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!();
    println!("📋 {}", screen_title(&view.route));

    if let Some(session) = &view.session {
        println!(
            "   Participant: {} ({})  Session: {}",
            session.participant.name, session.participant.age, session.session_id
        );
        println!(
            "   Step {}  Status: {}  Completed: {:?}",
            session.current_step, session.status, session.completed_steps
        );
    }

    match &view.route {
        Route::Question { question_id } => {
            if let Some(question) = questions::question(*question_id) {
                println!();
                println!("   Q{}: {}", question.id, question.prompt);
                println!("   💡 {}", question.hint);
            }
            if let Some(entry) = view
                .session
                .as_ref()
                .and_then(|s| s.answer_for(*question_id))
            {
                println!("   Attempts used: {}", entry.attempts);
            }
        }
        Route::ErrorOrBlocked { message, .. } => {
            println!();
            println!("   {}", message);
            if let Some(decision) = view.session.as_ref().and_then(|s| s.admin_response.as_ref())
                && let Some(note) = &decision.note
            {
                println!("   Note: {}", note);
            }
        }
        Route::Completion => {
            if let Some(rating) = view.session.as_ref().and_then(|s| s.rating) {
                println!("   Thanks! You rated the experience {}/5", rating);
            }
        }
        _ => {}
    }

    if let Some(error) = &view.last_error {
        println!();
        print_error(error);
    }

    println!();
    println!("➡️  {}", next_action(&view.route));
    Ok(())
}

/// Field errors inline, everything else as a single line
pub fn print_error(error: &FlowError) {
    match error {
        FlowError::Validation(errors) => {
            for field in &errors.fields {
                println!("❌ {}: {}", field.field, field.message);
            }
        }
        FlowError::StorageCorrupt(_) => {
            println!("⚠️  The saved session could not be read and was discarded");
        }
        other => println!("❌ {}", other),
    }
}

pub fn print_warning(warning: &TimeoutWarning) {
    eprintln!(
        "⏳ Still waiting for the administrator on question {} ({}s)",
        warning.question_id,
        warning.waited.as_secs()
    );
}
