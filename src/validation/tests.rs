use crate::flow::StepEngine;
use crate::session::create_session;
use crate::validation::*;
use std::time::Duration;
use test_tag::tag;

fn request_for(question_id: u8, answer: &str) -> DecisionRequest {
    let engine = StepEngine::default();
    let mut session = create_session("Ana", 29).unwrap();
    for previous in 1..question_id {
        let (next, _) = engine
            .submit_answer(session, previous, "ok", chrono::Utc::now())
            .unwrap();
        let (next, _) = engine
            .apply_validation_outcome(next, AdminDecision::approved("ok"), chrono::Utc::now())
            .unwrap();
        session = next;
    }

    let (session, pending) = engine
        .submit_answer(session, question_id, answer, chrono::Utc::now())
        .unwrap();
    DecisionRequest::new(&session, &pending)
}

#[test]
fn test_request_carries_answer_context() {
    let request = request_for(2, "  Marte ");

    assert_eq!(request.question_id, 2);
    assert_eq!(request.attempt, 1);
    assert_eq!(request.answer, "Marte");
    assert!(request.session_id.starts_with("qs-"));
}

#[test]
fn test_decision_wire_format() {
    let decision = AdminDecision::rejected("Not quite")
        .with_note("Check the spelling")
        .with_reason("incorrect_answer");
    let value = serde_json::to_value(&decision).unwrap();

    assert_eq!(value["type"], "rejected");
    assert_eq!(value["message"], "Not quite");
    assert_eq!(value["note"], "Check the spelling");

    let plain = serde_json::to_value(AdminDecision::approved("Correct")).unwrap();
    assert!(plain.get("note").is_none());
    assert!(plain.get("reason").is_none());
}

#[test]
fn test_decision_config_defaults() {
    let config: DecisionConfig = toml::from_str("").unwrap();
    assert_eq!(config.timeout(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_scripted_decisions_in_order() {
    let source = ScriptedDecisions::new([
        AdminDecision::rejected("Try again"),
        AdminDecision::approved("Correct"),
    ]);
    let request = request_for(1, "Lyon");

    assert_eq!(
        source.await_decision(&request).await.unwrap().kind,
        DecisionKind::Rejected
    );
    assert_eq!(source.remaining().await, 1);
    assert_eq!(
        source.await_decision(&request).await.unwrap().kind,
        DecisionKind::Approved
    );
    assert_eq!(
        source.await_decision(&request).await,
        Err(DecisionError::Exhausted)
    );

    source.push(AdminDecision::blocked("Bye")).await;
    assert_eq!(
        source.await_decision(&request).await.unwrap().kind,
        DecisionKind::Blocked
    );
}

#[tokio::test]
async fn test_channel_decisions() {
    let (admin, source) = admin_channel(4);
    let request = request_for(1, "París");

    admin.decide(AdminDecision::approved("Correct")).await.unwrap();
    let decision = source.await_decision(&request).await.unwrap();
    assert_eq!(decision.kind, DecisionKind::Approved);

    drop(admin);
    assert_eq!(
        source.await_decision(&request).await,
        Err(DecisionError::Closed)
    );
}

#[tokio::test]
async fn test_admin_handle_reports_closed_source() {
    let (admin, source) = admin_channel(1);
    drop(source);

    assert_eq!(
        admin.decide(AdminDecision::approved("late")).await,
        Err(DecisionError::Closed)
    );
}

#[test]
fn test_answer_key_policy() {
    let admin = SimulatedAdmin::new(Duration::ZERO, SimulationPolicy::AnswerKey);

    let accepted = admin.decide(&request_for(1, "paris"));
    assert_eq!(accepted.kind, DecisionKind::Approved);

    let rejected = admin.decide(&request_for(3, "five"));
    assert_eq!(rejected.kind, DecisionKind::Rejected);
    assert_eq!(rejected.note.as_deref(), Some("Attempt 1 was not accepted"));
    assert_eq!(rejected.reason.as_deref(), Some("incorrect_answer"));
}

#[tokio::test]
#[tag(timer)]
async fn test_simulated_admin_waits_for_delay() {
    tokio::time::pause();
    let admin = SimulatedAdmin::new(Duration::from_secs(3), SimulationPolicy::ApproveAll);
    let request = request_for(1, "anything");

    let started = tokio::time::Instant::now();
    let decision = admin.await_decision(&request).await.unwrap();

    assert_eq!(decision.kind, DecisionKind::Approved);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
#[tag(timer)]
async fn test_scripted_delay_is_observable() {
    tokio::time::pause();
    let source =
        ScriptedDecisions::new([AdminDecision::approved("ok")]).with_delay(Duration::from_secs(15));
    let request = request_for(1, "París");

    let early = tokio::time::timeout(Duration::from_secs(10), source.await_decision(&request)).await;
    assert!(early.is_err());
    // The timed-out call never popped the queue
    assert_eq!(source.remaining().await, 1);
}
