use crate::env;
use crate::flow::{Route, StepEngine};
use crate::session::*;
use crate::validation::AdminDecision;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

fn test_session() -> Session {
    create_session_at(
        env::test::TEST_PARTICIPANT,
        i64::from(env::test::TEST_AGE),
        fixed_now(),
    )
    .unwrap()
}

/// Session that answered question 1 correctly and is now on question 2
fn session_on_question_two() -> Session {
    let engine = StepEngine::default();
    let (session, _) = engine
        .submit_answer(test_session(), 1, "París", fixed_now())
        .unwrap();
    let (session, _) = engine
        .apply_validation_outcome(session, AdminDecision::approved("Correct"), fixed_now())
        .unwrap();
    session
}

fn file_store(temp_dir: &TempDir) -> FileSessionStore {
    FileSessionStore::new(StorageConfig {
        state_dir: temp_dir.path().join(".quizflow"),
        ..StorageConfig::default()
    })
    .unwrap()
}

#[test]
fn test_create_session_initial_state() {
    let session = test_session();

    assert_eq!(session.participant.name, "Ana");
    assert_eq!(session.participant.age, 29);
    assert_eq!(session.current_step, 1);
    assert!(session.completed_steps.is_empty());
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.answers.is_empty());
    assert_eq!(session.rating, None);
    assert_eq!(session.created_at, session.last_activity);
    assert!(session.session_id.starts_with("qs-"));
    assert!(session.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());
}

#[test]
fn test_session_ids_are_unique() {
    let a = generate_session_id(fixed_now());
    let b = generate_session_id(fixed_now());
    assert_ne!(a, b);
}

#[test]
fn test_registration_validation_reports_each_field() {
    let errors = validate_registration("A", 0);
    assert!(errors.for_field("name").is_some());
    assert!(errors.for_field("age").is_some());

    let errors = validate_registration("  ", 121);
    assert_eq!(errors.for_field("name"), Some("Name is required"));
    assert!(errors.for_field("age").is_some());

    assert!(validate_registration("Al", 1).is_empty());
    assert!(validate_registration("Ana", 120).is_empty());

    match create_session("Ana", -4) {
        Err(crate::flow::FlowError::Validation(errors)) => {
            assert!(errors.for_field("age").is_some());
            assert!(errors.for_field("name").is_none());
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[test]
fn test_expiry_window() {
    let session = test_session();
    let created = session.created_at;

    assert!(!session.is_expired(created + Duration::hours(23) + Duration::minutes(59)));
    assert!(!session.is_expired(created + Duration::hours(24)));
    assert!(session.is_expired(created + Duration::hours(24) + Duration::seconds(1)));
    assert!(session.is_expired_with_ttl(created + Duration::hours(2), Duration::hours(1)));
}

#[test]
fn test_derive_step() {
    let mut completed = std::collections::BTreeSet::new();
    assert_eq!(derive_step(SessionStatus::Active, &completed), Some(1));

    completed.insert(1);
    assert_eq!(derive_step(SessionStatus::Active, &completed), Some(2));
    assert_eq!(
        derive_step(SessionStatus::AwaitingValidation, &completed),
        Some(STEP_VALIDATION)
    );

    completed.extend([2, 3]);
    assert_eq!(derive_step(SessionStatus::Active, &completed), None);
    assert_eq!(
        derive_step(SessionStatus::AwaitingRating, &completed),
        Some(STEP_RATING)
    );
}

#[test]
fn test_consistency_issues_detected() {
    let mut session = session_on_question_two();
    assert!(session.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    session.current_step = 3;
    assert!(!session.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    let mut session = session_on_question_two();
    session.answers[0].attempts = 7;
    assert!(!session.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    let mut session = session_on_question_two();
    session.answers[0].is_correct = false;
    assert!(!session.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());
}

#[test]
fn test_record_uses_camel_case_fields() {
    let raw = encode_session(&session_on_question_two()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(value["formatVersion"], 1);
    assert_eq!(value["currentStep"], 2);
    assert_eq!(value["completedSteps"], serde_json::json!([1]));
    assert_eq!(value["status"], "active");
    assert_eq!(value["answers"][0]["questionId"], 1);
    assert_eq!(value["answers"][0]["isCorrect"], true);
    assert_eq!(value["adminResponse"]["type"], "approved");
    assert!(value.get("rating").is_none());
}

#[test]
fn test_decode_rejects_unknown_version() {
    let raw = encode_session(&test_session()).unwrap();
    let bumped = raw.replace("\"formatVersion\": 1", "\"formatVersion\": 9");

    assert!(matches!(
        decode_session(&bumped),
        Err(crate::flow::FlowError::StorageCorrupt(_))
    ));
}

#[test]
fn test_decode_accepts_missing_version() {
    let mut value: serde_json::Value =
        serde_json::from_str(&encode_session(&test_session()).unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("formatVersion");

    let session = decode_session(&value.to_string()).unwrap();
    assert_eq!(session, test_session_with_id(&session.session_id));
}

fn test_session_with_id(id: &str) -> Session {
    let mut session = test_session();
    session.session_id = id.to_string();
    session
}

#[test]
fn test_checksum_is_stable() {
    assert_eq!(
        calculate_checksum(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(
        calculate_checksum(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_ne!(calculate_checksum(b"ab"), calculate_checksum(b"ba"));
}

#[tokio::test]
async fn test_memory_store_round_trip() {
    let store = MemorySessionStore::new();
    assert_eq!(store.load().await.unwrap(), None);

    let session = session_on_question_two();
    store.save(&session).await.unwrap();
    assert_eq!(store.load().await.unwrap(), Some(session));

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), None);
    assert!(store.raw().await.is_none());
}

#[tokio::test]
async fn test_memory_store_discards_corrupt_record() {
    let store = MemorySessionStore::new();
    store.insert_raw("{ not json").await;

    assert_eq!(store.load().await.unwrap(), None);
    assert!(store.raw().await.is_none());
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(&temp_dir);

    let session = session_on_question_two();
    store.save(&session).await.unwrap();

    assert!(store.session_file().exists());
    assert_eq!(store.load().await.unwrap(), Some(session.clone()));

    // A second store over the same directory sees the same record
    let reopened = file_store(&temp_dir);
    assert_eq!(reopened.load().await.unwrap(), Some(session));

    // Only the record and its checksum remain; temp files were renamed away
    let temp_entries = std::fs::read_dir(env::temp_dir_path(&store.config.state_dir))
        .unwrap()
        .count();
    assert_eq!(temp_entries, 0);
}

#[tokio::test]
async fn test_file_store_quarantines_garbage() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(StorageConfig {
        state_dir: temp_dir.path().to_path_buf(),
        checksum_validation: false,
        preserve_corrupted: true,
    })
    .unwrap();

    std::fs::write(store.session_file(), "{\"sessionId\": 12").unwrap();
    assert_eq!(store.load().await.unwrap(), None);
    assert!(!store.session_file().exists());

    let quarantined: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(env::storage::CORRUPT_PREFIX)
        })
        .collect();
    assert_eq!(quarantined.len(), 1);
}

#[tokio::test]
async fn test_file_store_checksum_mismatch_discards() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(StorageConfig {
        state_dir: temp_dir.path().to_path_buf(),
        checksum_validation: true,
        preserve_corrupted: false,
    })
    .unwrap();

    let session = session_on_question_two();
    store.save(&session).await.unwrap();

    // Valid JSON, but not what the checksum covers
    let tampered = encode_session(&test_session()).unwrap();
    std::fs::write(store.session_file(), tampered).unwrap();

    assert_eq!(store.load().await.unwrap(), None);
    assert!(!store.session_file().exists());
    assert!(!env::checksum_file_path(temp_dir.path()).exists());
}

#[tokio::test]
async fn test_file_store_clear_removes_legacy_step_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(StorageConfig {
        state_dir: temp_dir.path().to_path_buf(),
        ..StorageConfig::default()
    })
    .unwrap();

    store.save(&test_session()).await.unwrap();
    let legacy = env::legacy_step_file_path(temp_dir.path());
    std::fs::write(&legacy, "2").unwrap();

    store.clear().await.unwrap();
    assert!(!store.session_file().exists());
    assert!(!legacy.exists());

    // Clearing twice is fine
    store.clear().await.unwrap();
}

#[tokio::test]
async fn test_guard_without_session_starts_fresh() {
    let store = Arc::new(MemorySessionStore::new());
    let guard = ResumeGuard::with_default_ttl(store, StepEngine::default());

    let decision = guard.enter(fixed_now()).await.unwrap();
    assert_eq!(
        decision,
        ResumeDecision::Fresh {
            reason: FreshReason::NoSession
        }
    );
    assert_eq!(decision.route(), Route::Registration);
}

#[tokio::test]
async fn test_guard_resumes_at_stored_step() {
    let store = Arc::new(MemorySessionStore::new());
    let session = session_on_question_two();
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), StepEngine::default());
    let decision = guard.enter(fixed_now() + Duration::hours(1)).await.unwrap();

    assert_eq!(decision.route(), Route::question(2));
    assert_eq!(decision.session(), Some(&session));
    assert_eq!(store.load().await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_guard_clears_expired_session() {
    let store = Arc::new(MemorySessionStore::new());
    store.save(&session_on_question_two()).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), StepEngine::default());
    let decision = guard.enter(fixed_now() + Duration::hours(25)).await.unwrap();

    assert_eq!(
        decision,
        ResumeDecision::Fresh {
            reason: FreshReason::Expired
        }
    );
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_guard_never_resumes_completed_session() {
    let engine = StepEngine::default();
    let mut session = test_session();
    for (question, answer) in [(1, "París"), (2, "Marte"), (3, "6")] {
        let (next, _) = engine
            .submit_answer(session, question, answer, fixed_now())
            .unwrap();
        let (next, _) = engine
            .apply_validation_outcome(next, AdminDecision::approved("Correct"), fixed_now())
            .unwrap();
        session = next;
    }
    let session = engine.submit_rating(session, 5, fixed_now()).unwrap();

    let store = Arc::new(MemorySessionStore::new());
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), engine);
    let decision = guard.enter(fixed_now()).await.unwrap();
    assert_eq!(
        decision,
        ResumeDecision::Fresh {
            reason: FreshReason::Completed
        }
    );
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_guard_discards_out_of_range_step() {
    let store = Arc::new(MemorySessionStore::new());
    let mut session = test_session();
    session.current_step = 9;
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), StepEngine::default());
    let decision = guard.enter(fixed_now()).await.unwrap();
    assert_eq!(
        decision,
        ResumeDecision::Fresh {
            reason: FreshReason::Corrupt
        }
    );
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_guard_discards_inconsistent_session() {
    let store = Arc::new(MemorySessionStore::new());
    let mut session = session_on_question_two();
    session.completed_steps.insert(3);
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), StepEngine::default());
    let decision = guard.enter(fixed_now()).await.unwrap();
    assert_eq!(
        decision,
        ResumeDecision::Fresh {
            reason: FreshReason::Corrupt
        }
    );
}

#[test]
fn test_consistency_issues_for_open_question() {
    let engine = StepEngine::default();
    let (awaiting, _) = engine
        .submit_answer(test_session(), 1, "Lyon", fixed_now())
        .unwrap();
    assert!(awaiting.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    let mut missing_answer = awaiting.clone();
    missing_answer.answers.clear();
    assert!(!missing_answer.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    let (mut rejected, _) = engine
        .apply_validation_outcome(awaiting, AdminDecision::rejected("No"), fixed_now())
        .unwrap();
    assert_eq!(rejected.status, SessionStatus::Active);
    assert!(rejected.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    rejected.status = SessionStatus::Rejected;
    assert!(!rejected.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());

    let mut ahead = session_on_question_two();
    ahead.answers.push(AnswerEntry {
        question_id: 3,
        answer: "6".to_string(),
        is_correct: false,
        attempts: 1,
    });
    assert!(!ahead.consistency_issues(DEFAULT_MAX_ATTEMPTS).is_empty());
}

async fn assert_guard_discards(session: &Session) {
    let store = Arc::new(MemorySessionStore::new());
    store.save(session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), StepEngine::default());
    let decision = guard.enter(fixed_now()).await.unwrap();
    assert_eq!(
        decision,
        ResumeDecision::Fresh {
            reason: FreshReason::Corrupt
        }
    );
    assert_eq!(decision.route(), Route::Registration);
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_guard_discards_active_session_with_exhausted_question() {
    let mut session = test_session();
    session.answers.push(AnswerEntry {
        question_id: 1,
        answer: "Lyon".to_string(),
        is_correct: false,
        attempts: DEFAULT_MAX_ATTEMPTS,
    });
    assert_eq!(session.status, SessionStatus::Active);

    assert_guard_discards(&session).await;
}

#[tokio::test]
async fn test_guard_discards_awaiting_session_without_answer() {
    let engine = StepEngine::default();
    let (mut session, _) = engine
        .submit_answer(test_session(), 1, "Lyon", fixed_now())
        .unwrap();
    session.answers.clear();

    assert_guard_discards(&session).await;
}

#[tokio::test]
async fn test_guard_resumes_awaiting_validation() {
    let engine = StepEngine::default();
    let (session, _) = engine
        .submit_answer(test_session(), 1, "Lyon", fixed_now())
        .unwrap();

    let store = Arc::new(MemorySessionStore::new());
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store, engine);
    let decision = guard.enter(fixed_now()).await.unwrap();
    assert_eq!(decision.route(), Route::AwaitingValidation);
    assert_eq!(
        decision.session().and_then(|s| s.current_question()),
        Some(1)
    );
}

#[tokio::test]
async fn test_guard_normalizes_approved_status() {
    let store = Arc::new(MemorySessionStore::new());
    let mut session = session_on_question_two();
    session.status = SessionStatus::Approved;
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store.clone(), StepEngine::default());
    let decision = guard.enter(fixed_now()).await.unwrap();

    assert_eq!(decision.route(), Route::question(2));
    let stored = store.load().await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_guard_resumes_blocked_as_terminal() {
    let engine = StepEngine::default();
    let (session, _) = engine
        .submit_answer(test_session(), 1, "Paris", fixed_now())
        .unwrap();
    let (session, _) = engine
        .apply_validation_outcome(
            session,
            AdminDecision::blocked("Your session was blocked"),
            fixed_now(),
        )
        .unwrap();

    let store = Arc::new(MemorySessionStore::new());
    store.save(&session).await.unwrap();

    let guard = ResumeGuard::with_default_ttl(store, engine);
    let route = guard.enter(fixed_now()).await.unwrap().route();
    assert_eq!(
        route,
        Route::ErrorOrBlocked {
            allow_retry: false,
            message: "Your session was blocked".to_string()
        }
    );
}
