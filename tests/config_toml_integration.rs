use quizflow::FlowConfig;
use quizflow::validation::SimulationPolicy;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_config_serialization_roundtrip() {
    let original_config = FlowConfig::default();

    let toml_str = original_config
        .to_toml_string()
        .expect("Should be able to serialize config to TOML");

    assert!(!toml_str.is_empty(), "TOML string should not be empty");
    assert!(toml_str.contains("max_attempts"), "Should contain max_attempts field");
    assert!(toml_str.contains("[storage]"), "Should contain storage table");

    let deserialized_config =
        FlowConfig::from_toml_str(&toml_str).expect("Should be able to deserialize TOML string");

    assert_eq!(original_config, deserialized_config);
}

#[test]
fn test_config_file_operations() {
    let mut original_config = FlowConfig::default();
    original_config.max_attempts = 5;
    original_config.simulation.policy = SimulationPolicy::AnswerKey;

    let temp_file = NamedTempFile::new().expect("Should be able to create temporary file");
    let temp_path = temp_file.path();

    original_config
        .to_toml_file(temp_path)
        .expect("Should be able to save config to file");

    let loaded_config =
        FlowConfig::from_toml_file(temp_path).expect("Should be able to load config from file");

    assert_eq!(original_config, loaded_config);
    assert_eq!(loaded_config.engine().max_attempts(), 5);
}

#[test]
fn test_partial_config_uses_defaults() {
    let toml_content = r#"
max_attempts = 2

[simulation]
policy = "answer_key"

[storage]
state_dir = "/var/lib/quizflow"
"#;

    let config = FlowConfig::from_toml_str(toml_content).expect("Partial config should parse");

    assert_eq!(config.max_attempts, 2);
    assert_eq!(config.session_ttl_hours, 24);
    assert_eq!(config.decision.timeout_secs, 10);
    assert_eq!(config.simulation.delay_secs, 3);
    assert_eq!(config.simulation.policy, SimulationPolicy::AnswerKey);
    assert_eq!(config.storage.state_dir, PathBuf::from("/var/lib/quizflow"));
    assert!(config.storage.checksum_validation);
    assert!(config.storage.preserve_corrupted);
}

#[test]
fn test_empty_config_is_default() {
    let config = FlowConfig::from_toml_str("").expect("Empty config should parse");
    assert_eq!(config, FlowConfig::default());
    assert_eq!(config.session_ttl(), chrono::Duration::hours(24));
}

#[test]
fn test_invalid_config_rejected() {
    assert!(FlowConfig::from_toml_str("max_attempts = \"three\"").is_err());
    assert!(FlowConfig::from_toml_str("[simulation]\npolicy = \"coin_flip\"").is_err());
    assert!(FlowConfig::from_toml_file("/definitely/not/here/quizflow.toml").is_err());
}
