// Unit tests for the data model

use super::*;

#[test]
fn test_terminal_states() {
    assert!(AutomationState::Completed.is_terminal());
    assert!(AutomationState::Failed.is_terminal());
    assert!(AutomationState::Cancelled.is_terminal());

    assert!(!AutomationState::Idle.is_terminal());
    assert!(!AutomationState::Launching.is_terminal());
    assert!(!AutomationState::AwaitingVerification.is_terminal());
    assert!(!AutomationState::AwaitingFinalConfirmation.is_terminal());
}

#[test]
fn test_forward_transitions() {
    use AutomationState::*;

    assert!(Idle.can_advance_to(Launching));
    assert!(Launching.can_advance_to(Connecting));
    assert!(Connecting.can_advance_to(FillingForm));
    assert!(FillingForm.can_advance_to(AwaitingVerification));
    assert!(FillingForm.can_advance_to(Uploading));
    assert!(Uploading.can_advance_to(AwaitingFinalConfirmation));
    assert!(AwaitingFinalConfirmation.can_advance_to(Completed));
}

#[test]
fn test_verification_cycle_is_reentrant() {
    use AutomationState::*;

    // The checkpoint sub-cycle may repeat: a task can pass through
    // verification during form filling and again during uploads
    assert!(FillingForm.can_advance_to(AwaitingVerification));
    assert!(AwaitingVerification.can_advance_to(Resuming));
    assert!(Resuming.can_advance_to(FillingForm));
    assert!(Resuming.can_advance_to(Uploading));
    assert!(Uploading.can_advance_to(AwaitingVerification));
}

#[test]
fn test_invalid_transitions() {
    use AutomationState::*;

    // No skipping ahead or moving backward
    assert!(!Idle.can_advance_to(FillingForm));
    assert!(!Connecting.can_advance_to(Launching));
    assert!(!FillingForm.can_advance_to(Completed));
    assert!(!AwaitingVerification.can_advance_to(FillingForm));

    // Terminal states accept nothing
    assert!(!Completed.can_advance_to(Failed));
    assert!(!Cancelled.can_advance_to(Launching));
    assert!(!Failed.can_advance_to(Cancelled));
}

#[test]
fn test_failure_reachable_from_any_live_state() {
    use AutomationState::*;

    for state in [
        Idle,
        Launching,
        Connecting,
        FillingForm,
        AwaitingVerification,
        Resuming,
        Uploading,
        AwaitingFinalConfirmation,
    ] {
        assert!(state.can_advance_to(Failed), "{state} -> Failed");
        assert!(state.can_advance_to(Cancelled), "{state} -> Cancelled");
    }
}

#[test]
fn test_status_serializes_camel_case() {
    let status = AutomationStatus {
        state: AutomationState::FillingForm,
        current_step: Some("fill email".to_string()),
        progress: Some(42.0),
        error: None,
        started_at: None,
    };

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "FillingForm");
    assert_eq!(json["currentStep"], "fill email");
    assert_eq!(json["progress"], 42.0);
    assert!(json["error"].is_null());
    assert!(json.get("current_step").is_none());
}

#[test]
fn test_connection_strategy_parsing() {
    use std::str::FromStr;

    assert_eq!(
        ConnectionStrategy::from_str("attach").unwrap(),
        ConnectionStrategy::AttachExisting
    );
    assert_eq!(
        ConnectionStrategy::from_str("profile").unwrap(),
        ConnectionStrategy::PersistentProfile
    );
    assert_eq!(
        ConnectionStrategy::from_str("EPHEMERAL").unwrap(),
        ConnectionStrategy::Ephemeral
    );
    assert!(ConnectionStrategy::from_str("webdriver").is_err());
}

#[test]
fn test_connection_strategy_preference_order() {
    assert_eq!(
        ConnectionStrategy::PREFERENCE_ORDER,
        [
            ConnectionStrategy::AttachExisting,
            ConnectionStrategy::PersistentProfile,
            ConnectionStrategy::Ephemeral,
        ]
    );
}

#[test]
fn test_upload_report_winning_attempt() {
    let report = UploadReport {
        attempts: vec![
            UploadAttempt {
                strategy: "set-on-hidden-input".to_string(),
                target: "id card documents".to_string(),
                files_attempted: 2,
                succeeded: false,
                evidence_count: 0,
            },
            UploadAttempt {
                strategy: "intercept-file-chooser".to_string(),
                target: "id card documents".to_string(),
                files_attempted: 2,
                succeeded: true,
                evidence_count: 2,
            },
        ],
    };

    let winner = report.winning_attempt().unwrap();
    assert_eq!(winner.strategy, "intercept-file-chooser");
    assert_eq!(winner.evidence_count, 2);
}

#[test]
fn test_profile_snapshot_deserializes_camel_case() {
    let profile: ProfileSnapshot = serde_json::from_str(
        r#"{
            "name": "张三",
            "phone": "13800000000",
            "email": "zhangsan@example.com",
            "idCardNumber": "110101199001011234",
            "idCardFiles": ["profile/id_card/front_1700000000000.png"]
        }"#,
    )
    .unwrap();

    assert_eq!(profile.id_card_number, "110101199001011234");
    assert_eq!(profile.id_card_files.len(), 1);

    // File lists are optional in stored records
    let bare: ProfileSnapshot = serde_json::from_str(
        r#"{"name": "a", "phone": "b", "email": "c", "idCardNumber": "d"}"#,
    )
    .unwrap();
    assert!(bare.id_card_files.is_empty());
}
