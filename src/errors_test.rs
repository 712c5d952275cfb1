use super::*;

#[test]
fn test_exit_codes() {
    assert_eq!(AutomationError::Launch("no driver".into()).exit_code(), 4);
    assert_eq!(AutomationError::ElementNotFound("#PIN".into()).exit_code(), 2);
    assert_eq!(
        AutomationError::ElementNotInteractable("#UploadButton".into()).exit_code(),
        3
    );
    assert_eq!(
        AutomationError::TaskNotDetected {
            high_water_mark: TaskId(12),
            waited: Duration::from_secs(180),
        }
        .exit_code(),
        5
    );
    assert_eq!(AutomationError::Extraction("bad xref".into()).exit_code(), 7);
}

#[test]
fn test_login_error_wraps_cause() {
    let err = AutomationError::login(
        "wms",
        AutomationError::ElementNotFound("id=page-container".into()),
    );
    assert_eq!(err.exit_code(), 6);
    let message = err.to_string();
    assert!(message.contains("wms"));
    assert!(message.contains("page-container"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_only_refresh_timeout_is_soft() {
    assert!(!AutomationError::PageRefreshTimeout(Duration::from_secs(20)).is_fatal());
    assert!(AutomationError::ArtifactNotReady {
        task_id: TaskId(13),
        waited: Duration::from_secs(300),
    }
    .is_fatal());
    assert!(AutomationError::Launch("x".into()).is_fatal());
}

#[test]
fn test_exit_code_for_anyhow() {
    let err: anyhow::Error = AutomationError::ElementNotFound("x".into()).into();
    assert_eq!(exit_code_for(&err), 2);

    let plain = anyhow::anyhow!("config file unreadable");
    assert_eq!(exit_code_for(&plain), 1);
}

#[test]
fn test_task_not_detected_message() {
    let err = AutomationError::TaskNotDetected {
        high_water_mark: TaskId(12),
        waited: Duration::from_secs(3),
    };
    assert_eq!(err.to_string(), "No task newer than #12 appeared within 3s");
}
