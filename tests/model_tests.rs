use rust_lro::{LroError, OperationStatus, PollResponse, Poller, PollerConfig};
use std::str::FromStr;
use std::time::Duration;
mod common;
use common::ScriptedOperation;

#[test]
fn only_terminal_statuses_are_complete() {
    assert!(!OperationStatus::NotStarted.is_complete());
    assert!(!OperationStatus::InProgress.is_complete());
    assert!(OperationStatus::Succeeded.is_complete());
    assert!(OperationStatus::Failed.is_complete());
    assert!(OperationStatus::UserCancelled.is_complete());
}

#[test]
fn status_names_parse_and_print() {
    assert_eq!(OperationStatus::UserCancelled.to_string(), "USER_CANCELLED");
    assert_eq!(OperationStatus::from_str("in_progress").unwrap(), OperationStatus::InProgress);
    assert_eq!(" SUCCEEDED ".parse::<OperationStatus>().unwrap(), OperationStatus::Succeeded);
    assert!(matches!(
        "RUNNING".parse::<OperationStatus>(),
        Err(LroError::InvalidArgument(_))
    ));
}

#[test]
fn poll_response_serializes_with_wire_names() {
    let response = PollResponse::new(OperationStatus::InProgress, "op-1".to_string())
        .with_retry_after(Duration::from_secs(2))
        .with_property("percent", 40);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "status": "IN_PROGRESS",
            "value": "op-1",
            "retry_after_ms": 2000,
            "properties": { "percent": 40 }
        })
    );

    let back: PollResponse<String> =
        serde_json::from_str(r#"{"status":"FAILED","value":"op-1"}"#).unwrap();
    assert_eq!(back.status(), OperationStatus::Failed);
    assert_eq!(back.retry_after_ms(), None);
    assert!(back.properties().is_empty());
}

#[test]
fn config_defaults_and_validation() {
    let config = PollerConfig::default();
    assert_eq!(config.default_poll_interval(), Duration::from_secs(10));
    assert!(config.validate().is_ok());

    let err = PollerConfig::builder()
        .default_poll_interval(Duration::ZERO)
        .build()
        .unwrap_err();
    assert!(matches!(err, LroError::InvalidConfig(_)), "{err:?}");

    let err = PollerConfig::builder()
        .default_poll_interval(Duration::from_micros(200))
        .build()
        .unwrap_err();
    assert!(matches!(err, LroError::InvalidConfig(_)), "{err:?}");
}

#[test]
fn config_loads_from_json_with_defaults() {
    let config: PollerConfig = serde_json::from_str(r#"{"default_poll_interval_ms": 2500}"#).unwrap();
    assert_eq!(config.default_poll_interval(), Duration::from_millis(2_500));
    assert_eq!(
        config.activation_retry_delay_ms,
        PollerConfig::DEFAULT_ACTIVATION_RETRY_DELAY_MS
    );
}

#[test]
fn poller_rejects_invalid_config() {
    let config = PollerConfig {
        default_poll_interval_ms: 0,
        ..PollerConfig::default()
    };
    let err = Poller::with_config(ScriptedOperation::statuses(&[]), config).err().unwrap();
    assert!(matches!(err, LroError::InvalidConfig(_)), "{err:?}");
}

#[test]
fn retryable_errors_are_flagged() {
    assert!(LroError::Timeout(Duration::from_secs(1)).is_retryable());
    assert!(!LroError::InvalidArgument("x".into()).is_retryable());
    assert!(!LroError::CancelRequiresPollResponse.is_retryable());
}
