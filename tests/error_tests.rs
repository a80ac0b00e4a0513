//! Tests for the error system.

use palaver::error::*;

#[test]
fn error_api_creation() {
    let err = PalaverError::api(404, "Not found");
    assert!(matches!(&err, PalaverError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "API error (status 404): Not found");
}

#[test]
fn error_helper_mappings_are_stable_for_major_variants() {
    struct Case {
        error: PalaverError,
        expected_category: ErrorCategory,
        expected_retryable: bool,
        expected_recovery: RecoverySuggestion,
    }

    let network_error = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        Case {
            error: PalaverError::api(401, "bad-key"),
            expected_category: ErrorCategory::Authentication,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckCredentials,
        },
        Case {
            error: PalaverError::api(429, "slow down"),
            expected_category: ErrorCategory::RateLimit,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: PalaverError::Network(network_error),
            expected_category: ErrorCategory::Network,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: PalaverError::Configuration("missing key".into()),
            expected_category: ErrorCategory::Configuration,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: PalaverError::InvalidInput("Unsupported content type".into()),
            expected_category: ErrorCategory::InvalidInput,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::FixRequest,
        },
        Case {
            error: PalaverError::Model("context window exceeded".into()),
            expected_category: ErrorCategory::Backend,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: PalaverError::persistence("put", "disk full"),
            expected_category: ErrorCategory::Persistence,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::CheckStorage,
        },
        Case {
            error: PalaverError::StepLimitExceeded { max_steps: 25 },
            expected_category: ErrorCategory::Limit,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::RaiseStepLimit,
        },
        Case {
            error: PalaverError::relay("agent-stream:t1", "closed"),
            expected_category: ErrorCategory::Relay,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: PalaverError::Serialization(serde_error),
            expected_category: ErrorCategory::Serialization,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
    ];

    for case in cases {
        let label = case.error.to_string();
        assert_eq!(case.error.category(), case.expected_category, "{label}");
        assert_eq!(case.error.is_retryable(), case.expected_retryable, "{label}");
        assert_eq!(case.error.recovery_suggestion(), case.expected_recovery, "{label}");
    }
}

#[test]
fn only_invalid_input_is_a_client_error() {
    assert!(ErrorCategory::InvalidInput.is_client_error());
    assert!(!ErrorCategory::Persistence.is_client_error());
    assert!(!ErrorCategory::Backend.is_client_error());
}

#[test]
fn category_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(ErrorCategory::ToolExecution).unwrap(),
        serde_json::json!("tool_execution")
    );
}
