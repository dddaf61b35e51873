use crate::error::HubError;

#[test]
fn given_transport_errors_when_classified_then_retryable() {
    assert!(HubError::connect("refused").is_retryable());
    assert!(HubError::closed("eof").is_retryable());
    assert!(HubError::socket("reset").is_retryable());
}

/// **VALUE**: Verifies configuration problems are never retried.
///
/// **WHY THIS MATTERS**: Retrying a rejected token burns attempts and delays the
/// diagnostic the user needs.
#[test]
fn given_configuration_errors_when_classified_then_not_retryable() {
    assert!(!HubError::authentication("invalid").is_retryable());
    assert!(!HubError::missing_credentials("none").is_retryable());
    assert!(!HubError::configuration("bad host").is_retryable());
    assert!(!HubError::attempts_exhausted(3).is_retryable());
}

#[test]
fn given_error_when_displayed_then_includes_message_and_location() {
    let error = HubError::authentication("Invalid password");

    let text = error.to_string();

    assert!(text.starts_with("Authentication Error: Invalid password ["));
    assert!(text.contains("error.rs"));
    assert_eq!(error.error_category(), "authentication");
}
