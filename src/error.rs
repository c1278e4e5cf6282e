use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlackvError {
    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SlackvError>;

/// Compare two optional errors by their rendered message.
///
/// Used to collapse repeated identical connection failures into one log line.
pub fn error_equals(a: Option<&SlackvError>, b: Option<&SlackvError>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.to_string() == b.to_string(),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_equals_with_none() {
        let err = SlackvError::SlackApi("invalid_auth".to_string());
        assert!(!error_equals(Some(&err), None));
        assert!(!error_equals(None, Some(&err)));
        assert!(error_equals(None, None));
    }

    #[test]
    fn test_error_equals_same_message() {
        let a = SlackvError::Timeout("rtm.connect".to_string());
        let b = SlackvError::Timeout("rtm.connect".to_string());
        assert!(error_equals(Some(&a), Some(&b)));
    }

    #[test]
    fn test_error_equals_different_message() {
        let a = SlackvError::SlackApi("invalid_auth".to_string());
        let b = SlackvError::SlackApi("account_inactive".to_string());
        assert!(!error_equals(Some(&a), Some(&b)));

        // Same text under a different variant renders differently
        let c = SlackvError::WebSocket("invalid_auth".to_string());
        assert!(!error_equals(Some(&a), Some(&c)));
    }
}
