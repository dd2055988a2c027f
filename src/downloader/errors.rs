// Error types for the yt-dlp backends

use std::fmt;

#[derive(Debug, Clone)]
pub enum BackendError {
    /// Network timeout while talking to the platform
    NetworkTimeout,

    /// The platform throttled or blocked the request (429, bot detection)
    RateLimited,

    /// yt-dlp not found on this system
    ToolNotFound(String),

    /// URL yt-dlp refused to handle
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    ParseError(String),

    /// Command execution failed
    ExecutionError(String),

    /// Unknown error with details
    Unknown(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkTimeout => write!(f, "Network timeout: the platform is not responding"),
            Self::RateLimited => write!(
                f,
                "The platform is throttling requests from this address; retry on a later cycle"
            ),
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            Self::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

// Classify raw yt-dlp stderr into the variant it most likely represents.
impl From<String> for BackendError {
    fn from(s: String) -> Self {
        if s.contains("timeout") || s.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if s.contains("429") || s.contains("bot") || s.contains("blocked") {
            return Self::RateLimited;
        }

        if s.contains("not found") || s.contains("No such file") || s.contains("command not found")
        {
            return Self::ToolNotFound(s);
        }

        if s.contains("parse") || s.contains("JSON") || s.contains("Invalid JSON") {
            return Self::ParseError(s);
        }

        if s.contains("Invalid URL") || s.contains("Unsupported URL") {
            return Self::InvalidUrl(s);
        }

        Self::Unknown(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        let err = BackendError::from("Connection timed out".to_string());
        assert!(matches!(err, BackendError::NetworkTimeout));
    }

    #[test]
    fn test_rate_limit_classification() {
        let err = BackendError::from("HTTP Error 429: Too Many Requests".to_string());
        assert!(matches!(err, BackendError::RateLimited));
    }

    #[test]
    fn test_tool_not_found_classification() {
        let err = BackendError::from("yt-dlp: command not found".to_string());
        assert!(matches!(err, BackendError::ToolNotFound(_)));
    }

    #[test]
    fn test_unsupported_url_classification() {
        let err = BackendError::from("ERROR: Unsupported URL: ftp://example".to_string());
        assert!(matches!(err, BackendError::InvalidUrl(_)));
    }

    #[test]
    fn test_unknown_classification() {
        let err = BackendError::from("something else entirely".to_string());
        assert!(matches!(err, BackendError::Unknown(_)));
    }
}
