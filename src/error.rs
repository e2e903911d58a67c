use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("SLACK_TOKEN environment variable not set")]
    MissingToken,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid year: {0}")]
    InvalidYear(i32),

    #[error("invalid time zone: {0}")]
    InvalidTimeZone(String),

    #[error("invalid Slack timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("gave up on channel {channel} after {attempts} rate limited attempts")]
    RetriesExhausted { channel: String, attempts: u32 },

    #[error("malformed history page for channel {channel}: {reason}")]
    MalformedPage { channel: String, reason: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("failed to post results: {0}")]
    Post(String),

    #[error("no post channel configured")]
    MissingPostChannel,

    #[error("failed to read file at {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialize(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of a single history page fetch.
///
/// Only `RateLimited` is retried by the walker; everything else ends the
/// channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("{0}")]
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_missing_token_display() {
        let err = AppError::MissingToken;
        assert_eq!(err.to_string(), "SLACK_TOKEN environment variable not set");
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_invalid_year_display() {
        let err = AppError::InvalidYear(-5);
        assert_eq!(err.to_string(), "invalid year: -5");
    }

    #[test]
    fn test_invalid_time_zone_display() {
        let err = AppError::InvalidTimeZone("Mars/Olympus".to_string());
        assert_eq!(err.to_string(), "invalid time zone: Mars/Olympus");
    }

    #[test]
    fn test_invalid_timestamp_display() {
        let err = AppError::InvalidTimestamp("abc".to_string());
        assert_eq!(err.to_string(), "invalid Slack timestamp: abc");
    }

    #[test]
    fn test_slack_api_display() {
        let err = AppError::SlackApi("invalid_auth".to_string());
        assert_eq!(err.to_string(), "Slack API error: invalid_auth");
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = AppError::RetriesExhausted {
            channel: "C123".to_string(),
            attempts: 4,
        };
        assert_eq!(
            err.to_string(),
            "gave up on channel C123 after 4 rate limited attempts"
        );
    }

    #[test]
    fn test_malformed_page_display() {
        let err = AppError::MalformedPage {
            channel: "C1".to_string(),
            reason: "empty page".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed history page for channel C1: empty page"
        );
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(err.to_string(), "rate limited");
        let err = FetchError::Fatal("invalid_auth".to_string());
        assert_eq!(err.to_string(), "invalid_auth");
    }

    #[test]
    fn test_post_display() {
        let err = AppError::Post("2 of 5 posts failed".to_string());
        assert_eq!(err.to_string(), "failed to post results: 2 of 5 posts failed");
    }

    #[test]
    fn test_read_file_display_and_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = AppError::ReadFile {
            path: "/path/to/settings.toml".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("/path/to/settings.toml"));
        assert!(err.to_string().contains("failed to read file"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_toml_parse_display() {
        let err = AppError::TomlParse("invalid toml".to_string());
        assert_eq!(err.to_string(), "TOML parse error: invalid toml");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
        assert_send_sync::<FetchError>();
    }
}
