use crate::error::*;
use tracing::{error, warn};

/// Logging and presentation helpers shared by the ingestion loop and the
/// dashboard.
pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    /// Transient failures that are expected to clear on their own.
    fn is_retryable(&self) -> bool;
    /// Problems caused by what the user typed rather than by the system.
    fn is_user_error(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> &'static str;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        if let CoreError::Database(DatabaseError::Sql(e)) = self {
            error!("SQL error details: {:?}", e);
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::RequestFailed { status_code, .. } => {
                status_code.map_or(true, |code| code >= 500)
            }
            _ => false,
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_) | CoreError::InvalidInput { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Validation(e) => e.user_friendly_message(),
            CoreError::Network(_) => "Cannot reach Reddit. Check the network connection.".to_string(),
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Io(e) => format!("File access failed: {}", e),
            _ => "Something went wrong. Details are in the log.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::Database(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Validation(e) => e.error_code(),
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::RequestFailed { .. } => "REQUEST_FAILED",
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedditApiError::RateLimitExceeded { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::ServerError { .. }
                | RedditApiError::InvalidToken
        )
    }

    fn is_user_error(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit rejected the client credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => {
                format!("Reddit is rate limiting requests for {}s.", retry_after)
            }
            RedditApiError::Forbidden { resource } => format!("Reddit denied access to {}.", resource),
            _ => "Reddit is not responding normally, the stream will reconnect.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked | DatabaseError::ConnectionFailed { .. }
        )
    }

    fn is_user_error(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { reason } => {
                format!("Cannot open the content store: {}", reason)
            }
            DatabaseError::DatabaseLocked => {
                "The content store is busy, try again shortly.".to_string()
            }
            DatabaseError::MigrationFailed { migration } => {
                format!("Schema upgrade failed: {}", migration)
            }
            DatabaseError::Sql(_) => "Content store query failed.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED",
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED",
            DatabaseError::DatabaseLocked => "DB_LOCKED",
            DatabaseError::Sql(_) => "DB_SQL_ERROR",
        }
    }
}

impl ErrorExt for ValidationError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn is_user_error(&self) -> bool {
        true
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ValidationError::EmptyKeyword => "Keyword cannot be empty.".to_string(),
            ValidationError::DuplicateKeyword { keyword } => {
                format!("Keyword '{}' already exists.", keyword)
            }
            ValidationError::UnknownKeyword { keyword } => {
                format!("Keyword '{}' no longer exists.", keyword)
            }
            ValidationError::InvalidDate { input } => {
                format!("'{}' is not a valid date. Use YYYY-MM-DD.", input)
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ValidationError::EmptyKeyword => "VALIDATION_EMPTY_KEYWORD",
            ValidationError::DuplicateKeyword { .. } => "VALIDATION_DUPLICATE_KEYWORD",
            ValidationError::UnknownKeyword { .. } => "VALIDATION_UNKNOWN_KEYWORD",
            ValidationError::InvalidDate { .. } => "VALIDATION_INVALID_DATE",
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn is_user_error(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::MissingField { field } => {
                format!("Configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, value } => {
                format!("Configuration field '{}' cannot be '{}'.", field, value)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => {
                format!("Set {} before starting.", var_name)
            }
            ConfigError::InvalidIdentitySecret => {
                "The client identity file does not match the configured secret.".to_string()
            }
            ConfigError::Parse(_) => "The configuration file is not valid TOML.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR",
            ConfigError::InvalidIdentitySecret => "CONFIG_INVALID_IDENTITY_SECRET",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }
}
