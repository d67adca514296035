use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Request failed: {message}")]
    RequestFailed {
        message: String,
        status_code: Option<u16>,
    },
}

// SQLITE_BUSY and its extended codes.
const SQLITE_BUSY_CODES: [&str; 3] = ["5", "261", "517"];

impl From<sqlx::Error> for CoreError {
    fn from(error: sqlx::Error) -> Self {
        let busy = error
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| SQLITE_BUSY_CODES.iter().any(|busy| *busy == code));
        if busy {
            CoreError::Database(DatabaseError::DatabaseLocked)
        } else {
            CoreError::Database(DatabaseError::Sql(error))
        }
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(error: toml::de::Error) -> Self {
        CoreError::Config(ConfigError::Parse(error))
    }
}

/// Failures talking to the Reddit listing and token endpoints.
#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Access to {resource} is forbidden")]
    Forbidden { resource: String },

    #[error("Access token rejected")]
    InvalidToken,

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Unexpected listing payload: {details}")]
    InvalidResponse { details: String },

    #[error("Reddit returned server error {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open content store: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Schema migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Database is locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Rejected user input. These never change stored state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Keyword must not be empty")]
    EmptyKeyword,

    #[error("Keyword already exists: {keyword}")]
    DuplicateKeyword { keyword: String },

    #[error("Unknown keyword: {keyword}")]
    UnknownKeyword { keyword: String },

    #[error("Invalid date '{input}', expected YYYY-MM-DD")]
    InvalidDate { input: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Identity secret invalid or missing")]
    InvalidIdentitySecret,

    #[error("Cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
