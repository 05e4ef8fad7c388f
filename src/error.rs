use std::io;
use thiserror::Error;

/// Platform error code returned when the token is not a member of the channel.
pub const NOT_IN_CHANNEL: &str = "not_in_channel";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("SLACK_TOKEN environment variable not set and profile has no token")]
    MissingToken,

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid time format: {0}")]
    InvalidDate(String),

    #[error("Slack API error on {method}: {code}")]
    SlackApi { method: String, code: String },

    #[error("failed to call {method}: {message}")]
    SlackClient { method: String, message: String },

    #[error("{method} request failed with status code {status}: {body}")]
    HttpStatus {
        method: String,
        status: u16,
        body: String,
    },

    #[error("failed to send {method} request: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid API URL {0}")]
    InvalidUrl(String),

    #[error("channel \"{0}\" not found after refreshing cache")]
    ChannelNotFound(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("no channel given and the profile has no default channel")]
    MissingChannel,

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("failed to read file at {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file at {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonSerialize(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(String),
}

impl AppError {
    /// Wrap this error with a description of the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        AppError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The platform error code, looking through any context wrappers.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            AppError::SlackApi { code, .. } => Some(code),
            AppError::Context { source, .. } => source.api_code(),
            _ => None,
        }
    }

    pub fn is_not_in_channel(&self) -> bool {
        self.api_code() == Some(NOT_IN_CHANNEL)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
