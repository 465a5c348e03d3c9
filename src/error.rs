use std::path::PathBuf;

/// Errors raised by the step-flow engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// The submitted answer can't be recorded; the user is asked again.
    #[error("invalid answer for step '{step_id}': {reason}")]
    Validation { step_id: String, reason: String },

    /// The caller moved past the end of the flow.
    #[error("step index {index} is out of range for a flow of {len} steps")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid step definitions: {0}")]
    InvalidDefinition(String),
}

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("Please enter a valid {0}-digit code")]
    InvalidFormat(usize),

    #[error("The code is incorrect")]
    Mismatch,

    #[error("A new code can be requested in {remaining} sec")]
    Cooldown { remaining: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read quiz file {path}: {source}")]
    QuizFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Quiz file {path} is not usable: {message}")]
    QuizDefinition { path: PathBuf, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FlagStoreError {
    #[error("flag store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("flag store is corrupted: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("ChatGPT request failed: {0}")]
    ChatGpt(#[from] chatgpt::err::Error),

    #[error("tutor has nothing to reply to")]
    EmptyMessage,
}
