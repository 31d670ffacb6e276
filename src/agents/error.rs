//! Error types for the agent toolkit

use thiserror::Error;

/// Errors raised by the runner and the binary edge
#[derive(Debug, Error)]
pub enum AgentError {
    /// Prompt or settings configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Completion service error
    #[error("Model client error: {0}")]
    ModelClient(#[from] ModelClientError),

    /// Tool bridge error
    #[error("Tool bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Errors raised while building prompt configurations or validating settings.
///
/// These fail fast and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable name does not match `[A-Za-z0-9_]+`
    #[error("Invalid variable name '{0}'. Only alphanumeric characters and underscores are allowed.")]
    InvalidVariableName(String),

    /// One or more template placeholders have no bound value
    #[error("Missing values for placeholders: {}", .0.join(", "))]
    MissingPlaceholders(Vec<String>),

    /// A settings value is out of range or inconsistent
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Errors raised by a completion service
#[derive(Debug, Error)]
pub enum ModelClientError {
    /// Provider returned an error status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Missing or unusable credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream payload could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for ModelClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelClientError::Timeout
        } else if err.is_decode() {
            ModelClientError::Parse(err.to_string())
        } else if err.is_connect() {
            ModelClientError::Network(format!("Connection error: {}", err))
        } else {
            ModelClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ModelClientError {
    fn from(err: serde_json::Error) -> Self {
        ModelClientError::Parse(err.to_string())
    }
}

/// Errors raised by a tool bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The tool server answered with a JSON-RPC error
    #[error("RPC error [{code}]: {message}")]
    Rpc { code: i64, message: String },

    /// Connection, HTTP or child process failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected response shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Call exceeded its deadline
    #[error("Tool call timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            BridgeError::Transport(format!("Connection error: {}", err))
        } else {
            BridgeError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Protocol(err.to_string())
    }
}

/// Result type alias for runner operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for completion service operations
pub type ModelClientResult<T> = Result<T, ModelClientError>;

/// Result type alias for tool bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
