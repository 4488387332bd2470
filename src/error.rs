//! Error types for the trading core

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors produced by the trading core
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Risk limit: {0}")]
    RiskLimit(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
