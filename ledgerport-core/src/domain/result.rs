//! Result and error types for the core library

use thiserror::Error;

use crate::domain::mapping::MappingIssue;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed file content; the session stays where it is so the user can retry
    #[error("Parse error: {0}")]
    Parse(String),

    /// Fatal to one export attempt
    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Mapping error: {}", join_issues(.0))]
    Mapping(Vec<MappingIssue>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn join_issues(issues: &[MappingIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a serialize error
    pub fn serialize(msg: impl Into<String>) -> Self {
        Self::Serialize(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_lists_every_issue() {
        let err = Error::Mapping(vec![
            MappingIssue::RequiredTargetUnmapped("grand_total".to_string()),
            MappingIssue::DuplicateTarget("order_number".to_string()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("\"grand_total\" is not mapped"));
        assert!(msg.contains("\"order_number\" is mapped multiple times"));
    }

    #[test]
    fn test_constructors() {
        assert!(Error::parse("bad").to_string().starts_with("Parse error"));
        assert!(matches!(Error::serialize("x"), Error::Serialize(_)));
        assert!(matches!(Error::not_found("x"), Error::NotFound(_)));
    }
}
