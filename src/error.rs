//! Application error types for the approval engine.
//!
//! These errors are serializable so the HTTP layer can hand a structured
//! JSON object back to callers.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by engine operations.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Malformed or missing input (bad status, empty reviewer list).
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// No caller identity was supplied.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Caller is known but may not touch the resource.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Duplicate decision under the single-decision uniqueness rule.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// External dependency (email transport) failed.
    #[error("Dependency error: {message}")]
    Dependency {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dependency: Option<String>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.to_string()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a dependency error.
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
            dependency: None,
        }
    }

    /// Create a dependency error naming the failing collaborator.
    pub fn dependency_named(message: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
            dependency: Some(dependency.into()),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_ARGUMENT",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Dependency { .. } => "DEPENDENCY",
            Self::Database { .. } => "DATABASE",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::dependency_named("Request timed out", "email")
        } else if err.is_connect() {
            Self::dependency_named("Failed to connect to email service", "email")
        } else {
            Self::dependency_named(err.to_string(), "email")
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = AppError::database("connection failed");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Database\""));
        assert!(json.contains("connection failed"));
    }

    #[test]
    fn test_not_found_with_id() {
        let err = AppError::not_found_with_id("Vote", 123);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"resource\":\"Vote\""));
        assert!(json.contains("\"id\":\"123\""));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AppError::invalid_input("bad status");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("field"));
    }

    #[test]
    fn test_display_impl() {
        let err = AppError::forbidden("not your vote");
        assert_eq!(format!("{}", err), "Forbidden: not your vote");
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn test_conflict_detection() {
        assert!(AppError::conflict("already reviewed").is_conflict());
        assert!(!AppError::internal("boom").is_conflict());
    }
}
