//! Unified error type for httpcron using thiserror.
//!
//! Provides consistent error handling across the engine, repository and
//! control-plane layers.

use std::fmt;

use thiserror::Error;

/// The unified error type for httpcron operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid state transition: {entity_type} {id} is {current}, cannot {action}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        current: String,
        action: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Target {target_id} no longer exists")]
    TargetMissing { target_id: String },

    #[error("Shutdown in progress")]
    ShutdownInProgress,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A collection of field-level validation failures.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(Error::Validation(self))
        }
    }
}

/// A single field validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error {
    pub fn database(message: impl Into<String>) -> Self {
        Error::Database {
            message: message.into(),
            source: None,
        }
    }

    pub fn database_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add("validation", message);
        Error::Validation(errors)
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_transition(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        current: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Error::InvalidTransition {
            entity_type: entity_type.into(),
            id: id.into(),
            current: current.into(),
            action: action.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    pub fn target_missing(target_id: impl Into<String>) -> Self {
        Error::TargetMissing {
            target_id: target_id.into(),
        }
    }

    /// HTTP status code this error maps to at the control-plane boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound { .. } | Error::TargetMissing { .. } => 404,
            Error::Validation(_) | Error::InvalidInput { .. } | Error::InvalidTransition { .. } => {
                400
            }
            Error::ShutdownInProgress => 503,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Database { .. } => "DATABASE_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::InvalidInput { .. } => "INVALID_INPUT",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::Internal { .. } => "INTERNAL_ERROR",
            Error::TargetMissing { .. } => "TARGET_MISSING",
            Error::ShutdownInProgress => "SHUTDOWN",
            Error::Other(_) => "UNKNOWN_ERROR",
        }
    }
}

/// Result type alias for httpcron operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::not_found("Target", "123").status_code(), 404);
        assert_eq!(Error::validation("bad url").status_code(), 400);
        assert_eq!(
            Error::invalid_transition("Schedule", "1", "paused", "pause").status_code(),
            400
        );
        assert_eq!(Error::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_validation_errors() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("url", "must start with http:// or https://");
        assert!(!errors.is_empty());
        assert_eq!(errors.errors.len(), 1);
    }
}
