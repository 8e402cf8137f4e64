//! Error Types for the Arena API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Conversions from the domain and storage error types
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use arena_core::{ArenaError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// A referenced agent is locked by another battle
    AgentNotUnlocked,

    /// Opponents do not satisfy the green agent's participant requirements
    RequirementMismatch,

    /// Operation is not allowed in the battle's current state
    InvalidState,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested agent does not exist
    AgentNotFound,

    /// Requested battle does not exist
    BattleNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Entity with the same identifier already exists
    EntityAlreadyExists,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Document store operation failed
    StorageError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::AgentNotUnlocked
            | ErrorCode::RequirementMismatch
            | ErrorCode::InvalidState => StatusCode::BAD_REQUEST,

            ErrorCode::AgentNotFound | ErrorCode::BattleNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists => StatusCode::CONFLICT,

            ErrorCode::InternalError | ErrorCode::StorageError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::AgentNotUnlocked => "Agent is not unlocked",
            ErrorCode::RequirementMismatch => "Participant requirements not met",
            ErrorCode::InvalidState => "Operation not allowed in the current battle state",
            ErrorCode::AgentNotFound => "Agent not found",
            ErrorCode::BattleNotFound => "Battle not found",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage operation failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
///
/// This type is returned by all API endpoints when an error occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn agent_not_found(agent_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::AgentNotFound,
            format!("Agent {} not found", agent_id),
        )
    }

    pub fn battle_not_found(battle_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::BattleNotFound,
            format!("Battle {} not found", battle_id),
        )
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ArenaError> for ApiError {
    fn from(err: ArenaError) -> Self {
        match err {
            ArenaError::AgentNotFound { agent_id } => ApiError::agent_not_found(agent_id),
            ArenaError::BattleNotFound { battle_id } => ApiError::battle_not_found(battle_id),
            ArenaError::AgentNotUnlocked { .. } => {
                ApiError::new(ErrorCode::AgentNotUnlocked, err.to_string())
            }
            ArenaError::RequirementMismatch { .. } => {
                ApiError::new(ErrorCode::RequirementMismatch, err.to_string())
            }
            ArenaError::InvalidStateTransition { from, to, .. } => {
                ApiError::invalid_state(err.to_string()).with_details(serde_json::json!({
                    "state": from,
                    "requested": to,
                }))
            }
            ArenaError::Storage(storage) => storage.into(),
            ArenaError::ResetFailed { .. }
            | ArenaError::ReadyTimeout { .. }
            | ArenaError::NotifyFailed { .. }
            | ArenaError::KickoffFailed { .. } => {
                tracing::error!(error = %err, "Lifecycle error reached the API boundary");
                ApiError::internal_error(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists { .. } => {
                ApiError::new(ErrorCode::EntityAlreadyExists, err.to_string())
            }
            other => {
                // Keep internal storage detail out of the response body
                tracing::error!(error = %other, "Storage error");
                ApiError::from_code(ErrorCode::StorageError)
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::BattleState;
    use uuid::Uuid;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AgentNotUnlocked.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidState.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::BattleNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::EntityAlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::StorageError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_arena_error_mapping() {
        let id = Uuid::now_v7();

        let err: ApiError = ArenaError::AgentNotFound { agent_id: id }.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains(&id.to_string()));

        let err: ApiError = ArenaError::AgentNotUnlocked { agent_id: id }.into();
        assert_eq!(err.code, ErrorCode::AgentNotUnlocked);

        let err: ApiError = ArenaError::RequirementMismatch {
            reason: "required role 'red' is not filled".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.message.contains("red"));

        let err: ApiError = ArenaError::InvalidStateTransition {
            battle_id: id,
            from: BattleState::Finished,
            to: BattleState::Running,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert_eq!(
            err.details,
            Some(serde_json::json!({"state": "finished", "requested": "running"}))
        );
    }

    #[test]
    fn test_storage_error_hides_detail() {
        let err: ApiError = StorageError::Serialization {
            reason: "missing field `state`".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::StorageError);
        assert!(!err.message.contains("state"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::battle_not_found("abc");
        let json = serde_json::to_string(&err)?;
        assert!(json.contains("BATTLE_NOT_FOUND"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
