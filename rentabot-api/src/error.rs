//! Error types for the Rent-A-Bot API layer.
//!
//! Engine errors are translated to [`ApiError`] responses carrying an
//! [`ErrorCode`], a message and flattened context keys, serialized as JSON
//! with the HTTP status of the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rentabot_core::{EngineError, ReservationError, ResourceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses. Each maps to one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No resource matches the given id, name or tags
    ResourceNotFound,

    /// Lock attempted on a held resource
    ResourceAlreadyLocked,

    /// Unlock or extend attempted on a free resource
    ResourceAlreadyUnlocked,

    /// Presented token does not match the current lock token
    InvalidLockToken,

    /// TTL exceeds the resource's max_lock_duration
    InvalidTtl,

    /// Batch lock or reservation cannot find the requested quantity
    InsufficientResources,

    /// Reservation tag set is empty
    InvalidReservationTags,

    /// Reservation id is unknown
    ReservationNotFound,

    /// Claim attempted on a pending reservation
    ReservationNotFulfilled,

    /// Claim attempted after the claim window closed
    ReservationClaimExpired,

    /// Cancel attempted on a fulfilled or claimed reservation
    ReservationCannotBeCancelled,

    /// Malformed or missing request input
    InvalidInput,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ResourceNotFound | ErrorCode::ReservationNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ResourceAlreadyLocked
            | ErrorCode::ResourceAlreadyUnlocked
            | ErrorCode::InvalidLockToken => StatusCode::FORBIDDEN,

            ErrorCode::InvalidTtl
            | ErrorCode::InvalidReservationTags
            | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::InsufficientResources
            | ErrorCode::ReservationNotFulfilled
            | ErrorCode::ReservationCannotBeCancelled => StatusCode::CONFLICT,

            ErrorCode::ReservationClaimExpired => StatusCode::GONE,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default human-readable message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ResourceNotFound => "Resource not found",
            ErrorCode::ResourceAlreadyLocked => {
                "Cannot lock the requested resource, resource(s) already locked"
            }
            ErrorCode::ResourceAlreadyUnlocked => "Resource is already unlocked",
            ErrorCode::InvalidLockToken => "The lock token is not valid",
            ErrorCode::InvalidTtl => "Requested TTL exceeds the maximum lock duration",
            ErrorCode::InsufficientResources => "Not enough resources are available",
            ErrorCode::InvalidReservationTags => "Reservation tags must not be empty",
            ErrorCode::ReservationNotFound => "Reservation not found",
            ErrorCode::ReservationNotFulfilled => "Reservation is not fulfilled yet",
            ErrorCode::ReservationClaimExpired => "The claim window for this reservation has expired",
            ErrorCode::ReservationCannotBeCancelled => "This reservation can no longer be cancelled",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::InternalError => "Internal server error",
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
/// Serializes as `{code, message, ...context keys...}` with the context
/// flattened at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Context keys (resource id, tags, ...), flattened into the payload
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: serde_json::Map::new(),
        }
    }

    /// Create a new API error from a code, using its default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Attach one context key to the error payload.
    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create an InvalidInput error for a missing field.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an InternalError.
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

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// ENGINE ERROR TRANSLATION
// ============================================================================

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::Resource(resource) => match resource {
                ResourceError::NotFound { selector } => {
                    ApiError::new(ErrorCode::ResourceNotFound, message)
                        .with_context("selector", json!(selector))
                }
                ResourceError::AlreadyLocked { selector } => {
                    ApiError::new(ErrorCode::ResourceAlreadyLocked, message)
                        .with_context("selector", json!(selector))
                }
                ResourceError::AlreadyUnlocked { id } => {
                    ApiError::new(ErrorCode::ResourceAlreadyUnlocked, message)
                        .with_context("resource_id", json!(id.0))
                }
                ResourceError::InvalidLockToken { id } => {
                    ApiError::new(ErrorCode::InvalidLockToken, message)
                        .with_context("resource_id", json!(id.0))
                }
                ResourceError::InvalidTtl { id, requested, max } => {
                    ApiError::new(ErrorCode::InvalidTtl, message)
                        .with_context("resource_id", json!(id.0))
                        .with_context("requested_ttl", json!(requested))
                        .with_context("max_lock_duration", json!(max))
                }
                ResourceError::Insufficient {
                    tags,
                    needed,
                    available,
                } => ApiError::new(ErrorCode::InsufficientResources, message)
                    .with_context("tags", json!(tags))
                    .with_context("needed", json!(needed))
                    .with_context("available", json!(available)),
            },
            EngineError::Reservation(reservation) => match reservation {
                ReservationError::EmptyTags => {
                    ApiError::new(ErrorCode::InvalidReservationTags, message)
                }
                ReservationError::InvalidQuantity => ApiError::new(ErrorCode::InvalidInput, message),
                ReservationError::IncompatibleTtl { needed, found, ttl } => {
                    ApiError::new(ErrorCode::InvalidTtl, message)
                        .with_context("needed", json!(needed))
                        .with_context("found", json!(found))
                        .with_context("requested_ttl", json!(ttl))
                }
                ReservationError::NotFound { id } => {
                    ApiError::new(ErrorCode::ReservationNotFound, message)
                        .with_context("reservation_id", json!(id.0))
                }
                ReservationError::NotFulfilled { id } => {
                    ApiError::new(ErrorCode::ReservationNotFulfilled, message)
                        .with_context("reservation_id", json!(id.0))
                }
                ReservationError::ClaimExpired { id } => {
                    ApiError::new(ErrorCode::ReservationClaimExpired, message)
                        .with_context("reservation_id", json!(id.0))
                }
                ReservationError::CannotBeCancelled { id, status } => {
                    ApiError::new(ErrorCode::ReservationCannotBeCancelled, message)
                        .with_context("reservation_id", json!(id.0))
                        .with_context("status", json!(status.to_string()))
                }
            },
            // Descriptor problems are startup failures, never request errors.
            EngineError::Descriptor(_) => ApiError::internal_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentabot_core::{ReservationId, ResourceId};

    #[test]
    fn status_mapping_follows_the_wire_contract() {
        assert_eq!(ErrorCode::ResourceNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::ResourceAlreadyLocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ResourceAlreadyUnlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::InvalidLockToken.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::InvalidTtl.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InsufficientResources.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InvalidReservationTags.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ReservationNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::ReservationNotFulfilled.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::ReservationClaimExpired.status_code(), StatusCode::GONE);
        assert_eq!(
            ErrorCode::ReservationCannotBeCancelled.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn context_keys_flatten_into_the_payload() -> Result<(), serde_json::Error> {
        let error = ApiError::from_code(ErrorCode::ResourceAlreadyUnlocked)
            .with_context("resource_id", json!(7));
        let payload = serde_json::to_value(&error)?;

        assert_eq!(payload["code"], "RESOURCE_ALREADY_UNLOCKED");
        assert_eq!(payload["resource_id"], 7);
        assert!(payload["message"].is_string());
        Ok(())
    }

    #[test]
    fn engine_errors_translate_with_context() {
        let error: ApiError = EngineError::from(ResourceError::InvalidTtl {
            id: ResourceId(3),
            requested: 10_000,
            max: 7_200,
        })
        .into();
        assert_eq!(error.code, ErrorCode::InvalidTtl);
        assert_eq!(error.context["resource_id"], json!(3));
        assert_eq!(error.context["max_lock_duration"], json!(7_200));

        let error: ApiError = EngineError::from(ReservationError::ClaimExpired {
            id: ReservationId::from("res_x"),
        })
        .into();
        assert_eq!(error.code, ErrorCode::ReservationClaimExpired);
        assert_eq!(error.status_code(), StatusCode::GONE);
    }
}
