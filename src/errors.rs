use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Course is not available for purchase",
    "request_id": "5f0c6a7e-3b9f-4f47-9d8e-2f1f7c0f9a11"
}))]
pub struct ErrorResponse {
    /// Short human-readable message
    #[schema(example = "Course is not available for purchase")]
    pub error: String,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Course is not available for purchase")]
    NotPurchasable,

    #[error("Free course cannot be paid for")]
    FreeCourseNotPayable,

    #[error("Course requires payment")]
    PaymentRequired,

    #[error("Already enrolled")]
    AlreadyEnrolled,

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Enrollment failed: {0}")]
    EnrollmentFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_values()
            .flat_map(|errs| errs.iter())
            .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid request body".to_string());
        ServiceError::InvalidRequest(message)
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_)
            | Self::NotPurchasable
            | Self::FreeCourseNotPayable
            | Self::AlreadyEnrolled
            | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayError(_)
            | Self::EnrollmentFailed(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message suitable for HTTP responses.
    /// Upstream and storage details stay in the logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Authentication required".to_string(),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::NotFound(msg) => msg.clone(),
            Self::NotPurchasable => "Course is not available for purchase".to_string(),
            Self::FreeCourseNotPayable => {
                "This is a free course. Use direct enrollment.".to_string()
            }
            Self::PaymentRequired => "This course requires payment".to_string(),
            Self::AlreadyEnrolled => "Already enrolled in this course".to_string(),
            Self::InvalidSignature => "Invalid payment signature".to_string(),
            Self::GatewayError(_) => "Failed to create payment order".to_string(),
            Self::EnrollmentFailed(_) => "Failed to create enrollment".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    pub fn course_not_found() -> Self {
        ServiceError::NotFound("Course not found".to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.response_message(),
            request_id: current_request_id(),
        };

        (status, Json(body)).into_response()
    }
}
