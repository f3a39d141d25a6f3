use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{parse_course_id, ValidatedJson};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::CommitOutcome;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreeEnrollmentRequest {
    #[validate(
        required(message = "courseId is required"),
        length(min = 1, message = "courseId is required")
    )]
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreeEnrollmentResponse {
    pub success: bool,
    pub message: String,
    pub already_enrolled: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentStatusResponse {
    pub enrolled: bool,
}

/// Enroll in a free course
#[utoipa::path(
    post,
    path = "/api/v1/enrollments/free",
    request_body = FreeEnrollmentRequest,
    responses(
        (status = 200, description = "Enrolled", body = FreeEnrollmentResponse),
        (status = 400, description = "Invalid request or course not available", body = crate::errors::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::errors::ErrorResponse),
        (status = 402, description = "Course requires payment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Course not found", body = crate::errors::ErrorResponse)
    ),
    security(("session" = [])),
    tag = "Enrollments"
)]
pub async fn enroll_free(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<FreeEnrollmentRequest>,
) -> Result<Json<FreeEnrollmentResponse>, ServiceError> {
    let course_id = parse_course_id(request.course_id.as_deref().unwrap_or_default())?;
    let outcome = state.enrollments.enroll_free(&headers, course_id).await?;

    let already_enrolled = outcome == CommitOutcome::AlreadyCommitted;
    Ok(Json(FreeEnrollmentResponse {
        success: true,
        message: if already_enrolled {
            "Already enrolled in this course".to_string()
        } else {
            "Enrolled successfully".to_string()
        },
        already_enrolled,
    }))
}

/// Whether the caller owns a course
#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/enrollment",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrollment status", body = EnrollmentStatusResponse),
        (status = 400, description = "Malformed course id", body = crate::errors::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Course not found", body = crate::errors::ErrorResponse)
    ),
    security(("session" = [])),
    tag = "Enrollments"
)]
pub async fn enrollment_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<EnrollmentStatusResponse>, ServiceError> {
    let course_id = parse_course_id(&id)?;
    let enrolled = state
        .enrollments
        .enrollment_status(&headers, course_id)
        .await?;
    Ok(Json(EnrollmentStatusResponse { enrolled }))
}

pub fn enrollment_routes() -> Router<AppState> {
    Router::new().route("/free", post(enroll_free))
}

pub fn course_routes() -> Router<AppState> {
    Router::new().route("/:id/enrollment", get(enrollment_status))
}
