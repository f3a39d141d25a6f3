use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{parse_course_id, ValidatedJson};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::{CommitOutcome, PaymentConfirmation};

const MISSING_PAYMENT_FIELDS: &str = "Missing required payment fields";

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({ "courseId": "6f1c2a9e-0000-4000-8000-000000000001" }))]
pub struct CreateOrderRequest {
    /// Course to purchase
    #[validate(
        required(message = "courseId is required"),
        length(min = 1, message = "courseId is required")
    )]
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "orderId": "order_NzLh5rQ1x2",
    "amount": 49900,
    "currency": "INR",
    "courseName": "Async Rust in Production",
    "keyId": "rzp_live_AbCdEf123"
}))]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Amount in the currency's smallest unit
    pub amount: i64,
    pub currency: String,
    pub course_name: String,
    /// Public key for the checkout widget
    pub key_id: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    #[validate(
        required(message = "Missing required payment fields"),
        length(min = 1, message = "Missing required payment fields")
    )]
    pub razorpay_order_id: Option<String>,
    #[validate(
        required(message = "Missing required payment fields"),
        length(min = 1, message = "Missing required payment fields")
    )]
    pub razorpay_payment_id: Option<String>,
    #[validate(
        required(message = "Missing required payment fields"),
        length(min = 1, message = "Missing required payment fields")
    )]
    pub razorpay_signature: Option<String>,
    #[serde(rename = "courseId")]
    #[validate(
        required(message = "Missing required payment fields"),
        length(min = 1, message = "Missing required payment fields")
    )]
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
    /// True when this confirmation had already been committed
    pub already_enrolled: bool,
}

impl From<CommitOutcome> for VerifyPaymentResponse {
    fn from(outcome: CommitOutcome) -> Self {
        match outcome {
            CommitOutcome::Committed => Self {
                success: true,
                message: "Payment verified and enrollment created".to_string(),
                already_enrolled: false,
            },
            CommitOutcome::AlreadyCommitted => Self {
                success: true,
                message: "Already enrolled in this course".to_string(),
                already_enrolled: true,
            },
        }
    }
}

fn required(field: Option<String>) -> Result<String, ServiceError> {
    field
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest(MISSING_PAYMENT_FIELDS.to_string()))
}

/// Create a provider order for a course
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "Invalid request, course not purchasable, free or already owned", body = crate::errors::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Course not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    security(("session" = [])),
    tag = "Payments"
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ServiceError> {
    let course_id = parse_course_id(request.course_id.as_deref().unwrap_or_default())?;
    let order = state.orders.create_order(&headers, course_id).await?;

    Ok(Json(CreateOrderResponse {
        order_id: order.order_id,
        amount: order.amount,
        currency: order.currency,
        course_name: order.course_name,
        key_id: order.key_id,
    }))
}

/// Verify a payment confirmation and enroll the caller
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified. A replayed or concurrent confirmation for an existing enrollment also returns 200, with alreadyEnrolled true and message \"Already enrolled in this course\", instead of a 400 error", body = VerifyPaymentResponse),
        (status = 400, description = "Missing fields or invalid signature", body = crate::errors::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Course not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment verified but enrollment could not be recorded", body = crate::errors::ErrorResponse)
    ),
    security(("session" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ServiceError> {
    let confirmation = PaymentConfirmation {
        order_id: required(request.razorpay_order_id)?,
        payment_id: required(request.razorpay_payment_id)?,
        signature: required(request.razorpay_signature)?,
        course_id: parse_course_id(&required(request.course_id)?)?,
    };

    let outcome = state
        .enrollments
        .verify_and_commit(&headers, confirmation)
        .await?;
    Ok(Json(outcome.into()))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify_payment))
}
