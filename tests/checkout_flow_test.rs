//! Integration tests for the paid and free checkout flows.
//!
//! Tests cover:
//! - Order creation from the server-side price
//! - Purchasability gating before any gateway call
//! - Signature verification of payment confirmations
//! - Idempotent enrollment commit, sequential and concurrent
//! - Free enrollment and enrollment status

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{response_json, sign, TestApp, KEY_ID};
use coursepay_api::entities::course;
use coursepay_api::metrics;
use rstest::rstest;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

const ORDER_ID: &str = "order_abc";
const PAYMENT_ID: &str = "pay_xyz";
// HMAC-SHA256("order_abc|pay_xyz", "s3cret")
const VALID_SIGNATURE: &str = "69d2d55b3175eb1d5c503399ed52b90c1f0326286864d5042cdf2c46598162e7";
// Same message under the secret "other"
const FOREIGN_SIGNATURE: &str = "0e800c2ea6efa38f3b3fbf633d886d23bbb65c7c9fed7c719c98528513b0278b";

// ==================== Paid checkout ====================

#[tokio::test]
async fn test_paid_checkout_commits_enrollment_once() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    let course_id = course.id.to_string();
    app.expect_order(ORDER_ID, 49_900, 1).await;

    let response = app.create_order(Some(&token), &course_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = response_json(response).await;
    assert_eq!(order["orderId"], ORDER_ID);
    assert_eq!(order["amount"], 49_900);
    assert_eq!(order["currency"], "INR");
    assert_eq!(order["courseName"], "Async Rust in Production");
    assert_eq!(order["keyId"], KEY_ID);

    assert_eq!(sign(ORDER_ID, PAYMENT_ID), VALID_SIGNATURE);
    let response = app
        .verify(Some(&token), ORDER_ID, PAYMENT_ID, VALID_SIGNATURE, &course_id)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["alreadyEnrolled"], false);

    // Replaying the same confirmation is a successful no-op.
    let response = app
        .verify(Some(&token), ORDER_ID, PAYMENT_ID, VALID_SIGNATURE, &course_id)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["alreadyEnrolled"], true);
    assert_eq!(body["message"], "Already enrolled in this course");

    let enrollments = app.catalog.enrollments().await;
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].course_id, course.id);
    assert_eq!(enrollments[0].amount_paid, dec!(499.00));
    assert_eq!(enrollments[0].payment_id.as_deref(), Some(PAYMENT_ID));

    let payments = app.catalog.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].provider_order_id, ORDER_ID);
    assert_eq!(payments[0].amount, dec!(499.00));

    assert_eq!(app.state.metrics.get(metrics::ENROLLMENTS_COMMITTED), 1);
    assert_eq!(app.state.metrics.get(metrics::ENROLLMENTS_DUPLICATE), 1);
}

#[tokio::test]
async fn test_client_supplied_amount_is_ignored() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(1200.00)).await;
    let token = app.token_for(Uuid::new_v4());
    app.expect_order("order_big", 120_000, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(&token),
            Some(json!({ "courseId": course.id.to_string(), "amount": 1, "price": "1.00" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let order = response_json(response).await;
    assert_eq!(order["amount"], 120_000);

    let response = app
        .verify(
            Some(&token),
            "order_big",
            "pay_big",
            &sign("order_big", "pay_big"),
            &course.id.to_string(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let enrollments = app.catalog.enrollments().await;
    assert_eq!(enrollments[0].amount_paid, dec!(1200.00));
}

#[tokio::test]
async fn test_already_enrolled_user_cannot_create_another_order() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    let course_id = course.id.to_string();

    let response = app
        .verify(Some(&token), ORDER_ID, PAYMENT_ID, VALID_SIGNATURE, &course_id)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.forbid_orders().await;
    let response = app.create_order(Some(&token), &course_id).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Already enrolled in this course");
}

// ==================== Gating ====================

#[rstest]
#[case::unapproved(|c: &mut course::Model| c.is_approved = false)]
#[case::unpublished(|c: &mut course::Model| c.is_published = false)]
#[case::flagged(|c: &mut course::Model| c.is_flagged = true)]
#[tokio::test]
async fn test_unpurchasable_course_never_reaches_gateway(
    #[case] customize: fn(&mut course::Model),
) {
    let app = TestApp::new().await;
    let course = app.seed_course_with(dec!(499.00), customize).await;
    let token = app.token_for(Uuid::new_v4());
    app.forbid_orders().await;

    let response = app.create_order(Some(&token), &course.id.to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Course is not available for purchase");
}

#[tokio::test]
async fn test_free_course_cannot_be_paid_for() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(0.00)).await;
    let token = app.token_for(Uuid::new_v4());
    app.forbid_orders().await;

    let response = app.create_order(Some(&token), &course.id.to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "This is a free course. Use direct enrollment.");
}

#[rstest]
#[case::missing(json!({}), "courseId is required")]
#[case::empty(json!({ "courseId": "" }), "courseId is required")]
#[case::malformed(json!({ "courseId": "not-a-uuid" }), "Invalid courseId")]
#[tokio::test]
async fn test_create_order_rejects_bad_course_id(
    #[case] payload: serde_json::Value,
    #[case] expected: &str,
) {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(&token),
            Some(payload),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], expected);
}

#[tokio::test]
async fn test_create_order_requires_session() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    app.forbid_orders().await;

    let response = app.create_order(None, &course.id.to_string()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .create_order(Some("not-a-session-token"), &course.id.to_string())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn test_create_order_for_unknown_course() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());
    app.forbid_orders().await;

    let response = app
        .create_order(Some(&token), &Uuid::new_v4().to_string())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Course not found");
}

#[tokio::test]
async fn test_gateway_rejection_surfaces_generic_error() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Authentication failed"
            }
        })))
        .expect(1)
        .mount(&app.razorpay)
        .await;

    let response = app.create_order(Some(&token), &course.id.to_string()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Failed to create payment order");
    assert_eq!(app.state.metrics.get(metrics::GATEWAY_ERRORS), 1);
}

// ==================== Signature verification ====================

#[rstest]
#[case::tampered_payment(ORDER_ID, "pay_other", VALID_SIGNATURE)]
#[case::tampered_order("order_abd", PAYMENT_ID, VALID_SIGNATURE)]
#[case::foreign_secret(ORDER_ID, PAYMENT_ID, FOREIGN_SIGNATURE)]
#[case::truncated(ORDER_ID, PAYMENT_ID, "69d2d55b3175eb1d")]
#[case::not_hex(ORDER_ID, PAYMENT_ID, "zz")]
#[case::case_flipped(
    ORDER_ID,
    PAYMENT_ID,
    "69D2d55b3175eb1d5c503399ed52b90c1f0326286864d5042cdf2c46598162e7"
)]
#[tokio::test]
async fn test_mutated_confirmation_is_rejected(
    #[case] order_id: &str,
    #[case] payment_id: &str,
    #[case] signature: &str,
) {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .verify(Some(&token), order_id, payment_id, signature, &course.id.to_string())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid payment signature");
    assert!(app.catalog.enrollments().await.is_empty());
    assert!(app.catalog.payments().await.is_empty());
    assert_eq!(app.state.metrics.get(metrics::SIGNATURE_REJECTIONS), 1);
}

#[tokio::test]
async fn test_signature_is_checked_before_session() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;

    let response = app
        .verify(None, ORDER_ID, PAYMENT_ID, FOREIGN_SIGNATURE, &course.id.to_string())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .verify(None, ORDER_ID, PAYMENT_ID, VALID_SIGNATURE, &course.id.to_string())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.catalog.enrollments().await.is_empty());
}

#[rstest]
#[case::no_order(json!({ "razorpay_payment_id": PAYMENT_ID, "razorpay_signature": VALID_SIGNATURE, "courseId": "c" }))]
#[case::no_payment(json!({ "razorpay_order_id": ORDER_ID, "razorpay_signature": VALID_SIGNATURE, "courseId": "c" }))]
#[case::no_signature(json!({ "razorpay_order_id": ORDER_ID, "razorpay_payment_id": PAYMENT_ID, "courseId": "c" }))]
#[case::empty_signature(json!({ "razorpay_order_id": ORDER_ID, "razorpay_payment_id": PAYMENT_ID, "razorpay_signature": "", "courseId": "c" }))]
#[case::no_course(json!({ "razorpay_order_id": ORDER_ID, "razorpay_payment_id": PAYMENT_ID, "razorpay_signature": VALID_SIGNATURE }))]
#[tokio::test]
async fn test_verify_requires_every_field(#[case] payload: serde_json::Value) {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .request(Method::POST, "/api/v1/payments/verify", Some(&token), Some(payload))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Missing required payment fields");
}

#[tokio::test]
async fn test_verify_for_unknown_course() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .verify(
            Some(&token),
            ORDER_ID,
            PAYMENT_ID,
            VALID_SIGNATURE,
            &Uuid::new_v4().to_string(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.catalog.enrollments().await.is_empty());
}

// ==================== Commit idempotency ====================

#[tokio::test]
async fn test_concurrent_confirmations_commit_one_enrollment() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    let course_id = course.id.to_string();

    // Two checkouts of the same course raced by the same user.
    let sig_a = sign("order_a", "pay_a");
    let sig_b = sign("order_b", "pay_b");
    let (first, second) = tokio::join!(
        app.verify(Some(&token), "order_a", "pay_a", &sig_a, &course_id),
        app.verify(Some(&token), "order_b", "pay_b", &sig_b, &course_id),
    );

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let first = response_json(first).await;
    let second = response_json(second).await;
    let already: Vec<bool> = [&first, &second]
        .iter()
        .map(|b| b["alreadyEnrolled"].as_bool().unwrap())
        .collect();
    assert_eq!(already.iter().filter(|a| !**a).count(), 1);
    assert_eq!(already.iter().filter(|a| **a).count(), 1);

    assert_eq!(app.catalog.enrollments().await.len(), 1);
    // Both captured payments stay on record for refund reconciliation.
    assert_eq!(app.catalog.payments().await.len(), 2);
}

#[tokio::test]
async fn test_storage_failure_after_verification_is_reported() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    app.catalog.fail_enrollment_inserts(true);

    let response = app
        .verify(
            Some(&token),
            ORDER_ID,
            PAYMENT_ID,
            VALID_SIGNATURE,
            &course.id.to_string(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Failed to create enrollment");
    assert_eq!(app.state.metrics.get(metrics::ENROLLMENT_FAILURES), 1);
    // The payment audit row survives for reconciliation.
    assert_eq!(app.catalog.payments().await.len(), 1);
}

#[tokio::test]
async fn test_audit_failure_does_not_block_enrollment() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    app.catalog.fail_payment_inserts(true);

    let response = app
        .verify(
            Some(&token),
            ORDER_ID,
            PAYMENT_ID,
            VALID_SIGNATURE,
            &course.id.to_string(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.catalog.enrollments().await.len(), 1);
    assert!(app.catalog.payments().await.is_empty());
    assert_eq!(app.state.metrics.get(metrics::PAYMENT_AUDIT_FAILURES), 1);
}

// ==================== Free enrollment and status ====================

#[tokio::test]
async fn test_free_enrollment_is_idempotent() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(0.00)).await;
    let token = app.token_for(Uuid::new_v4());
    let payload = json!({ "courseId": course.id.to_string() });

    let response = app
        .request(
            Method::POST,
            "/api/v1/enrollments/free",
            Some(&token),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["alreadyEnrolled"], false);

    let response = app
        .request(
            Method::POST,
            "/api/v1/enrollments/free",
            Some(&token),
            Some(payload),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["alreadyEnrolled"], true);

    let enrollments = app.catalog.enrollments().await;
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].amount_paid, dec!(0));
    assert_matches!(enrollments[0].payment_id, None);
}

#[tokio::test]
async fn test_free_enrollment_refuses_paid_course() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .request(
            Method::POST,
            "/api/v1/enrollments/free",
            Some(&token),
            Some(json!({ "courseId": course.id.to_string() })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "This course requires payment");
    assert!(app.catalog.enrollments().await.is_empty());
}

#[tokio::test]
async fn test_enrollment_status_reflects_commit() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    let uri = format!("/api/v1/courses/{}/enrollment", course.id);

    let response = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["enrolled"], false);

    let response = app
        .verify(
            Some(&token),
            ORDER_ID,
            PAYMENT_ID,
            VALID_SIGNATURE,
            &course.id.to_string(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(response_json(response).await["enrolled"], true);

    // Another user does not inherit the enrollment.
    let other = app.token_for(Uuid::new_v4());
    let response = app.request(Method::GET, &uri, Some(&other), None).await;
    assert_eq!(response_json(response).await["enrolled"], false);
}

// ==================== Operational endpoints ====================

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let app = TestApp::new().await;
    let course = app.seed_course(dec!(499.00)).await;
    let token = app.token_for(Uuid::new_v4());
    app.verify(
        Some(&token),
        ORDER_ID,
        PAYMENT_ID,
        VALID_SIGNATURE,
        &course.id.to_string(),
    )
    .await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "up");

    let response = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("checkout_enrollments_committed_total 1"));
}

#[tokio::test]
async fn test_request_id_is_echoed_on_errors() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            None,
            Some(json!({ "courseId": Uuid::new_v4().to_string() })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("request id header");
    let body = response_json(response).await;
    assert_eq!(body["request_id"], header);
}
