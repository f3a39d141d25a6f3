#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use coursepay_api::{
    auth::{Principal, Role, SessionAuthenticator},
    build_router,
    config::{AppConfig, SecretString},
    entities::course,
    gateway::{payment_signature, RazorpayGateway},
    repositories::InMemoryCatalogRepository,
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const KEY_ID: &str = "rzp_test_harness";
pub const KEY_SECRET: &str = "s3cret";
pub const SESSION_SECRET: &str = "harness-session-secret-0123456789abcdef";

/// Application wired to an in-memory catalog and a mocked Razorpay API.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub catalog: InMemoryCatalogRepository,
    pub razorpay: MockServer,
    authenticator: SessionAuthenticator,
}

impl TestApp {
    pub async fn new() -> Self {
        let razorpay = MockServer::start().await;

        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            SESSION_SECRET.to_string(),
            KEY_ID.to_string(),
            KEY_SECRET.to_string(),
            "development".to_string(),
        );

        let catalog = InMemoryCatalogRepository::new();
        let authenticator = SessionAuthenticator::from_config(&cfg);
        let gateway = RazorpayGateway::new(
            razorpay.uri(),
            KEY_ID,
            SecretString::new(KEY_SECRET),
            Duration::from_secs(5),
        )
        .expect("gateway client");

        let state = AppState::new(
            cfg,
            Arc::new(catalog.clone()),
            Arc::new(authenticator.clone()),
            Arc::new(gateway),
        )
        .expect("app state");
        let router = build_router(state.clone()).expect("router");

        Self {
            router,
            state,
            catalog,
            razorpay,
            authenticator,
        }
    }

    /// Session token for a student with the given id.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.authenticator
            .issue(
                &Principal {
                    user_id,
                    role: Role::Student,
                },
                chrono::Duration::hours(1),
            )
            .expect("session token")
    }

    /// Approved, published, unflagged course at `price`.
    pub async fn seed_course(&self, price: Decimal) -> course::Model {
        self.seed_course_with(price, |_| {}).await
    }

    pub async fn seed_course_with(
        &self,
        price: Decimal,
        customize: impl FnOnce(&mut course::Model),
    ) -> course::Model {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut model = course::Model {
            id,
            instructor_id: Uuid::new_v4(),
            category_id: None,
            title: "Async Rust in Production".to_string(),
            slug: format!("async-rust-{}", id.simple()),
            description: None,
            price,
            is_approved: true,
            is_published: true,
            is_flagged: false,
            created_at: now,
            updated_at: now,
        };
        customize(&mut model);
        self.catalog.insert_course(model.clone()).await;
        model
    }

    /// Expects exactly `times` order creations for `amount` minor units.
    pub async fn expect_order(&self, order_id: &str, amount: i64, times: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(body_partial_json(json!({ "amount": amount, "currency": "INR" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": order_id,
                "entity": "order",
                "amount": amount,
                "amount_paid": 0,
                "currency": "INR",
                "status": "created"
            })))
            .expect(times)
            .mount(&self.razorpay)
            .await;
    }

    /// Fails the test if the gateway is contacted at all.
    pub async fn forbid_orders(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.razorpay)
            .await;
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn create_order(&self, token: Option<&str>, course_id: &str) -> Response {
        self.request(
            Method::POST,
            "/api/v1/payments/create-order",
            token,
            Some(json!({ "courseId": course_id })),
        )
        .await
    }

    pub async fn verify(
        &self,
        token: Option<&str>,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        course_id: &str,
    ) -> Response {
        self.request(
            Method::POST,
            "/api/v1/payments/verify",
            token,
            Some(json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": payment_id,
                "razorpay_signature": signature,
                "courseId": course_id
            })),
        )
        .await
    }
}

pub fn sign(order_id: &str, payment_id: &str) -> String {
    payment_signature(order_id, payment_id, KEY_SECRET)
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
