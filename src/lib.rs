//! CoursePay API Library
//!
//! Order creation, payment verification and the enrollment commit for paid
//! and free courses.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod money;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use anyhow::Context;
use axum::{routing::get, Router};
use http::{header, HeaderName, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
};

use crate::auth::IdentityProvider;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::gateway::PaymentGateway;
use crate::metrics::MetricsRegistry;
use crate::repositories::CatalogRepository;
use crate::services::{EnrollmentService, OrderService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub orders: Arc<OrderService>,
    pub enrollments: Arc<EnrollmentService>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    /// Wires the checkout services over one catalog, identity provider and
    /// gateway.
    pub fn new(
        config: AppConfig,
        catalog: Arc<dyn CatalogRepository>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, ServiceError> {
        let currency = config
            .currency()
            .map_err(|e| ServiceError::Internal(format!("payment currency: {}", e)))?;
        let metrics = MetricsRegistry::new();

        let orders = OrderService::new(
            catalog.clone(),
            identity.clone(),
            gateway,
            metrics.clone(),
            currency,
            config.razorpay_key_id.clone(),
        );
        let enrollments = EnrollmentService::new(
            catalog.clone(),
            identity,
            metrics.clone(),
            currency,
            config.razorpay_key_secret.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            catalog,
            orders: Arc::new(orders),
            enrollments: Arc::new(enrollments),
            metrics,
        })
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/enrollments", handlers::enrollments::enrollment_routes())
        .nest("/courses", handlers::enrollments::course_routes())
}

/// Builds the CORS layer from configuration.
///
/// Explicit origins get an explicit method and header list so credentials
/// can be allowed.
pub fn cors_layer(cfg: &AppConfig) -> anyhow::Result<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(middleware_helpers::REQUEST_ID_HEADER),
            ])
            .allow_credentials(cfg.cors_allow_credentials));
    }

    if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        return Ok(CorsLayer::permissive());
    }

    anyhow::bail!(
        "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
    )
}

/// Full HTTP surface: health, metrics, the v1 API and Swagger UI.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config).context("failed to build CORS layer")?;
    let body_limit = state.config.max_body_size;
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    let app = Router::<AppState>::new()
        .route("/", get(|| async { "coursepay-api up" }))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state);

    Ok(app)
}

pub mod prelude {
    pub use crate::auth::{IdentityProvider, Principal, Role, SessionAuthenticator};
    pub use crate::config::AppConfig;
    pub use crate::errors::ServiceError;
    pub use crate::gateway::{PaymentGateway, RazorpayGateway};
    pub use crate::repositories::{CatalogRepository, InMemoryCatalogRepository};
    pub use crate::services::{CommitOutcome, EnrollmentService, OrderService};
    pub use crate::{build_router, AppState};
}
