use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CoursePay API",
        version = "1.0.0",
        description = r#"
# CoursePay checkout API

Creates payment orders for paid courses, verifies the signed payment
confirmation returned by the checkout widget, and commits the resulting
enrollment exactly once.

## Authentication

Every checkout endpoint needs a session. Send the session token either as a
bearer token or in the session cookie:

```
Authorization: Bearer <session-token>
```

## Errors

Failures share one body shape:

```json
{ "error": "Course is not available for purchase", "request_id": "..." }
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Payments", description = "Order creation and payment verification"),
        (name = "Enrollments", description = "Free enrollment and enrollment status"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::payments::create_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::enrollments::enroll_free,
        crate::handlers::enrollments::enrollment_status,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::handlers::payments::CreateOrderRequest,
            crate::handlers::payments::CreateOrderResponse,
            crate::handlers::payments::VerifyPaymentRequest,
            crate::handlers::payments::VerifyPaymentResponse,
            crate::handlers::enrollments::FreeEnrollmentRequest,
            crate::handlers::enrollments::FreeEnrollmentResponse,
            crate::handlers::enrollments::EnrollmentStatusResponse,
            crate::handlers::health::HealthResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SessionSecurity)
)]
pub struct ApiDocV1;

/// Registers the `session` scheme referenced by the checkout paths.
struct SessionSecurity;

impl Modify for SessionSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
