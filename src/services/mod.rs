pub mod enrollments;
pub mod orders;

pub use enrollments::{CommitOutcome, EnrollmentService, PaymentConfirmation};
pub use orders::{CreatedOrder, OrderService};

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::{IdentityProvider, Principal};
use crate::entities::course;
use crate::errors::ServiceError;
use crate::repositories::CatalogRepository;

async fn require_principal(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<Principal, ServiceError> {
    identity
        .current_principal(headers)
        .await?
        .ok_or(ServiceError::Unauthenticated)
}

async fn require_course(
    catalog: &dyn CatalogRepository,
    course_id: Uuid,
) -> Result<course::Model, ServiceError> {
    catalog
        .find_course(course_id)
        .await?
        .ok_or_else(ServiceError::course_not_found)
}
