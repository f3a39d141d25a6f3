use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;

/// JSON body that has been deserialized and passed its `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                debug!(error = %rejection.body_text(), "rejected request body");
                ServiceError::InvalidRequest("Invalid JSON body".to_string())
            })?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Parses a course identifier supplied by the client.
pub fn parse_course_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::InvalidRequest("Invalid courseId".to_string()))
}
