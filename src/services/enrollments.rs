use axum::http::HeaderMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{require_course, require_principal};
use crate::auth::IdentityProvider;
use crate::config::SecretString;
use crate::entities::payment::PaymentStatus;
use crate::errors::ServiceError;
use crate::gateway::verify_payment_signature;
use crate::metrics::{self, MetricsRegistry};
use crate::money::Currency;
use crate::repositories::{CatalogRepository, InsertOutcome, NewEnrollment, NewPayment};

/// Signed confirmation forwarded by the client after checkout.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub course_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// An enrollment for this user and course already existed.
    AlreadyCommitted,
}

pub struct EnrollmentService {
    catalog: Arc<dyn CatalogRepository>,
    identity: Arc<dyn IdentityProvider>,
    metrics: MetricsRegistry,
    currency: Currency,
    key_secret: SecretString,
}

impl EnrollmentService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        identity: Arc<dyn IdentityProvider>,
        metrics: MetricsRegistry,
        currency: Currency,
        key_secret: SecretString,
    ) -> Self {
        Self {
            catalog,
            identity,
            metrics,
            currency,
            key_secret,
        }
    }

    /// Verifies a payment confirmation and commits the enrollment once.
    ///
    /// The signature is checked before the session or the database are
    /// touched. Replays of an already committed confirmation resolve to
    /// [`CommitOutcome::AlreadyCommitted`].
    #[instrument(
        skip(self, headers, confirmation),
        fields(
            order_id = %confirmation.order_id,
            payment_id = %confirmation.payment_id,
            course_id = %confirmation.course_id
        )
    )]
    pub async fn verify_and_commit(
        &self,
        headers: &HeaderMap,
        confirmation: PaymentConfirmation,
    ) -> Result<CommitOutcome, ServiceError> {
        if !verify_payment_signature(
            &confirmation.order_id,
            &confirmation.payment_id,
            &confirmation.signature,
            self.key_secret.expose(),
        ) {
            self.metrics.incr(metrics::SIGNATURE_REJECTIONS);
            warn!(
                order_id = %confirmation.order_id,
                payment_id = %confirmation.payment_id,
                "payment signature mismatch"
            );
            return Err(ServiceError::InvalidSignature);
        }

        let principal = require_principal(self.identity.as_ref(), headers).await?;
        let course = require_course(self.catalog.as_ref(), confirmation.course_id).await?;

        let audit = NewPayment {
            user_id: principal.user_id,
            course_id: course.id,
            provider_order_id: confirmation.order_id.clone(),
            provider_payment_id: confirmation.payment_id.clone(),
            amount: course.price,
            currency: self.currency.code().to_string(),
            status: PaymentStatus::Captured,
        };
        match self.catalog.insert_payment(audit).await {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::Duplicate) => {
                debug!("payment audit row already recorded");
            }
            Err(err) => {
                self.metrics.incr(metrics::PAYMENT_AUDIT_FAILURES);
                warn!(error = %err, "failed to record payment audit row");
            }
        }

        let enrollment = NewEnrollment {
            user_id: principal.user_id,
            course_id: course.id,
            payment_id: Some(confirmation.payment_id.clone()),
            amount_paid: course.price,
        };
        match self.catalog.insert_enrollment(enrollment).await {
            Ok(InsertOutcome::Inserted) => {
                self.metrics.incr(metrics::ENROLLMENTS_COMMITTED);
                info!(user_id = %principal.user_id, amount_paid = %course.price, "enrollment committed");
                Ok(CommitOutcome::Committed)
            }
            Ok(InsertOutcome::Duplicate) => {
                self.metrics.incr(metrics::ENROLLMENTS_DUPLICATE);
                info!(user_id = %principal.user_id, "enrollment already committed");
                Ok(CommitOutcome::AlreadyCommitted)
            }
            Err(err) => {
                self.metrics.incr(metrics::ENROLLMENT_FAILURES);
                error!(
                    reconciliation_required = true,
                    order_id = %confirmation.order_id,
                    payment_id = %confirmation.payment_id,
                    user_id = %principal.user_id,
                    course_id = %course.id,
                    amount = %course.price,
                    currency = self.currency.code(),
                    error = %err,
                    "verified payment could not be recorded as an enrollment"
                );
                Err(ServiceError::EnrollmentFailed(err.to_string()))
            }
        }
    }

    /// Enrolls the caller in a free course without any payment.
    #[instrument(skip(self, headers), fields(course_id = %course_id))]
    pub async fn enroll_free(
        &self,
        headers: &HeaderMap,
        course_id: Uuid,
    ) -> Result<CommitOutcome, ServiceError> {
        let principal = require_principal(self.identity.as_ref(), headers).await?;
        let course = require_course(self.catalog.as_ref(), course_id).await?;

        if !course.is_purchasable() {
            return Err(ServiceError::NotPurchasable);
        }
        if !course.is_free() {
            return Err(ServiceError::PaymentRequired);
        }

        let enrollment = NewEnrollment {
            user_id: principal.user_id,
            course_id: course.id,
            payment_id: None,
            amount_paid: Decimal::ZERO,
        };
        match self.catalog.insert_enrollment(enrollment).await? {
            InsertOutcome::Inserted => {
                self.metrics.incr(metrics::FREE_ENROLLMENTS);
                info!(user_id = %principal.user_id, "free enrollment committed");
                Ok(CommitOutcome::Committed)
            }
            InsertOutcome::Duplicate => Ok(CommitOutcome::AlreadyCommitted),
        }
    }

    /// Whether the caller already owns `course_id`.
    pub async fn enrollment_status(
        &self,
        headers: &HeaderMap,
        course_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let principal = require_principal(self.identity.as_ref(), headers).await?;
        let course = require_course(self.catalog.as_ref(), course_id).await?;
        Ok(self
            .catalog
            .is_enrolled(principal.user_id, course.id)
            .await?)
    }
}
