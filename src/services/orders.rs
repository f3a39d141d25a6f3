use axum::http::HeaderMap;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{require_course, require_principal};
use crate::auth::IdentityProvider;
use crate::errors::ServiceError;
use crate::gateway::{GatewayError, PaymentGateway, ProviderOrderRequest};
use crate::metrics::{self, MetricsRegistry};
use crate::money::{receipt_for, Currency};
use crate::repositories::CatalogRepository;

/// What the browser checkout widget needs to open a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub course_name: String,
    /// Public key id; the key secret is never returned.
    pub key_id: String,
}

pub struct OrderService {
    catalog: Arc<dyn CatalogRepository>,
    identity: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn PaymentGateway>,
    metrics: MetricsRegistry,
    currency: Currency,
    key_id: String,
}

impl OrderService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        metrics: MetricsRegistry,
        currency: Currency,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            identity,
            gateway,
            metrics,
            currency,
            key_id: key_id.into(),
        }
    }

    /// Creates a provider order for the server-side price of `course_id`.
    ///
    /// Every gate runs before the gateway is called; a failure leaves no
    /// side effect anywhere.
    #[instrument(skip(self, headers), fields(course_id = %course_id))]
    pub async fn create_order(
        &self,
        headers: &HeaderMap,
        course_id: Uuid,
    ) -> Result<CreatedOrder, ServiceError> {
        let principal = require_principal(self.identity.as_ref(), headers).await?;
        let course = require_course(self.catalog.as_ref(), course_id).await?;

        if !course.is_purchasable() {
            return Err(ServiceError::NotPurchasable);
        }
        if course.is_free() {
            return Err(ServiceError::FreeCourseNotPayable);
        }
        // Fast path only; the unique index decides at commit time.
        if self
            .catalog
            .is_enrolled(principal.user_id, course.id)
            .await?
        {
            return Err(ServiceError::AlreadyEnrolled);
        }

        let amount = self.currency.to_minor_units(course.price).ok_or_else(|| {
            ServiceError::Internal(format!(
                "price {} of course {} cannot be expressed in {} minor units",
                course.price,
                course.id,
                self.currency.code()
            ))
        })?;

        let mut notes = BTreeMap::new();
        notes.insert("courseId".to_string(), course.id.to_string());
        notes.insert("userId".to_string(), principal.user_id.to_string());
        notes.insert("courseTitle".to_string(), course.title.clone());

        let request = ProviderOrderRequest {
            amount,
            currency: self.currency.code().to_string(),
            receipt: receipt_for(course.id, principal.user_id, Utc::now()),
            notes,
        };

        let order = match self.gateway.create_order(request).await {
            Ok(order) => order,
            Err(err) => {
                self.metrics.incr(metrics::GATEWAY_ERRORS);
                match &err {
                    GatewayError::Rejected {
                        status,
                        description,
                    } => error!(
                        user_id = %principal.user_id,
                        provider_status = status,
                        provider_error = description.as_deref().unwrap_or(""),
                        "payment gateway rejected order"
                    ),
                    other => error!(
                        user_id = %principal.user_id,
                        error = %other,
                        "payment gateway order creation failed"
                    ),
                }
                return Err(ServiceError::GatewayError(err.to_string()));
            }
        };

        if order.amount != amount || !order.currency.eq_ignore_ascii_case(self.currency.code()) {
            self.metrics.incr(metrics::GATEWAY_ERRORS);
            error!(
                order_id = %order.id,
                requested_amount = amount,
                returned_amount = order.amount,
                returned_currency = %order.currency,
                "gateway order does not match the requested charge"
            );
            return Err(ServiceError::GatewayError(
                "order amount mismatch".to_string(),
            ));
        }

        self.metrics.incr(metrics::ORDERS_CREATED);
        info!(order_id = %order.id, user_id = %principal.user_id, amount, "order created");

        Ok(CreatedOrder {
            order_id: order.id,
            amount: order.amount,
            currency: self.currency.code().to_string(),
            course_name: course.title,
            key_id: self.key_id.clone(),
        })
    }
}
