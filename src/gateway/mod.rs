//! Payment provider gateway: order creation and callback signatures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod razorpay;
pub mod signature;

pub use razorpay::RazorpayGateway;
pub use signature::{payment_signature, verify_payment_signature};

/// Order creation request in the provider's smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderOrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

/// The provider-side order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected order with status {status}")]
    Rejected {
        status: u16,
        description: Option<String>,
    },

    #[error("malformed gateway response: {0}")]
    Malformed(String),

    #[error("gateway client misconfigured: {0}")]
    Config(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates one provider order. Never retried.
    async fn create_order(&self, request: ProviderOrderRequest)
        -> Result<ProviderOrder, GatewayError>;
}
