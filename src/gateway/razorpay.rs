use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{GatewayError, PaymentGateway, ProviderOrder, ProviderOrderRequest};
use crate::config::{AppConfig, SecretString};

const ORDERS_PATH: &str = "/v1/orders";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Razorpay Orders API client authenticated with the key pair.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl RazorpayGateway {
    pub fn new(
        api_base: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: SecretString,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.razorpay_api_base.clone(),
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
            config.gateway_timeout(),
        )
    }

    fn rejection(status: StatusCode, body: &str) -> GatewayError {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
        if let Some(envelope) = &parsed {
            debug!(code = ?envelope.error.code, "gateway error code");
        }
        GatewayError::Rejected {
            status: status.as_u16(),
            description: parsed
                .and_then(|e| e.error.description)
                .or_else(|| (!body.is_empty()).then(|| body.to_string())),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self, request), fields(receipt = %request.receipt, amount = request.amount))]
    async fn create_order(
        &self,
        request: ProviderOrderRequest,
    ) -> Result<ProviderOrder, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, ORDERS_PATH))
            .basic_auth(&self.key_id, Some(self.key_secret.expose()))
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::rejection(status, &body));
        }

        serde_json::from_str::<ProviderOrder>(&body)
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}
