//! Card payment gateway

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Successful capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub gateway_reference: String,
}

/// External card rail. Used only for non-wallet payment methods.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(
        &self,
        amount: Decimal,
        currency: &str,
        method_token: &str,
    ) -> ServiceResult<Capture>;

    async fn refund(&self, gateway_reference: &str, amount: Decimal) -> ServiceResult<()>;
}

#[derive(Serialize)]
struct CaptureBody<'a> {
    amount: Decimal,
    currency: &'a str,
    method_token: &'a str,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    reference: &'a str,
    amount: Decimal,
}

#[derive(Deserialize)]
struct CaptureReply {
    reference: String,
}

/// HTTP client for the payment provider
#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    /// Every request, including reading the reply, must finish within `timeout`
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn capture(
        &self,
        amount: Decimal,
        currency: &str,
        method_token: &str,
    ) -> ServiceResult<Capture> {
        let response = self
            .post("/captures")
            .json(&CaptureBody {
                amount,
                currency,
                method_token,
            })
            .send()
            .await
            .map_err(|e| ServiceError::GatewayFailure(format!("Capture request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Gateway declined capture");
            return Err(ServiceError::GatewayFailure(format!(
                "Capture declined with status {}",
                status
            )));
        }

        let reply = response
            .json::<CaptureReply>()
            .await
            .map_err(|e| ServiceError::GatewayFailure(format!("Invalid capture reply: {}", e)))?;

        Ok(Capture {
            gateway_reference: reply.reference,
        })
    }

    async fn refund(&self, gateway_reference: &str, amount: Decimal) -> ServiceResult<()> {
        let response = self
            .post("/refunds")
            .json(&RefundBody {
                reference: gateway_reference,
                amount,
            })
            .send()
            .await
            .map_err(|e| ServiceError::GatewayFailure(format!("Refund request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::GatewayFailure(format!(
                "Refund of {} rejected with status {}",
                gateway_reference,
                response.status()
            )));
        }

        Ok(())
    }
}

/// Gateway stand-in for environments without a provider.
///
/// Tokens starting with `tok_decline` fail; everything else is captured.
#[derive(Clone, Default)]
pub struct SimulatedPaymentGateway;

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn capture(
        &self,
        amount: Decimal,
        currency: &str,
        method_token: &str,
    ) -> ServiceResult<Capture> {
        tracing::warn!(
            amount = %amount,
            currency = %currency,
            "Using simulated payment gateway capture"
        );

        if method_token.starts_with("tok_decline") {
            return Err(ServiceError::GatewayFailure("Card declined".to_string()));
        }

        Ok(Capture {
            gateway_reference: format!("sim_{}", Uuid::new_v4().simple()),
        })
    }

    async fn refund(&self, gateway_reference: &str, amount: Decimal) -> ServiceResult<()> {
        tracing::warn!(
            reference = %gateway_reference,
            amount = %amount,
            "Using simulated payment gateway refund"
        );
        Ok(())
    }
}
