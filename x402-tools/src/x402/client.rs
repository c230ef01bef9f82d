//! x402-aware HTTP client

use reqwest::{header, Client, Response};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use super::signer::X402Signer;
use super::types::{
    PaymentRequired, SettlementResponse, PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER,
    PAYMENT_RESPONSE_HEADER,
};

#[derive(Debug, Error)]
pub enum X402Error {
    /// Transport and HTTP-level failures, passed through untouched
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("x402 payment failed: {0}")]
    Payment(String),
}

/// HTTP client that automatically handles x402 payment flow.
///
/// Wraps a caller-supplied `reqwest::Client` rooted at a base URL. Requests
/// that come back 402 are signed and retried once with an `X-PAYMENT` header.
pub struct X402Client {
    client: Client,
    base_url: String,
    signer: Arc<X402Signer>,
}

impl X402Client {
    pub fn with_payment_interceptor(
        client: Client,
        base_url: impl Into<String>,
        signer: X402Signer,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        log::info!("[X402] Initialized for {} with wallet address: {}", base_url, signer.address());

        Self {
            client,
            base_url,
            signer: Arc::new(signer),
        }
    }

    /// Get the wallet address
    pub fn wallet_address(&self) -> String {
        self.signer.address()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body to `path`, paying if the server asks for it
    pub async fn post_with_payment<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, X402Error> {
        let url = self.url(path);
        log::info!("[X402] Making request to {}", url);

        // First request without payment
        let initial_response = self.client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        if initial_response.status().as_u16() != 402 {
            log::info!("[X402] No payment required, status: {}", initial_response.status());
            return Ok(initial_response);
        }

        log::info!("[X402] Received 402 Payment Required");

        let payment_required = read_payment_required(initial_response).await?;

        let requirements = payment_required.select().ok_or_else(|| {
            X402Error::Payment(match &payment_required.error {
                Some(reason) => format!("No payment options in 402 response ({})", reason),
                None => "No payment options in 402 response".to_string(),
            })
        })?;

        log::info!(
            "[X402] Payment requirements: {} of {} on {} to {}",
            requirements.max_amount_required,
            requirements.asset,
            requirements.network,
            requirements.pay_to
        );

        let payment_payload = self.signer
            .sign_payment(requirements, payment_required.x402_version)
            .await
            .map_err(X402Error::Payment)?;
        let payment_header_value = payment_payload.to_base64().map_err(X402Error::Payment)?;

        log::info!("[X402] Signed payment, retrying request with X-PAYMENT header");

        let paid_response = self.client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(PAYMENT_HEADER, payment_header_value)
            .json(body)
            .send()
            .await?;

        log::info!("[X402] Payment sent, response status: {}", paid_response.status());
        log_settlement(&paid_response);

        Ok(paid_response)
    }
}

/// v2 servers put requirements in a header; v1 servers put them in the body
async fn read_payment_required(response: Response) -> Result<PaymentRequired, X402Error> {
    if let Some(value) = response.headers().get(PAYMENT_REQUIRED_HEADER) {
        let encoded = value
            .to_str()
            .map_err(|e| X402Error::Payment(format!("Invalid payment-required header: {}", e)))?;
        return PaymentRequired::from_base64(encoded).map_err(X402Error::Payment);
    }

    let body = response.bytes().await?;
    PaymentRequired::from_body(&body).map_err(X402Error::Payment)
}

fn log_settlement(response: &Response) {
    let Some(value) = response.headers().get(PAYMENT_RESPONSE_HEADER) else {
        return;
    };
    match value.to_str().map_err(|e| e.to_string()).and_then(SettlementResponse::from_base64) {
        Ok(settlement) => log::info!(
            "[X402] Settlement success={} tx={} network={}",
            settlement.success,
            settlement.transaction.as_deref().unwrap_or("?"),
            settlement.network.as_deref().unwrap_or("?")
        ),
        Err(e) => log::warn!("[X402] Could not decode settlement header: {}", e),
    }
}
