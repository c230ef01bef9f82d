//! x402 Protocol data types

use serde::{Deserialize, Serialize};

/// Base mainnet chain ID
pub const BASE_CHAIN_ID: u64 = 8453;

/// Base Sepolia chain ID
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

/// Request header carrying the signed payment
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// v2 servers send requirements base64-encoded in this header
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";

/// Settlement receipt returned with the paid response
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// EIP-712 domain defaults for USDC when the server omits `extra`
pub const DEFAULT_TOKEN_NAME: &str = "USD Coin";
pub const DEFAULT_TOKEN_VERSION: &str = "2";

/// Payment requirements returned by server in 402 response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: u8,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// v1 `maxAmountRequired`, v2 `amount`
    #[serde(alias = "amount")]
    pub max_amount_required: String,
    #[serde(alias = "payToAddress")]
    pub pay_to: String,
    pub asset: String,
    #[serde(default)]
    pub max_timeout_seconds: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extra: Option<TokenDomain>,
}

/// Token name/version for the asset's EIP-712 domain
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenDomain {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl PaymentRequirements {
    pub fn is_base_network(&self) -> bool {
        matches!(self.network.as_str(), "base" | "eip155:8453")
    }

    /// Chain ID for the requirement's network identifier
    pub fn chain_id(&self) -> Result<u64, String> {
        match self.network.as_str() {
            "base" => Ok(BASE_CHAIN_ID),
            "base-sepolia" => Ok(BASE_SEPOLIA_CHAIN_ID),
            other => other
                .strip_prefix("eip155:")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| format!("Unsupported payment network: {}", other)),
        }
    }

    pub fn token_name(&self) -> &str {
        self.extra
            .as_ref()
            .and_then(|e| e.name.as_deref())
            .unwrap_or(DEFAULT_TOKEN_NAME)
    }

    pub fn token_version(&self) -> &str {
        self.extra
            .as_ref()
            .and_then(|e| e.version.as_deref())
            .unwrap_or(DEFAULT_TOKEN_VERSION)
    }
}

impl PaymentRequired {
    /// Decode payment requirements from base64 PAYMENT-REQUIRED header
    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map_err(|e| format!("Failed to decode payment required header: {}", e))?;
        let json = String::from_utf8(decoded)
            .map_err(|e| format!("Invalid UTF-8 in payment required header: {}", e))?;
        serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse payment required: {}", e))
    }

    /// Decode payment requirements from a v1 JSON 402 body
    pub fn from_body(body: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(body)
            .map_err(|e| format!("Failed to parse 402 response body: {}", e))
    }

    /// Pick the option to pay: `exact` on Base if offered, else the first one
    pub fn select(&self) -> Option<&PaymentRequirements> {
        self.accepts
            .iter()
            .find(|r| r.scheme == "exact" && r.is_base_network())
            .or_else(|| self.accepts.first())
    }
}

/// Payment payload sent to server with X-PAYMENT header.
///
/// v1 carries `scheme`/`network` at the top level; v2 echoes the accepted
/// requirement under `accepted`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<AcceptedPayment>,
    pub payload: ExactEvmPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedPayment {
    pub scheme: String,
    pub network: String,
    pub amount: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: String,
    pub authorization: Eip3009Authorization,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: String,
}

impl PaymentPayload {
    /// Encode payment payload to base64 for X-PAYMENT header
    pub fn to_base64(&self) -> Result<String, String> {
        let json = serde_json::to_string(self)
            .map_err(|e| format!("Failed to serialize payment payload: {}", e))?;
        Ok(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, json))
    }
}

/// Facilitator settlement receipt from the X-PAYMENT-RESPONSE header
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
}

impl SettlementResponse {
    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map_err(|e| format!("Failed to decode payment response header: {}", e))?;
        serde_json::from_slice(&decoded)
            .map_err(|e| format!("Failed to parse payment response: {}", e))
    }
}
