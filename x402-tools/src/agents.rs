//! Paid 402box agents
//!
//! One call = resolve the key, derive a signer, build a fresh payment-aware
//! client, POST `{ "message": query }`, and unwrap `data.response`.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::credentials::CredentialError;
use crate::http;
use crate::x402::{X402Client, X402Error, X402Signer};

/// A remote agent endpoint on the 402box gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaidAgent {
    /// Tool name
    pub name: &'static str,
    /// Human-readable name used in errors
    pub display_name: &'static str,
    pub path: &'static str,
}

pub const X_SEARCHER: PaidAgent = PaidAgent {
    name: "x_searcher",
    display_name: "X Searcher",
    path: "/x_searcher",
};

pub const FIND_PEOPLE: PaidAgent = PaidAgent {
    name: "find_people",
    display_name: "Find People",
    path: "/find_people",
};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    Payment(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from {agent}")]
    UnexpectedResponse { agent: &'static str },
}

impl From<X402Error> for AgentError {
    fn from(err: X402Error) -> Self {
        match err {
            X402Error::Http(e) => AgentError::Http(e),
            payment @ X402Error::Payment(_) => AgentError::Payment(payment.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    message: &'a str,
}

/// Send one paid query to `agent` and return the `data.response` value verbatim
pub async fn query_agent(
    config: &Config,
    agent: &PaidAgent,
    query: &str,
) -> Result<Value, AgentError> {
    let private_key = config.credential_resolver().resolve()?;
    let signer = X402Signer::new(&private_key).map_err(AgentError::InvalidKey)?;

    let client = X402Client::with_payment_interceptor(
        http::build_client(config.timeout)?,
        config.base_url.as_str(),
        signer,
    );

    log::info!("[AGENT] Querying {} ({} chars)", agent.display_name, query.len());

    let response = client
        .post_with_payment(agent.path, &AgentRequest { message: query })
        .await?
        .error_for_status()?;

    let body = response.bytes().await?;
    let body: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("[AGENT] {} returned a non-JSON body: {}", agent.display_name, e);
            return Err(AgentError::UnexpectedResponse {
                agent: agent.display_name,
            });
        }
    };

    extract_response(body, agent)
}

/// Pull `data.response` out of a response body. Falsy values (null, false,
/// 0, "") count as missing.
pub fn extract_response(mut body: Value, agent: &PaidAgent) -> Result<Value, AgentError> {
    match body.pointer_mut("/data/response").map(Value::take) {
        Some(value) if is_truthy(&value) => Ok(value),
        _ => Err(AgentError::UnexpectedResponse {
            agent: agent.display_name,
        }),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_string_response() {
        let body = json!({ "data": { "response": "X" } });
        assert_eq!(extract_response(body, &X_SEARCHER).unwrap(), json!("X"));
    }

    #[test]
    fn test_extract_structured_response() {
        let body = json!({ "data": { "response": { "summary": "s", "sources": [1, 2] } }, "meta": 1 });
        assert_eq!(
            extract_response(body, &FIND_PEOPLE).unwrap(),
            json!({ "summary": "s", "sources": [1, 2] })
        );
    }

    #[test]
    fn test_missing_field_is_shape_error() {
        for body in [
            json!({}),
            json!({ "data": null }),
            json!({ "data": {} }),
            json!({ "data": { "response": null } }),
            json!({ "data": { "response": "" } }),
            json!({ "data": { "response": false } }),
            json!({ "data": { "response": 0 } }),
            json!({ "data": "flat" }),
            json!("just a string"),
        ] {
            let err = extract_response(body.clone(), &X_SEARCHER).unwrap_err();
            assert!(
                matches!(err, AgentError::UnexpectedResponse { agent: "X Searcher" }),
                "body {} gave {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_shape_error_message_names_agent() {
        let err = extract_response(json!({}), &FIND_PEOPLE).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response from Find People");
    }

    #[test]
    fn test_payment_error_conversion() {
        let err: AgentError = X402Error::Payment("No payment options".to_string()).into();
        assert_eq!(err.to_string(), "x402 payment failed: No payment options");
    }
}
