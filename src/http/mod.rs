//! Shared HTTP client, response parsing, and the token-aware executor.

pub mod client;
pub mod executor;

pub use client::AuthenticatedClient;
pub use executor::TokenAwareRequestExecutor;

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, TransportError};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(access_token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Decode a successful response body, erroring on non-success statuses.
///
/// Empty or non-JSON success bodies decode as `T::default()`; a JSON body
/// that does not match `T` is a parse error.
pub async fn read_json_or_default<T>(resp: reqwest::Response) -> Result<T, ClientError>
where
    T: DeserializeOwned + Default,
{
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    let body = resp.text().await.map_err(TransportError::from)?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => Ok(serde_json::from_value(value).map_err(TransportError::from)?),
        Err(_) => Ok(T::default()),
    }
}

/// Decode a successful response body that must be present.
pub async fn read_json<T>(resp: reqwest::Response) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    let body = resp.text().await.map_err(TransportError::from)?;
    Ok(serde_json::from_str(&body).map_err(TransportError::from)?)
}

/// Turn a non-success response into an API error.
pub async fn error_from_response(resp: reqwest::Response) -> ClientError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    status_to_error(status, &body)
}

/// Build an API error from a status and raw body.
///
/// The message comes from the JSON body when it has one; otherwise the
/// error only names the status.
pub fn status_to_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| extract_message(&value))
        .unwrap_or_else(|| format!("HTTP error {status}"));
    ClientError::api(status, message)
}

fn extract_message(value: &serde_json::Value) -> Option<String> {
    for key in ["message", "detail", "error", "response"] {
        match value.get(key) {
            Some(serde_json::Value::String(text)) => return Some(text.clone()),
            Some(nested @ serde_json::Value::Object(_)) => {
                if let Some(text) = extract_message(nested) {
                    return Some(text);
                }
            }
            Some(serde_json::Value::Array(items)) => {
                let joined: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect();
                if !joined.is_empty() {
                    return Some(joined.join("; "));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_to_error_uses_json_message() {
        let err = status_to_error(422, r#"{"message":"phone_number already taken"}"#);
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "phone_number already taken");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn status_to_error_reads_nested_and_list_messages() {
        let nested = status_to_error(400, r#"{"error":{"message":"bad name"}}"#);
        assert_eq!(nested.to_string(), "API error (status 400): bad name");

        let listed = status_to_error(400, r#"{"response":{},"message":["a","b"]}"#);
        assert_eq!(listed.to_string(), "API error (status 400): a; b");
    }

    #[test]
    fn status_to_error_falls_back_to_generic_status_message() {
        let err = status_to_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.to_string(), "API error (status 502): HTTP error 502");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn bearer_headers_carry_token() {
        let headers = bearer_headers("tok-1");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok-1");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }
}
