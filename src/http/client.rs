use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::executor::TokenAwareRequestExecutor;
use super::{bearer_headers, read_json, read_json_or_default, shared_client};
use crate::error::{ClientError, Result};

/// JSON client for the backend; every call goes through the
/// [`TokenAwareRequestExecutor`] and carries `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    client: reqwest::Client,
    base_url: String,
    executor: TokenAwareRequestExecutor,
}

impl AuthenticatedClient {
    pub fn new(base_url: impl Into<String>, executor: TokenAwareRequestExecutor) -> Self {
        Self {
            client: shared_client().clone(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            executor,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn executor(&self) -> &TokenAwareRequestExecutor {
        &self.executor
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(Method::GET, path, None).await?;
        read_json(resp).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let resp = self.send(Method::POST, path, Some(body)).await?;
        read_json(resp).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let resp = self.send(Method::PUT, path, Some(body)).await?;
        read_json(resp).await
    }

    /// Like [`put_json`](Self::put_json), but an empty or non-JSON success
    /// body (e.g. `204 No Content`) yields `None`.
    pub async fn put_json_optional<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let resp = self.send(Method::PUT, path, Some(body)).await?;
        read_json_or_default(resp).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> std::result::Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "backend request");
        self.executor
            .execute(|credentials| {
                let mut request = self
                    .client
                    .request(method.clone(), &url)
                    .headers(bearer_headers(&credentials.access_token));
                if let Some(body) = &body {
                    request = request.json(body);
                }
                request.send()
            })
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
