//! REST client for the Daypack backend.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use daypack_core::{EntityKind, RemoteStore};

use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

/// Client for the Daypack records API.
///
/// Records live in per-entity collections under `/v1/{table}`, scoped by
/// `ownerId` on every request. Mutation endpoints return no meaningful body;
/// only the status code matters.
#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl RestRemoteStore {
    pub fn new(config: &RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url().to_string(),
            api_token: config.api_token().map(str::to_string),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.api_token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| RemoteError::auth("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    /// Build `/v1/{table}[/{record_id}]` with the id percent-encoded as one
    /// path segment (timezone ids contain slashes).
    fn endpoint(&self, entity: EntityKind, record_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::invalid_request(format!("Invalid base URL: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::invalid_request("Base URL cannot carry a path"))?;
            segments.push("v1").push(entity.table_name());
            if let Some(record_id) = record_id {
                segments.push(record_id);
            }
        }
        Ok(url)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn api_error(status: reqwest::StatusCode, body: &str) -> RemoteError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            return RemoteError::api(
                status.as_u16(),
                format!("{}: {}", error.code, error.message),
            );
        }
        RemoteError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Check a mutation response, discarding any success body.
    async fn check_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }
        Ok(())
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    fn owned_payload(owner_id: &str, payload: &Value) -> Result<Value> {
        let mut body = payload
            .as_object()
            .cloned()
            .ok_or_else(|| RemoteError::invalid_request("Record payload must be a JSON object"))?;
        body.insert("ownerId".to_string(), Value::String(owner_id.to_string()));
        Ok(Value::Object(body))
    }

    async fn insert_row(&self, entity: EntityKind, owner_id: &str, payload: Value) -> Result<()> {
        let url = self.endpoint(entity, None)?;
        debug!("POST {} for owner {}", url, owner_id);
        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(&Self::owned_payload(owner_id, &payload)?)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn update_row(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<()> {
        let mut url = self.endpoint(entity, Some(record_id))?;
        url.query_pairs_mut().append_pair("ownerId", owner_id);
        debug!("PATCH {}", url);
        let response = self
            .client
            .patch(url)
            .headers(self.headers()?)
            .json(&payload)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn delete_row(&self, entity: EntityKind, owner_id: &str, record_id: &str) -> Result<()> {
        let mut url = self.endpoint(entity, Some(record_id))?;
        url.query_pairs_mut().append_pair("ownerId", owner_id);
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(url)
            .headers(self.headers()?)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn list_rows(&self, entity: EntityKind, owner_id: &str) -> Result<Vec<Value>> {
        let mut url = self.endpoint(entity, None)?;
        url.query_pairs_mut().append_pair("ownerId", owner_id);
        debug!("GET {}", url);
        let response = self.client.get(url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn insert(
        &self,
        entity: EntityKind,
        owner_id: &str,
        payload: Value,
    ) -> daypack_core::Result<()> {
        self.insert_row(entity, owner_id, payload).await?;
        Ok(())
    }

    async fn update(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> daypack_core::Result<()> {
        self.update_row(entity, owner_id, record_id, payload).await?;
        Ok(())
    }

    async fn delete(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
    ) -> daypack_core::Result<()> {
        self.delete_row(entity, owner_id, record_id).await?;
        Ok(())
    }

    async fn list_for_owner(
        &self,
        entity: EntityKind,
        owner_id: &str,
    ) -> daypack_core::Result<Vec<Value>> {
        let rows = self.list_rows(entity, owner_id).await?;
        Ok(rows)
    }
}
