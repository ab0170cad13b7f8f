//! Environment-driven configuration for the REST backend.

use crate::error::{RemoteError, Result};

pub const API_URL_ENV: &str = "DAYPACK_API_URL";
pub const API_TOKEN_ENV: &str = "DAYPACK_API_TOKEN";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    base_url: String,
    api_token: Option<String>,
}

impl RemoteConfig {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// Read `DAYPACK_API_URL` / `DAYPACK_API_TOKEN`. Errors when no backend
    /// URL is configured; the token stays optional.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                RemoteError::invalid_request(format!("{API_URL_ENV} is not configured"))
            })?;
        let api_token = std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Ok(Self::new(&base_url, api_token))
    }

    pub fn is_configured() -> bool {
        std::env::var(API_URL_ENV)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }
}
