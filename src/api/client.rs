//! REST client for the shop directory backend.

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{ApiConfig, AuthStatus, HistoryEntry, HistoryResponse, ShopListResponse, ShopRecord};
use crate::sync::{ShopId, UserIdentity};

/// Errors that can occur talking to the REST API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Administrator privileges required")]
    NotAdmin,

    #[error("Client initialization failed: {0}")]
    InitFailed(String),
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP client for the admin REST surface
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Build a client for the given backend origin
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::InitFailed(format!("Invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn admin_url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/admin{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    /// Fetch the current session's authentication state
    pub async fn auth_status(&self) -> ApiResult<AuthStatus> {
        let url = format!(
            "{}/api/v1/auth/status",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self.http.get(url).send().await?;
        expect_json(response).await
    }

    /// Verify the session belongs to an authenticated administrator and
    /// return their identity. Anything else aborts editor initialization.
    pub async fn ensure_admin(&self) -> ApiResult<UserIdentity> {
        let status = self.auth_status().await?;
        if !status.authenticated {
            return Err(ApiError::NotAuthenticated);
        }
        if !status.is_admin {
            return Err(ApiError::NotAdmin);
        }
        Ok(UserIdentity::new(
            status.user_id.unwrap_or_default(),
            status.username.unwrap_or_default(),
        ))
    }

    /// Bulk shop listing, paged by limit/offset
    pub async fn list_shops(&self, limit: usize, offset: usize) -> ApiResult<Vec<ShopRecord>> {
        let url = self.admin_url("/shops");
        let response = self
            .http
            .get(url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        let body: ShopListResponse = expect_json(response).await?;
        debug!("Loaded {} shops", body.shops.len());
        Ok(body.shops)
    }

    /// Single-field mutation: `PATCH /shops/{id}` with `{field: value}`.
    ///
    /// This is the fallback path when the channel is down, and bypasses row
    /// locking entirely; the server response is the authoritative record.
    pub async fn patch_shop_field(
        &self,
        shop_id: ShopId,
        field: &str,
        value: &Value,
    ) -> ApiResult<ShopRecord> {
        let url = self.admin_url(&format!("/shops/{}", shop_id));
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), value.clone());
        let response = self.http.patch(url).json(&body).send().await?;
        expect_json(response).await
    }

    /// Change history for one shop, newest first
    pub async fn shop_history(&self, shop_id: ShopId, limit: usize) -> ApiResult<Vec<HistoryEntry>> {
        let url = self.admin_url(&format!("/shops/{}/history", shop_id));
        let response = self.http.get(url).query(&[("limit", limit)]).send().await?;
        let body: HistoryResponse = expect_json(response).await?;
        Ok(body.history)
    }
}

async fn expect_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{StubBackend, StubOptions};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_shops() {
        let backend = StubBackend::spawn(StubOptions::default()).await;
        let client = ApiClient::new(ApiConfig::new(backend.http_url())).unwrap();

        let shops = client.list_shops(200, 0).await.unwrap();
        assert_eq!(shops.len(), 2);
        assert_eq!(shops[0].name, "Menya Taisho");
    }

    #[tokio::test]
    async fn test_patch_shop_field_returns_updated_record() {
        let backend = StubBackend::spawn(StubOptions::default()).await;
        let client = ApiClient::new(ApiConfig::new(backend.http_url())).unwrap();

        let updated = client
            .patch_shop_field(1, "wait_time", &json!(25))
            .await
            .unwrap();

        assert_eq!(updated.id, 1);
        assert_eq!(updated.wait_time, Some(25));
        assert_eq!(backend.patches(), vec![(1, "wait_time".to_string(), json!(25))]);
    }

    #[tokio::test]
    async fn test_patch_unknown_shop_is_a_status_error() {
        let backend = StubBackend::spawn(StubOptions::default()).await;
        let client = ApiClient::new(ApiConfig::new(backend.http_url())).unwrap();

        let result = client.patch_shop_field(999, "name", &json!("ghost")).await;
        assert!(matches!(result, Err(ApiError::Status { .. })));
    }

    #[tokio::test]
    async fn test_shop_history() {
        let backend = StubBackend::spawn(StubOptions::default()).await;
        let client = ApiClient::new(ApiConfig::new(backend.http_url())).unwrap();

        let history = client.shop_history(1, 100).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].field, "wait_time");
        assert_eq!(history[0].changed_by, "Alice");
    }

    #[tokio::test]
    async fn test_ensure_admin_accepts_admins() {
        let backend = StubBackend::spawn(StubOptions::default()).await;
        let client = ApiClient::new(ApiConfig::new(backend.http_url())).unwrap();

        let identity = client.ensure_admin().await.unwrap();
        assert_eq!(identity.user_id, "admin-1");
    }

    #[tokio::test]
    async fn test_ensure_admin_rejects_plain_users() {
        let backend = StubBackend::spawn(StubOptions {
            admin: false,
            ..StubOptions::default()
        })
        .await;
        let client = ApiClient::new(ApiConfig::new(backend.http_url())).unwrap();

        assert!(matches!(client.ensure_admin().await, Err(ApiError::NotAdmin)));
    }
}
