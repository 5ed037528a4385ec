//! REST API module for the shop directory backend.
//!
//! The collaboration channel carries only the locking protocol. Everything
//! else (authentication status, bulk shop listing, the single-field PATCH
//! fallback, change history) goes over plain request/response REST under
//! `/api/v1/admin`.

mod client;

pub use client::{ApiClient, ApiError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::ShopId;

/// One shop row as served by the backend.
///
/// Timestamps are kept as the backend's strings: the editor only displays
/// them and stamps fresh ones, it never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub id: ShopId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub business_hours: String,
    #[serde(default)]
    pub closed_days: String,
    #[serde(default)]
    pub seats: String,
    /// Current wait time in minutes, if posted
    #[serde(default)]
    pub wait_time: Option<u32>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Display name of the most recent editor
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Append-only change log entry for one field edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub changed_at: String,
    pub field: String,
    #[serde(default)]
    pub old_value: Value,
    #[serde(default)]
    pub new_value: Value,
    #[serde(default)]
    pub changed_by: String,
}

/// Response of `GET /auth/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub account_status: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Response of `GET /shops`
#[derive(Debug, Serialize, Deserialize)]
pub struct ShopListResponse {
    pub shops: Vec<ShopRecord>,
}

/// Response of `GET /shops/{id}/history`
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://ramen.example.com`
    pub base_url: String,
    /// Page size for the bulk shop listing
    pub page_limit: usize,
    /// Session cookie forwarded with every request
    pub session_cookie: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            page_limit: 200,
            session_cookie: None,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base) = std::env::var("SHOP_API_BASE") {
            config.base_url = base;
        }
        if let Some(limit) = std::env::var("SHOP_PAGE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.page_limit = limit;
        }
        config.session_cookie = std::env::var("SHOP_SESSION_COOKIE").ok();
        config
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_record_tolerates_sparse_payloads() {
        let shop: ShopRecord =
            serde_json::from_str(r#"{"id": 12, "name": "Menya Kaiji"}"#).unwrap();

        assert_eq!(shop.id, 12);
        assert_eq!(shop.name, "Menya Kaiji");
        assert_eq!(shop.address, "");
        assert!(shop.wait_time.is_none());
        assert!(shop.updated_by.is_none());
    }

    #[test]
    fn test_auth_status_defaults() {
        let status: AuthStatus = serde_json::from_str(r#"{"authenticated": false}"#).unwrap();
        assert!(!status.authenticated);
        assert!(!status.is_admin);
        assert!(status.username.is_none());
    }

    #[test]
    fn test_history_entry_value_types_are_loose() {
        let entry: HistoryEntry = serde_json::from_str(
            r#"{"changed_at":"2026-08-01T10:00:00Z","field":"wait_time","old_value":30,"new_value":null,"changed_by":"Alice"}"#,
        )
        .unwrap();

        assert_eq!(entry.old_value, serde_json::json!(30));
        assert!(entry.new_value.is_null());
    }
}
