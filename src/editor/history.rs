//! Change-history viewer.
//!
//! History is fetched on demand over the REST path and not cached beyond
//! the viewing session. The viewer always opens for an explicitly chosen
//! shop id: the row the user actually asked about.

use tracing::debug;

use crate::api::{ApiClient, ApiError, HistoryEntry};
use crate::sync::ShopId;

/// Entries shown per shop
const HISTORY_LIMIT: usize = 100;

/// The open history modal's content
#[derive(Debug, Clone)]
pub struct HistoryView {
    pub shop_id: ShopId,
    pub entries: Vec<HistoryEntry>,
}

/// Modal state for the change log of one shop
#[derive(Default)]
pub struct HistoryViewer {
    current: Option<HistoryView>,
}

impl HistoryViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and open the change log for the given shop. On fetch failure
    /// the modal stays closed and the error propagates to the caller for
    /// notification.
    pub async fn open(&mut self, api: &ApiClient, shop_id: ShopId) -> Result<(), ApiError> {
        let entries = api.shop_history(shop_id, HISTORY_LIMIT).await?;
        debug!("Loaded {} history entries for shop {}", entries.len(), shop_id);
        self.current = Some(HistoryView { shop_id, entries });
        Ok(())
    }

    /// Hide the modal
    pub fn close(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&HistoryView> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }
}
