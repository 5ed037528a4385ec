//! Lock state tracking for shop rows.
//!
//! The server is the sole source of truth for row locks. This store is
//! written only when lock events arrive over the channel; the client never
//! invents a lock entry for its own pending requests, so a denied request
//! leaves no phantom ownership behind.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::protocol::{LockDenial, LockGrant};
use super::ShopId;

/// The user currently holding a row lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub user_id: String,
    pub user_name: String,
}

impl LockHolder {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// How a row relates to the local user's editing rights
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLock {
    /// Locked by the local user; editable and visually distinct
    SelfLocked,
    /// Locked by someone else; read-only, tooltip names the holder
    OtherLocked(LockHolder),
    /// No lock entry; editable
    Unlocked,
}

/// In-memory map from shop id to current lock holder.
///
/// At most one entry exists per shop at any time; the map structure enforces
/// this locally and the server enforces it globally.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<ShopId, LockHolder>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Record a granted lock. A `lock_failed` denial carries the real
    /// holder and populates the table identically.
    pub fn grant(&self, shop_id: ShopId, holder: LockHolder) {
        self.locks.insert(shop_id, holder);
    }

    /// Record a denial by storing the actual holder it names.
    pub fn deny(&self, denial: &LockDenial) {
        self.grant(
            denial.shop_id,
            LockHolder::new(&denial.locked_by, &denial.locked_by_name),
        );
    }

    /// Record a grant event.
    pub fn acquire(&self, grant: &LockGrant) {
        self.grant(grant.shop_id, LockHolder::new(&grant.user_id, &grant.user_name));
    }

    /// Remove any lock entry for this shop.
    pub fn release(&self, shop_id: ShopId) {
        self.locks.remove(&shop_id);
    }

    /// Current holder of a row lock, if any.
    pub fn holder(&self, shop_id: ShopId) -> Option<LockHolder> {
        self.locks.get(&shop_id).map(|entry| entry.clone())
    }

    /// Classify a row for rendering and edit eligibility.
    pub fn classify(&self, shop_id: ShopId, self_user_id: &str) -> RowLock {
        match self.holder(shop_id) {
            Some(holder) if holder.user_id == self_user_id => RowLock::SelfLocked,
            Some(holder) => RowLock::OtherLocked(holder),
            None => RowLock::Unlocked,
        }
    }

    /// Number of currently locked rows.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
