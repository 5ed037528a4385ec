//! Table projection: shops + lock state → row view-models.
//!
//! This is a pure function of the editor state. It owns no state of its
//! own and performs no I/O; rendering backends consume the `RowView` list
//! on every state change.

use std::time::Instant;

use crate::sync::{RowLock, ShopId, UserIdentity};

use super::format_wait_time;
use super::state::EditorState;

/// One rendered table row
#[derive(Debug, Clone)]
pub struct RowView {
    pub shop_id: ShopId,
    pub name: String,
    pub address: String,
    pub business_hours: String,
    pub closed_days: String,
    pub seats: String,
    /// Wait time with its unit suffix, empty when unposted
    pub wait_time: String,
    pub updated_at: String,
    pub updated_by: String,
    /// How this row relates to the local user's editing rights
    pub lock: RowLock,
    /// Holder name shown on the lock glyph, present while locked
    pub lock_tooltip: Option<String>,
    /// Whether double-click-to-edit is wired up on the editable cells
    pub editable: bool,
    /// Temporary highlight after a remote update
    pub flashing: bool,
}

impl RowView {
    pub fn is_locked(&self) -> bool {
        !matches!(self.lock, RowLock::Unlocked)
    }
}

/// Project the filtered shop list into row view-models.
///
/// The filter is a case-insensitive substring match over name and address;
/// an empty filter passes every row.
pub fn render_rows(
    state: &EditorState,
    filter: &str,
    identity: &UserIdentity,
    now: Instant,
) -> Vec<RowView> {
    let needle = filter.trim().to_lowercase();

    state
        .shops()
        .iter()
        .filter(|shop| {
            needle.is_empty()
                || shop.name.to_lowercase().contains(&needle)
                || shop.address.to_lowercase().contains(&needle)
        })
        .map(|shop| {
            let lock = state.locks.classify(shop.id, &identity.user_id);
            let lock_tooltip = match &lock {
                RowLock::SelfLocked => Some(identity.username.clone()),
                RowLock::OtherLocked(holder) => Some(holder.user_name.clone()),
                RowLock::Unlocked => None,
            };
            let editable = !matches!(lock, RowLock::OtherLocked(_));

            RowView {
                shop_id: shop.id,
                name: shop.name.clone(),
                address: shop.address.clone(),
                business_hours: shop.business_hours.clone(),
                closed_days: shop.closed_days.clone(),
                seats: shop.seats.clone(),
                wait_time: format_wait_time(shop.wait_time),
                updated_at: shop.updated_at.clone().unwrap_or_default(),
                updated_by: shop.updated_by.clone().unwrap_or_default(),
                lock,
                lock_tooltip,
                editable,
                flashing: state.is_flashing(shop.id, now),
            }
        })
        .collect()
}
